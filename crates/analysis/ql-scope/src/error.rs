//! Errors raised while building scopes and binding names

use ql_span::FileSpan;
use std::mem;

/// Errors that occur during scope construction and name binding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// Name is declared twice directly in the same scope
    #[error("duplicate declaration of `{name}` at {second} (first declared at {first})")]
    DuplicateDeclaration {
        /// The redeclared name
        name: String,
        /// First declaration
        first: FileSpan,
        /// Offending declaration
        second: FileSpan,
    },

    /// Identifier does not resolve in any enclosing scope
    #[error("cannot find `{name}` at {use_site}")]
    UndefinedName {
        /// The name that was not found
        name: String,
        /// Where the name was used
        use_site: FileSpan,
        /// Closest visible name, for "did you mean" hints
        suggestion: Option<String>,
    },

    /// Import of a module that is not part of the compilation unit
    #[error("unknown module `{specifier}` imported at {use_site}")]
    UnknownModule {
        /// Module specifier as written
        specifier: String,
        /// Import location
        use_site: FileSpan,
    },

    /// Import of a name the target module does not export
    #[error("module `{module}` has no export `{name}` (imported at {use_site})")]
    UnknownExport {
        /// Exporting module
        module: String,
        /// Requested export, `default` for default imports
        name: String,
        /// Import location
        use_site: FileSpan,
    },

    /// Malformed or unsupported construct at the parser boundary
    #[error("syntax error at {span}: {message}")]
    Syntax {
        /// What was wrong
        message: String,
        /// Where
        span: FileSpan,
    },

    /// Recognised construct that cannot be compiled yet
    #[error("unimplemented at {span}: {feature}")]
    Unimplemented {
        /// Name of the feature
        feature: String,
        /// Where
        span: FileSpan,
    },
}

impl ScopeError {
    /// Source location of the error
    #[must_use]
    pub const fn span(&self) -> FileSpan {
        match self {
            Self::DuplicateDeclaration { second: span, .. }
            | Self::UndefinedName { use_site: span, .. }
            | Self::UnknownModule { use_site: span, .. }
            | Self::UnknownExport { use_site: span, .. }
            | Self::Syntax { span, .. }
            | Self::Unimplemented { span, .. } => *span,
        }
    }

    /// Picks the candidate closest to `target`, if any is within edit distance 2
    pub fn closest_name<'names>(
        target: &str,
        candidates: impl IntoIterator<Item = &'names str>,
    ) -> Option<String> {
        candidates
            .into_iter()
            .filter(|candidate| *candidate != target)
            .map(|candidate| (levenshtein_distance(target, candidate), candidate))
            .filter(|(distance, _)| *distance <= 2)
            .min_by_key(|(distance, _)| *distance)
            .map(|(_, candidate)| candidate.to_string())
    }
}

/// Levenshtein distance over chars
fn levenshtein_distance(source: &str, target: &str) -> usize {
    let target_chars: Vec<char> = target.chars().collect();
    let mut previous: Vec<usize> = (0..=target_chars.len()).collect();
    let mut current = vec![0; target_chars.len() + 1];

    for (row, source_char) in source.chars().enumerate() {
        current[0] = row + 1;
        for (col, target_char) in target_chars.iter().enumerate() {
            let cost = usize::from(source_char != *target_char);
            current[col + 1] = (previous[col + 1] + 1)
                .min(current[col] + 1)
                .min(previous[col] + cost);
        }
        mem::swap(&mut previous, &mut current);
    }

    previous[target_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "def"), 3);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "four"), 4);
    }

    #[test]
    fn test_closest_name() {
        let names = ["counter", "count", "limit"];
        assert_eq!(
            ScopeError::closest_name("countr", names),
            Some("counter".to_string())
        );
        assert_eq!(ScopeError::closest_name("zzzzzz", names), None);
    }
}
