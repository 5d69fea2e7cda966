//! Type checking errors

use ql_span::FileSpan;

/// Errors raised while resolving types and checking bodies
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// A value does not fit the slot it flows into
    #[error("type mismatch at {span}: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        /// Slot type
        expected: String,
        /// Value type
        found: String,
        /// Where the value flows
        span: FileSpan,
    },

    /// Recognised construct that cannot be compiled
    #[error("unimplemented at {span}: {feature}")]
    Unimplemented {
        /// Name of the feature
        feature: String,
        /// Where
        span: FileSpan,
    },

    /// Annotation names neither a primitive nor a class or interface
    #[error("unknown type `{name}` at {span}")]
    UnknownType {
        /// Name as written
        name: String,
        /// Where
        span: FileSpan,
    },

    /// Member lookup failed on a static type
    #[error("type `{ty}` has no member `{name}` (at {span})")]
    UnknownMember {
        /// Receiver type
        ty: String,
        /// Requested member
        name: String,
        /// Where
        span: FileSpan,
    },

    /// Wrong number of call arguments
    #[error("expected {expected} arguments, found {found} (at {span})")]
    ArgumentCount {
        /// Accepted count, as text (`2`, `1..3`, `at least 1`)
        expected: String,
        /// Passed count
        found: usize,
        /// Call site
        span: FileSpan,
    },

    /// Callee type has no call signature
    #[error("type `{ty}` is not callable (at {span})")]
    NotCallable {
        /// Callee type
        ty: String,
        /// Call site
        span: FileSpan,
    },

    /// Assignment to a readonly field, accessor without setter or length
    #[error("cannot assign to `{name}` at {span}")]
    ReadonlyAssignment {
        /// Member name
        name: String,
        /// Where
        span: FileSpan,
    },

    /// A class extends itself through its base chain
    #[error("class `{class}` inherits from itself (at {span})")]
    InheritanceCycle {
        /// Class name
        class: String,
        /// Class declaration
        span: FileSpan,
    },
}

impl TypeError {
    /// Source location of the error
    #[must_use]
    pub const fn span(&self) -> FileSpan {
        match self {
            Self::TypeMismatch { span, .. }
            | Self::Unimplemented { span, .. }
            | Self::UnknownType { span, .. }
            | Self::UnknownMember { span, .. }
            | Self::ArgumentCount { span, .. }
            | Self::NotCallable { span, .. }
            | Self::ReadonlyAssignment { span, .. }
            | Self::InheritanceCycle { span, .. } => *span,
        }
    }
}
