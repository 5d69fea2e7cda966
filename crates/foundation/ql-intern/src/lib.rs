//! String interning for identifiers and string literals
//!
//! Compilation is single threaded, so the interner is a plain
//! [`lasso::Rodeo`] owned by the compilation unit and lent out by reference.

pub use lasso::Spur as Name;
use lasso::Rodeo;

/// Interner owned by one compilation unit
#[derive(Debug, Default)]
pub struct Interner {
    rodeo: Rodeo,
}

impl Interner {
    /// Creates an empty interner
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text`, returning the existing key when it was seen before
    pub fn intern(&mut self, text: &str) -> Name {
        self.rodeo.get_or_intern(text)
    }

    /// Looks up an already interned string without allocating a new key
    pub fn get(&self, text: &str) -> Option<Name> {
        self.rodeo.get(text)
    }

    /// Resolves a key produced by this interner
    pub fn resolve(&self, name: Name) -> &str {
        self.rodeo.resolve(&name)
    }

    /// Resolves a key that may come from a different interner
    pub fn try_resolve(&self, name: Name) -> Option<&str> {
        self.rodeo.try_resolve(&name)
    }

    /// Number of distinct strings interned so far
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    /// Returns `true` if nothing was interned yet
    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_deduplicates() {
        let mut interner = Interner::new();
        let first = interner.intern("counter");
        let second = interner.intern("counter");
        let other = interner.intern("limit");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(interner.len(), 2);
        assert_eq!(interner.resolve(other), "limit");
    }

    #[test]
    fn test_get_does_not_allocate() {
        let mut interner = Interner::new();
        assert!(interner.get("missing").is_none());
        interner.intern("present");
        assert!(interner.get("present").is_some());
        assert_eq!(interner.len(), 1);
    }
}
