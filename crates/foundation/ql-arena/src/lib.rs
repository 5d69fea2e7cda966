//! Index-addressed arenas shared by every compiler stage.
//!
//! Scopes, symbols, HIR nodes and closure contexts all live in `la-arena`
//! arenas owned by the compilation unit. Links between them (a scope's parent,
//! a context's enclosing context) are [`Idx`] values, never references.

pub use la_arena::{Arena, ArenaMap, Idx, RawIdx};

/// Builds an [`Idx`] from a position previously obtained through
/// [`Idx::into_raw`] or from iteration order over an arena.
#[must_use]
pub fn idx_from_usize<T>(index: usize) -> Idx<T> {
    Idx::from_raw(RawIdx::from(index as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idx_round_trips_through_position() {
        let mut arena: Arena<&str> = Arena::new();
        arena.alloc("outer");
        let inner = arena.alloc("inner");

        let rebuilt: Idx<&str> = idx_from_usize(1);
        assert_eq!(rebuilt, inner);
        assert_eq!(arena[rebuilt], "inner");
    }
}
