//! Type ID foundation
//!
//! `TyId` lives in its own crate so the scope table and the HIR can record
//! resolved types without depending on the type checker.

#![allow(clippy::min_ident_chars, reason = "TyId is a conventional name")]

use serde::{Deserialize, Serialize};

/// Index into the interned type table of `ql-ty`
///
/// Two equal `TyId`s always denote structurally identical types, because the
/// table deduplicates on insertion.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TyId(u32);

impl TyId {
    /// Wraps a position in the type table
    #[must_use]
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Position in the type table
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}
