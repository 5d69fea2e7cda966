//! Lexical scopes and the symbols declared in them
//!
//! One [`ScopeTree`] holds every scope of a compilation unit: the builtin
//! scope, one root scope per module and all function, block and class scopes
//! below them. It also owns the symbol arena and the string interner, so later
//! stages can turn any [`SymbolId`] back into a name.
//!
//! Cross-module bindings are alias entries ([`ScopeTree::add_alias`]) that
//! point at symbols owned by another module's root scope, resolved through the
//! per-module [`ExportTable`].

pub mod error;
pub mod exports;
pub mod scope;
pub mod symbol;

pub use error::ScopeError;
pub use exports::{ExportKey, ExportTable, ExportTarget, ModuleExports};
pub use scope::{ScopeData, ScopeId, ScopeKind, ScopeTree};
pub use symbol::{DeclKind, StorageClass, Symbol, SymbolId};

use serde::{Deserialize, Serialize};

/// Index of a module inside the compilation unit
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ModuleId(pub u32);

impl ModuleId {
    /// Owner of the builtin scope, which belongs to no source module
    pub const BUILTIN: Self = Self(u32::MAX);

    /// Position in the unit's module list
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}
