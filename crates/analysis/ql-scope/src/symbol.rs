//! Symbols: one per declared name

use crate::{ModuleId, ScopeId};
use ql_arena::Idx;
use ql_intern::Name;
use ql_span::FileSpan;
use ql_ty_id::TyId;

/// Unique identifier for a symbol
pub type SymbolId = Idx<Symbol>;

/// How a name was introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    /// `var`, hoisted to the nearest function or module scope
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
    /// Function parameter
    Param,
    /// Implicit `this` parameter of methods and constructors
    This,
    /// Function declaration
    Function,
    /// Class declaration
    Class,
    /// Interface declaration
    Interface,
    /// `import * as name`, bound to the imported module
    Namespace(ModuleId),
}

impl DeclKind {
    /// Whether the binding may be assigned after initialization
    #[must_use]
    pub const fn is_mutable(self) -> bool {
        matches!(self, Self::Var | Self::Let | Self::Param)
    }

    /// Whether the binding holds a runtime value (as opposed to a type)
    #[must_use]
    pub const fn is_value(self) -> bool {
        !matches!(self, Self::Interface | Self::Namespace(_))
    }
}

/// Where a symbol's value lives at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageClass {
    /// Stack local of its declaring function
    Local,
    /// Parameter of its declaring function
    Parameter,
    /// Module-level global
    Global,
    /// Cell inside its declaring function's closure context
    ClosureCaptured,
}

/// A declared name
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Declared name
    pub name: Name,
    /// Declaration form
    pub kind: DeclKind,
    /// Storage class, promoted to `ClosureCaptured` by closure analysis
    pub storage: StorageClass,
    /// Whether assignments are allowed
    pub mutable: bool,
    /// Resolved type, filled in by the type resolver
    pub ty: Option<TyId>,
    /// Scope owning the symbol
    pub scope: ScopeId,
    /// Declaration site
    pub span: FileSpan,
}

impl Symbol {
    /// Whether the closure analyzer moved this symbol into a context cell
    #[must_use]
    pub fn is_captured(&self) -> bool {
        self.storage == StorageClass::ClosureCaptured
    }
}
