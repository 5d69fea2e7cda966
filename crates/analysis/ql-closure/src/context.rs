//! Closure contexts and variable access paths

use ql_arena::Idx;
use ql_hir::FunctionId;
use ql_scope::SymbolId;
use ql_ty_id::TyId;

/// Unique identifier for a closure context
pub type ContextId = Idx<ClosureContext>;

/// Heap record holding the captured variables of one function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureContext {
    /// Function whose variables live here
    pub owner: FunctionId,
    /// Nearest enclosing context
    pub parent: Option<ContextId>,
    /// Captured parameters and locals in declaration order
    pub cells: Vec<SymbolId>,
    /// Synthesized struct type: the parent link, then one field per cell
    pub ty: TyId,
}

impl ClosureContext {
    /// Struct field of the parent link
    pub const PARENT_FIELD: usize = 0;

    /// Struct field holding `symbol`
    pub fn field_of(&self, symbol: SymbolId) -> Option<usize> {
        self.cells
            .iter()
            .position(|cell| *cell == symbol)
            .map(|index| index + 1)
    }
}

/// How a function reaches a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarAccess {
    /// Stack local of the accessing function
    Local,
    /// Parameter (or `this`) of the accessing function
    Param,
    /// Module-level or builtin binding
    Global,
    /// Context cell: follow `hops` parent links from the accessing
    /// function's innermost context, then read struct field `field`
    Cell {
        /// Parent links to follow
        hops: usize,
        /// Struct field index; field 0 is the parent link
        field: usize,
    },
    /// Stack local holding a tagged `any` value
    Dynamic,
}
