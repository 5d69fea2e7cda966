//! Compilation errors with diagnostic codes

use miette::Diagnostic;
use ql_closure::ClosureError;
use ql_interpreter::InterpreterError;
use ql_lower::{IrBuilderError, LowerPlanError};
use ql_scope::ScopeError;
use ql_ty::TypeError;
use thiserror::Error;

/// Any error that aborts a compilation unit
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    /// Declarations, imports or name resolution
    #[error(transparent)]
    #[diagnostic(code(quill::scope), help("check the declarations and imports of the unit"))]
    Scope(#[from] ScopeError),

    /// Type checking
    #[error(transparent)]
    #[diagnostic(code(quill::types))]
    Type(#[from] TypeError),

    /// Closure capture analysis
    #[error(transparent)]
    #[diagnostic(code(quill::closure))]
    Closure(#[from] ClosureError),

    /// Layout planning
    #[error(transparent)]
    #[diagnostic(code(quill::plan))]
    Plan(#[from] LowerPlanError),

    /// The IR builder rejected a declaration
    #[error(transparent)]
    #[diagnostic(code(quill::emit), help("the plan declared the same name twice"))]
    Emit(#[from] IrBuilderError),

    /// Evaluation of the planned program failed
    #[error(transparent)]
    #[diagnostic(code(quill::runtime))]
    Runtime(#[from] InterpreterError),
}

impl CompileError {
    /// Whether the unit uses something the compiler does not support yet
    pub const fn is_unimplemented(&self) -> bool {
        matches!(
            self,
            Self::Type(TypeError::Unimplemented { .. })
                | Self::Plan(LowerPlanError::Unimplemented { .. })
        )
    }
}
