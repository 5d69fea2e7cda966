//! Planning and emission errors

use ql_closure::ClosureError;
use ql_span::FileSpan;
use thiserror::Error;

/// Error raised while planning the layout of a program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerPlanError {
    /// Closure access path could not be built
    #[error(transparent)]
    Closure(#[from] ClosureError),

    /// A function was never given a signature by the checker
    #[error("function `{function}` has no checked signature")]
    MissingSignature {
        /// Internal function name
        function: String,
    },

    /// A variable has no runtime storage
    #[error("`{name}` has no storage")]
    NoStorage {
        /// Variable name
        name: String,
        /// Declaration site
        span: FileSpan,
    },

    /// Construct the planner cannot lay out
    #[error("unimplemented: {feature}")]
    Unimplemented {
        /// What is unsupported
        feature: String,
        /// Location
        span: FileSpan,
    },
}

/// Failure reported by an [`IrBuilder`](crate::IrBuilder)
///
/// These indicate a broken plan rather than a broken program, so emission
/// stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrBuilderError {
    /// The same entity was declared twice
    #[error("{kind} `{name}` is declared twice")]
    Duplicate {
        /// Entity kind
        kind: &'static str,
        /// Entity name
        name: String,
    },

    /// A declaration refers to an entity that does not exist
    #[error("{kind} `{name}` is not declared")]
    Unknown {
        /// Entity kind
        kind: &'static str,
        /// Entity name
        name: String,
    },

    /// The backend rejected a declaration
    #[error("backend error: {0}")]
    Backend(String),
}
