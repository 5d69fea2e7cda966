//! Closure analysis errors

use ql_span::FileSpan;
use thiserror::Error;

/// Closure analysis error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosureError {
    /// A variable is used outside its owner without having been captured
    #[error("`{name}` is not reachable from this function")]
    NotCaptured {
        /// Variable name
        name: String,
        /// Declaration site
        span: FileSpan,
    },

    /// The context chain of a function does not reach the owner's context
    #[error("no context on the chain holds `{name}`")]
    BrokenChain {
        /// Variable name
        name: String,
        /// Declaration site
        span: FileSpan,
    },
}
