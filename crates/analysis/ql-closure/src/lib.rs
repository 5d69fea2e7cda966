//! Closure conversion analysis
//!
//! Every function gets the set of variables it uses but does not own. A
//! variable owned by function G and used by a function nested anywhere
//! below G becomes a cell of G's closure context; every access to it,
//! including the ones inside G, goes through that cell. Contexts form a
//! chain: each one links to the nearest enclosing context, so a nested
//! closure reaches an outer cell by following parent links.

pub mod analysis;
pub mod context;
pub mod error;

pub use analysis::{analyze_program, owner, ClosureInfo, FunctionClosure};
pub use context::{ClosureContext, ContextId, VarAccess};
pub use error::ClosureError;
