//! Reference interpreter
//!
//! Executes a checked program under its lowering plan. Used to validate the
//! plan's layout and dispatch decisions without an external IR builder.

mod expr;
pub mod interpreter;
pub mod store;
pub mod value;

#[cfg(test)]
mod tests;

pub use interpreter::{Interpreter, InterpreterError, MAX_CALL_DEPTH};
pub use store::Store;
pub use value::Value;
