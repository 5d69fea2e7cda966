//! Scope builder: AST → HIR with name resolution
//!
//! This crate handles:
//! - Scope tree construction for every module, function, block and class
//! - Hoisting of function, class and interface declarations
//! - Import/export binding across modules, in dependency order
//! - Binding every identifier, `this` and `super` to a symbol

pub mod lower;

pub use lower::{lower_unit, LowerOptions, LoweredUnit};
