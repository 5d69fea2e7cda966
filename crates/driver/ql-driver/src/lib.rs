//! Compilation driver
//!
//! Wires the quill pipeline together: loads configuration and JSON modules,
//! initializes logging, runs every analysis stage over the unit and hands the
//! resulting plan to an IR builder or to the reference interpreter.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::{CompileOptions, LogConfig};
pub use error::CompileError;
pub use logging::{init_logging, LOG_ENV};
pub use pipeline::{compile, compile_files, load_module, Compilation, Evaluation};
