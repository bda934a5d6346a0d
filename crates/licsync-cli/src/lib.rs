//! licsync command-line front end
//!
//! The binary is a thin wrapper over [`commands::execute`]; everything is
//! exposed here so integration tests can drive whole runs in-process.

#![allow(missing_docs)]

pub mod cli;
pub mod commands;
pub mod console;
pub mod export;
pub mod input;
pub mod logging;

pub use cli::build_cli;
pub use commands::execute;
pub use input::{load_input, retry_candidates};
