//! FileMart command line interface.
//!
//! The binary is a thin wrapper; argument types, configuration loading and
//! command execution live here so they can be driven from tests.

pub mod commands;
pub mod config;

pub use commands::{execute, Command, RoleArg};
pub use config::CliConfig;
