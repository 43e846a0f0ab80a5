//! Command-line front end for nbrun

pub mod args;
pub mod execute;

pub use args::Cli;
pub use execute::{execute, exit_code};
