//! Tooling
//!
//! Command-line access to event-type validation, channel naming and the
//! resolved configuration.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
