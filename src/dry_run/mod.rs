//! Read-only scan commands for the `scan` binary. Nothing here writes to the
//! database.

pub mod commands;
pub mod formatters;

pub use formatters::OutputFormat;
