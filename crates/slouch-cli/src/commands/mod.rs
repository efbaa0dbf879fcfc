//! CLI subcommand implementations.

pub mod report;
pub mod reset;
pub mod run;
