//! Posture statistics CLI library.
//!
//! This crate provides the CLI interface and the session driver.

mod cli;
pub mod commands;
mod config;
pub mod driver;
pub mod protocol;

pub use cli::{Cli, Commands};
pub use config::{Config, ProcessingSpeed};
