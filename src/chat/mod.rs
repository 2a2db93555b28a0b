//! The interactive chat application.
//!
//! This module provides the pieces of the `architect` REPL that sit on top of
//! the library:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing for the walkthrough, the
//!   configuration form, and session control

mod commands;
mod config;

pub use commands::{ArchitectCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
