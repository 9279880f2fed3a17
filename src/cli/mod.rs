//! CLI layer for agentree.
//!
//! Provides the command-line interface using clap, with commands for
//! running orchestrated tasks, searching text files through a summary
//! tree, and managing prompt templates.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands, PromptCommands, TreeArgs};
