// CLI module - Command line interface
pub mod args;
pub mod commands;

pub use args::{Args, BridgeArgs, Command, ConfigCommand};
pub use commands::execute_command;
