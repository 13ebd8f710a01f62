use crate::domain::config::BridgeConfig;
use crate::domain::error::{BridgeError, BridgeResult};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments for RotBridge
#[derive(Parser, Debug)]
#[command(
    name = "rotbridge",
    version = env!("CARGO_PKG_VERSION"),
    about = "rotctld to serial rotator controller bridge",
    long_about = "Accepts rotctld-style clients (p, P az el, S, Q) over TCP and forwards \
                  their requests to one serial-attached rotator controller speaking the \
                  AZ/EL dialect. Any number of clients may share the controller."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub bridge: BridgeArgs,

    /// Command to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve rotctld clients until interrupted
    Run,
    /// List available serial ports
    Ports,
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
    /// Write a default configuration file
    Init {
        /// Destination file
        path: PathBuf,
    },
}

/// Overrides for the configuration file
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct BridgeArgs {
    /// Address rotctld clients connect to
    #[arg(long, global = true)]
    pub listen_host: Option<String>,

    /// Port rotctld clients connect to
    #[arg(long, global = true)]
    pub listen_port: Option<u16>,

    /// Serial port of the rotator controller
    #[arg(long, global = true)]
    pub serial_port: Option<String>,

    /// Baud rate
    #[arg(long, global = true)]
    pub baud: Option<u32>,

    /// Serial reply timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<f64>,

    /// Use the built-in simulated rotator instead of a serial port
    #[arg(long, global = true)]
    pub simulate: bool,
}

impl BridgeArgs {
    /// Apply command line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut BridgeConfig) -> BridgeResult<()> {
        if let Some(host) = &self.listen_host {
            config.listen.host = host.clone();
        }
        if let Some(port) = self.listen_port {
            config.listen.port = port;
        }
        if let Some(port) = &self.serial_port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(seconds) = self.timeout {
            // Zero is accepted, same as `timeout_ms = 0` in the config file
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(BridgeError::InvalidInput(format!(
                    "timeout must be a non-negative number of seconds, got {}",
                    seconds
                )));
            }
            config.serial.timeout_ms = (seconds * 1000.0).round() as u64;
        }
        Ok(())
    }
}
