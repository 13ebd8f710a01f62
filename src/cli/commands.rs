use crate::cli::args::{Args, Command, ConfigCommand};
use crate::core::link::RotatorLink;
use crate::domain::config::BridgeConfig;
use crate::domain::error::{BridgeError, BridgeResult};
use crate::infrastructure::config::{render, ConfigManager};
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::serial::{SerialGateway, SimulatedRotator};
use crate::infrastructure::tcp::BridgeServer;
use std::sync::Arc;
use tracing::info;

/// Execute CLI command
pub async fn execute_command(args: Args) -> BridgeResult<()> {
    let manager = ConfigManager::new();
    let config = effective_config(&args, &manager)?;

    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)?;
    }

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run_bridge(config, args.bridge.simulate).await,
        Command::Ports => list_ports(),
        Command::Config { command } => match command {
            ConfigCommand::Show => {
                println!("{}", render(&config)?);
                Ok(())
            }
            ConfigCommand::Init { path } => {
                manager.init_config(&path)?;
                println!("Wrote default configuration to {}", path.display());
                Ok(())
            }
        },
    }
}

/// File configuration (explicit path, else the user file) with command line
/// overrides applied.
pub fn effective_config(args: &Args, manager: &ConfigManager) -> BridgeResult<BridgeConfig> {
    let mut config = match &args.config {
        Some(path) => manager.load_config_from_path(path)?,
        None => manager.load_config()?,
    };
    args.bridge.apply(&mut config)?;
    Ok(config)
}

/// Open the rotator, then serve clients until Ctrl+C.
///
/// The device is opened before the listener is bound so that a missing
/// controller stops the process before any client can connect.
pub async fn run_bridge(config: BridgeConfig, simulate: bool) -> BridgeResult<()> {
    let gateway = if simulate {
        info!("Using simulated rotator");
        SerialGateway::new(
            Box::new(SimulatedRotator::default()),
            config.serial.timeout(),
            "simulated",
        )
    } else {
        SerialGateway::open(&config.serial)?
    };
    let device_label = gateway.label().to_string();
    let link: Arc<dyn RotatorLink> = Arc::new(gateway);

    let mut server =
        BridgeServer::bind(&config.listen, link, config.global.malformed_reply).await?;
    info!(
        "Proxy listening on {} -> {} @{} baud",
        server.local_addr(),
        device_label,
        config.serial.baud_rate
    );
    server.start()?;

    let interrupted = tokio::signal::ctrl_c().await;
    info!("Shutting down bridge");
    server.stop().await?;
    drop(server);

    interrupted.map_err(|e| BridgeError::Connection {
        message: format!("Failed to wait for Ctrl+C: {}", e),
    })
}

fn list_ports() -> BridgeResult<()> {
    let ports = serialport::available_ports()?;

    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }

    println!("Available serial ports:");
    for port in ports {
        match port.port_type {
            serialport::SerialPortType::UsbPort(info) => println!(
                "  {} (USB {:04x}:{:04x} {})",
                port.port_name,
                info.vid,
                info.pid,
                info.product.unwrap_or_default()
            ),
            _ => println!("  {}", port.port_name),
        }
    }
    Ok(())
}
