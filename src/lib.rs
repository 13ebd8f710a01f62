//! RotBridge Library
//!
//! Lets several rotctld-style tracking clients share one serial-attached
//! antenna rotator controller. Each TCP connection gets its own handler;
//! every request that needs the controller goes through a single gateway
//! that keeps one logical command on the wire at a time.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::handler::{ConnectionHandler, ConnectionSummary, TrafficCounters};
pub use crate::core::link::RotatorLink;
pub use crate::domain::command::{ClientCommand, ClientResponse, DeviceCommand};
pub use crate::domain::config::{BridgeConfig, MalformedReply};
pub use crate::domain::error::{BridgeError, BridgeResult};
pub use crate::infrastructure::serial::{DeviceIo, SerialGateway, SimulatedRotator};
pub use crate::infrastructure::tcp::BridgeServer;
