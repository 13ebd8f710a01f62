//! Wire-level vocabulary of both sides of the bridge.
//!
//! Clients speak the rotctld subset (`p`, `P az el`, `S`, `Q`); the rotator
//! controller speaks an uppercase, carriage-return terminated dialect
//! (`AZ`, `EL`, `AZ 123.4`, `EL 56.7`, `Q`).

use std::fmt;

/// Terminator appended to every line sent to the rotator controller.
pub const DEVICE_TERMINATOR: char = '\r';

/// A parsed client request.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    GetPosition,
    SetPosition { azimuth: f64, elevation: f64 },
    Status,
    Quit,
    Unknown { raw: String },
}

/// A line sent to the rotator controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceCommand {
    QueryAzimuth,
    QueryElevation,
    SetAzimuth(f64),
    SetElevation(f64),
    Quit,
}

impl DeviceCommand {
    /// Bytes written to the serial line, terminator included.
    pub fn to_wire(&self) -> String {
        format!("{}{}", self, DEVICE_TERMINATOR)
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCommand::QueryAzimuth => write!(f, "AZ"),
            DeviceCommand::QueryElevation => write!(f, "EL"),
            DeviceCommand::SetAzimuth(value) => write!(f, "AZ {:.1}", value),
            DeviceCommand::SetElevation(value) => write!(f, "EL {:.1}", value),
            DeviceCommand::Quit => write!(f, "Q"),
        }
    }
}

/// What the bridge sends back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientResponse {
    Position { azimuth: String, elevation: String },
    Ack,
    Status,
    Nak,
    Silent,
}

impl ClientResponse {
    /// Text written to the client socket, or `None` when nothing is sent.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            ClientResponse::Position { azimuth, elevation } => {
                Some(format!("{}\n{}\n", azimuth, elevation))
            }
            ClientResponse::Ack => Some("RPRT 0\n".to_string()),
            ClientResponse::Status => Some("S0\n".to_string()),
            ClientResponse::Nak => Some("RPRT -1\n".to_string()),
            ClientResponse::Silent => None,
        }
    }
}

/// Keep the ASCII bytes, silently dropping everything else.
pub fn decode_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| char::from(b))
        .collect()
}
