//! Pure mapping from rotctld requests to rotator-controller exchanges.
//!
//! Nothing here touches a socket or a serial port. The connection handler
//! asks [`parse_command`] what the client said, asks [`translate`] what to do
//! about it, performs the exchanges, and builds the reply from the device
//! lines with [`position_response`].

use crate::domain::command::{ClientCommand, ClientResponse, DeviceCommand};
use crate::domain::error::{BridgeError, BridgeResult};

/// Device-side work required by one client command.
#[derive(Debug, Clone, PartialEq)]
pub enum Translation {
    /// Two queries, azimuth first; the replies become the client response.
    Query {
        azimuth: DeviceCommand,
        elevation: DeviceCommand,
    },
    /// Two set-points, azimuth first; replies are read and discarded.
    Move {
        azimuth: DeviceCommand,
        elevation: DeviceCommand,
        reply: ClientResponse,
    },
    /// Answered without touching the device.
    Reply(ClientResponse),
    /// Best-effort notification to the device, then the connection closes.
    Close(DeviceCommand),
}

/// Parse one trimmed, non-empty request line.
///
/// Only a `P` request can fail: it is recognised as soon as it starts with
/// `"P "` and carries at least two more tokens, after which the azimuth and
/// the remainder of the line must both be finite numbers.
pub fn parse_command(line: &str) -> BridgeResult<ClientCommand> {
    match line {
        "p" => Ok(ClientCommand::GetPosition),
        "S" | "s" => Ok(ClientCommand::Status),
        "Q" | "q" => Ok(ClientCommand::Quit),
        _ if is_set_position(line) => parse_set_position(line),
        _ => Ok(ClientCommand::Unknown {
            raw: line.to_string(),
        }),
    }
}

pub fn translate(command: &ClientCommand) -> Translation {
    match command {
        ClientCommand::GetPosition => Translation::Query {
            azimuth: DeviceCommand::QueryAzimuth,
            elevation: DeviceCommand::QueryElevation,
        },
        ClientCommand::SetPosition { azimuth, elevation } => Translation::Move {
            azimuth: DeviceCommand::SetAzimuth(*azimuth),
            elevation: DeviceCommand::SetElevation(*elevation),
            reply: ClientResponse::Ack,
        },
        ClientCommand::Status => Translation::Reply(ClientResponse::Status),
        ClientCommand::Quit => Translation::Close(DeviceCommand::Quit),
        ClientCommand::Unknown { .. } => Translation::Reply(ClientResponse::Nak),
    }
}

/// Build the `p` reply from the two device lines.
pub fn position_response(azimuth_line: &str, elevation_line: &str) -> ClientResponse {
    ClientResponse::Position {
        azimuth: strip_axis_prefix(azimuth_line, "AZ "),
        elevation: strip_axis_prefix(elevation_line, "EL "),
    }
}

/// Drop a case-insensitive axis prefix such as `"AZ "`; anything else is
/// returned as-is.
pub fn strip_axis_prefix(line: &str, prefix: &str) -> String {
    let line = line.trim();
    match line.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => line[prefix.len()..].trim().to_string(),
        _ => line.to_string(),
    }
}

fn is_set_position(line: &str) -> bool {
    line.starts_with("P ") && line.split_whitespace().count() >= 3
}

fn parse_set_position(line: &str) -> BridgeResult<ClientCommand> {
    let args = line[1..].trim_start();
    let (azimuth_text, elevation_text) = args
        .split_once(char::is_whitespace)
        .ok_or_else(|| malformed(line, "expected azimuth and elevation"))?;

    let azimuth = parse_coordinate(line, azimuth_text)?;
    let elevation = parse_coordinate(line, elevation_text.trim())?;

    Ok(ClientCommand::SetPosition { azimuth, elevation })
}

fn parse_coordinate(line: &str, text: &str) -> BridgeResult<f64> {
    let value: f64 = strip_digit_separators(text)
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| malformed(line, &format!("'{}' is not a number", text)))?;
    if !value.is_finite() {
        return Err(malformed(line, &format!("'{}' is not a finite angle", text)));
    }
    Ok(value)
}

/// Drop `_` digit group separators (`1_80`). Each must sit between two digits.
fn strip_digit_separators(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    for (i, &byte) in bytes.iter().enumerate() {
        if byte != b'_' {
            continue;
        }
        let before = i.checked_sub(1).map(|j| bytes[j]);
        let after = bytes.get(i + 1).copied();
        let between_digits = before.is_some_and(|b| b.is_ascii_digit())
            && after.is_some_and(|b| b.is_ascii_digit());
        if !between_digits {
            return None;
        }
    }
    Some(text.replace('_', ""))
}

fn malformed(line: &str, reason: &str) -> BridgeError {
    BridgeError::Parse {
        command: line.to_string(),
        reason: reason.to_string(),
    }
}
