use crate::domain::config::{FlowControlConfig, ParityConfig, SerialConfig};
use crate::domain::error::{BridgeError, BridgeResult};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use tracing::info;

/// Byte stream to a rotator controller.
///
/// Reads honour the line's own timeout and report it as
/// [`io::ErrorKind::TimedOut`].
pub trait DeviceIo: Read + Write + Send {
    /// Throw away anything received but not yet read.
    fn discard_input(&mut self) -> io::Result<()>;
}

/// A rotator controller on a real serial port.
pub struct SerialDevice {
    port: Box<dyn SerialPort>,
}

impl SerialDevice {
    pub fn open(config: &SerialConfig) -> BridgeResult<Self> {
        let builder = serialport::new(config.port.as_str(), config.baud_rate)
            .data_bits(data_bits(config.data_bits)?)
            .stop_bits(stop_bits(config.stop_bits)?)
            .parity(match config.parity {
                ParityConfig::None => serialport::Parity::None,
                ParityConfig::Even => serialport::Parity::Even,
                ParityConfig::Odd => serialport::Parity::Odd,
            })
            .flow_control(match config.flow_control {
                FlowControlConfig::None => serialport::FlowControl::None,
                FlowControlConfig::Software => serialport::FlowControl::Software,
                FlowControlConfig::Hardware => serialport::FlowControl::Hardware,
            })
            .timeout(config.timeout());

        let port = builder.open().map_err(|e| BridgeError::Startup {
            message: format!("Could not open serial port {}: {}", config.port, e),
        })?;

        info!(
            "Serial port {} opened at {} baud",
            config.port, config.baud_rate
        );

        Ok(Self { port })
    }
}

impl Read for SerialDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl DeviceIo for SerialDevice {
    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}

fn data_bits(bits: u8) -> BridgeResult<serialport::DataBits> {
    match bits {
        5 => Ok(serialport::DataBits::Five),
        6 => Ok(serialport::DataBits::Six),
        7 => Ok(serialport::DataBits::Seven),
        8 => Ok(serialport::DataBits::Eight),
        _ => Err(BridgeError::Config {
            message: format!("Invalid data bits: {}", bits),
        }),
    }
}

fn stop_bits(bits: u8) -> BridgeResult<serialport::StopBits> {
    match bits {
        1 => Ok(serialport::StopBits::One),
        2 => Ok(serialport::StopBits::Two),
        _ => Err(BridgeError::Config {
            message: format!("Invalid stop bits: {}", bits),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_is_startup_error() {
        let config = SerialConfig {
            port: "/dev/rotbridge-no-such-port".to_string(),
            ..SerialConfig::default()
        };

        let result = SerialDevice::open(&config);
        assert!(matches!(result, Err(BridgeError::Startup { .. })));
    }

    #[test]
    fn test_invalid_line_settings_rejected() {
        let config = SerialConfig {
            data_bits: 9,
            ..SerialConfig::default()
        };
        assert!(matches!(
            SerialDevice::open(&config),
            Err(BridgeError::Config { .. })
        ));

        let config = SerialConfig {
            stop_bits: 3,
            ..SerialConfig::default()
        };
        assert!(matches!(
            SerialDevice::open(&config),
            Err(BridgeError::Config { .. })
        ));
    }

    #[test]
    fn test_data_bits_mapping() {
        assert_eq!(data_bits(8).unwrap(), serialport::DataBits::Eight);
        assert_eq!(data_bits(7).unwrap(), serialport::DataBits::Seven);
        assert_eq!(stop_bits(2).unwrap(), serialport::StopBits::Two);
    }
}
