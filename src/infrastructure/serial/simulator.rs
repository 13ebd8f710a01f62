use crate::domain::command::{decode_ascii, DEVICE_TERMINATOR};
use crate::infrastructure::serial::device::DeviceIo;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use tracing::debug;

/// In-process stand-in for a rotator controller.
///
/// Answers `AZ`/`EL` with the current angles, accepts `AZ x`/`EL x` as new
/// set-points and echoes them back, ignores `Q`, and echoes anything else in
/// upper case. Every reply is carriage-return terminated.
#[derive(Debug, Default)]
pub struct SimulatedRotator {
    azimuth: f64,
    elevation: f64,
    partial: Vec<u8>,
    output: VecDeque<u8>,
}

impl SimulatedRotator {
    pub fn new(azimuth: f64, elevation: f64) -> Self {
        Self {
            azimuth,
            elevation,
            ..Default::default()
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.azimuth, self.elevation)
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        debug!("Simulated rotator received {:?}", line);

        let reply = match line.split_once(' ') {
            None if line == "AZ" => Some(format!("AZ {:.1}", self.azimuth)),
            None if line == "EL" => Some(format!("EL {:.1}", self.elevation)),
            None if line == "Q" || line.is_empty() => None,
            Some(("AZ", value)) => match value.trim().parse::<f64>() {
                Ok(azimuth) => {
                    self.azimuth = azimuth;
                    Some(format!("AZ {:.1}", azimuth))
                }
                Err(_) => Some(line.to_ascii_uppercase()),
            },
            Some(("EL", value)) => match value.trim().parse::<f64>() {
                Ok(elevation) => {
                    self.elevation = elevation;
                    Some(format!("EL {:.1}", elevation))
                }
                Err(_) => Some(line.to_ascii_uppercase()),
            },
            _ => Some(line.to_ascii_uppercase()),
        };

        if let Some(reply) = reply {
            self.output.extend(reply.bytes());
            self.output.push_back(DEVICE_TERMINATOR as u8);
        }
    }
}

impl Read for SimulatedRotator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.output.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "simulated rotator has nothing to say",
            ));
        }

        let n = buf.len().min(self.output.len());
        for (slot, byte) in buf.iter_mut().zip(self.output.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedRotator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == DEVICE_TERMINATOR as u8 {
                let line = decode_ascii(&std::mem::take(&mut self.partial));
                self.handle_line(&line);
            } else {
                self.partial.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DeviceIo for SimulatedRotator {
    fn discard_input(&mut self) -> io::Result<()> {
        self.output.clear();
        Ok(())
    }
}
