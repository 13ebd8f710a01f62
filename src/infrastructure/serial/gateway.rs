use crate::core::link::RotatorLink;
use crate::domain::command::{decode_ascii, DeviceCommand, DEVICE_TERMINATOR};
use crate::domain::config::SerialConfig;
use crate::domain::error::{BridgeError, BridgeResult};
use crate::infrastructure::serial::device::{DeviceIo, SerialDevice};
use async_trait::async_trait;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest reply line accepted from the rotator controller.
pub const MAX_REPLY_BYTES: usize = 256;

/// Exclusive gateway to the one rotator controller of the process.
///
/// Device I/O is blocking, so each logical command runs on the blocking pool
/// while holding the device mutex from its first write to its last read.
pub struct SerialGateway {
    device: Arc<Mutex<Box<dyn DeviceIo>>>,
    read_timeout: Duration,
    label: String,
}

impl SerialGateway {
    /// Open the configured serial port. Failure here is fatal to startup.
    pub fn open(config: &SerialConfig) -> BridgeResult<Self> {
        let device = SerialDevice::open(config)?;
        Ok(Self::new(Box::new(device), config.timeout(), config.port.clone()))
    }

    pub fn new(
        device: Box<dyn DeviceIo>,
        read_timeout: Duration,
        label: impl Into<String>,
    ) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            read_timeout,
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    async fn locked<T, F>(&self, work: F) -> BridgeResult<T>
    where
        F: FnOnce(&mut Box<dyn DeviceIo>) -> BridgeResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let device = Arc::clone(&self.device);

        tokio::task::spawn_blocking(move || {
            let mut guard = device.lock().map_err(|_| BridgeError::Device {
                message: "serial device lock poisoned".to_string(),
            })?;
            work(&mut guard)
        })
        .await
        .map_err(|e| BridgeError::Device {
            message: format!("serial worker failed: {}", e),
        })?
    }
}

#[async_trait]
impl RotatorLink for SerialGateway {
    async fn exchange(&self, command: DeviceCommand) -> BridgeResult<String> {
        let timeout = self.read_timeout;
        self.locked(move |device| transact(&mut **device, command, timeout))
            .await
    }

    async fn exchange_pair(
        &self,
        first: DeviceCommand,
        second: DeviceCommand,
    ) -> BridgeResult<(String, String)> {
        let timeout = self.read_timeout;
        self.locked(move |device| {
            let first_reply = transact(&mut **device, first, timeout)?;
            let second_reply = transact(&mut **device, second, timeout)?;
            Ok((first_reply, second_reply))
        })
        .await
    }

    async fn notify(&self, command: DeviceCommand) -> BridgeResult<()> {
        self.locked(move |device| write_command(&mut **device, command))
            .await
    }
}

impl Drop for SerialGateway {
    fn drop(&mut self) {
        info!("Serial device {} released", self.label);
    }
}

/// One write-then-read round trip. Stale input is dropped first so the
/// reply read belongs to this command.
fn transact<D>(device: &mut D, command: DeviceCommand, timeout: Duration) -> BridgeResult<String>
where
    D: DeviceIo + ?Sized,
{
    device
        .discard_input()
        .map_err(|e| device_error("discard input", e))?;
    write_command(device, command)?;
    let reply = read_reply(device, timeout)?;
    debug!("Rotator replied {:?} to {}", reply, command);
    Ok(reply)
}

fn write_command<D>(device: &mut D, command: DeviceCommand) -> BridgeResult<()>
where
    D: DeviceIo + ?Sized,
{
    let wire = command.to_wire();
    debug!("Sending {:?} to rotator", wire);
    device
        .write_all(wire.as_bytes())
        .and_then(|_| device.flush())
        .map_err(|e| device_error("write", e))
}

/// Read up to the carriage return, [`MAX_REPLY_BYTES`] or `timeout`,
/// whichever comes first. A silent device yields an empty line.
fn read_reply<D>(device: &mut D, timeout: Duration) -> BridgeResult<String>
where
    D: DeviceIo + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut reply = Vec::with_capacity(MAX_REPLY_BYTES);
    let mut byte = [0u8; 1];

    while reply.len() < MAX_REPLY_BYTES {
        match device.read(&mut byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == DEVICE_TERMINATOR as u8 => break,
            Ok(_) => reply.push(byte[0]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e)
                if e.kind() == io::ErrorKind::TimedOut
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                warn!("Timed out waiting for rotator reply");
                break;
            }
            Err(e) => return Err(device_error("read", e)),
        }

        // A zero timeout leaves the cut-off to the device's own non-blocking read
        if !timeout.is_zero() && Instant::now() >= deadline {
            warn!("Rotator reply exceeded {:?}; using partial line", timeout);
            break;
        }
    }

    Ok(decode_ascii(&reply).trim().to_string())
}

fn device_error(action: &str, error: io::Error) -> BridgeError {
    BridgeError::Device {
        message: format!("serial {} failed: {}", action, error),
    }
}
