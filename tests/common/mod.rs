#![allow(dead_code)]

use rotbridge::{
    BridgeServer, DeviceIo, MalformedReply, RotatorLink, SerialGateway, SimulatedRotator,
};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Simulated rotator that also records every line written to it.
pub struct RecordingRotator {
    inner: SimulatedRotator,
    partial: Vec<u8>,
    log: Arc<Mutex<Vec<String>>>,
    read_delay: Duration,
}

impl RecordingRotator {
    pub fn new(azimuth: f64, elevation: f64) -> (Self, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let rotator = Self {
            inner: SimulatedRotator::new(azimuth, elevation),
            partial: Vec::new(),
            log: Arc::clone(&log),
            read_delay: Duration::ZERO,
        };
        (rotator, log)
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }
}

impl Read for RecordingRotator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
        self.inner.read(buf)
    }
}

impl Write for RecordingRotator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte == b'\r' {
                let line = String::from_utf8_lossy(&self.partial).to_string();
                self.partial.clear();
                self.log.lock().unwrap().push(line);
            } else {
                self.partial.push(byte);
            }
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl DeviceIo for RecordingRotator {
    fn discard_input(&mut self) -> io::Result<()> {
        self.inner.discard_input()
    }
}

pub async fn start_bridge(
    device: Box<dyn DeviceIo>,
    policy: MalformedReply,
) -> (BridgeServer, SocketAddr) {
    let listen = rotbridge::domain::config::ListenConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let link: Arc<dyn RotatorLink> = Arc::new(SerialGateway::new(
        device,
        Duration::from_millis(200),
        "recording",
    ));

    let mut server = BridgeServer::bind(&listen, link, policy).await.unwrap();
    server.start().unwrap();
    let addr = server.local_addr();
    (server, addr)
}

/// Read until `lines` newline-terminated lines have arrived.
pub async fn read_lines(stream: &mut TcpStream, lines: usize) -> String {
    let mut response = Vec::new();
    let mut byte = [0u8; 1];

    while response.iter().filter(|&&b| b == b'\n').count() < lines {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut byte))
            .await
            .expect("timed out waiting for response")
            .unwrap();
        assert_ne!(n, 0, "connection closed early after {:?}", response);
        response.push(byte[0]);
    }

    String::from_utf8(response).unwrap()
}

pub async fn request(stream: &mut TcpStream, line: &str, lines: usize) -> String {
    stream.write_all(line.as_bytes()).await.unwrap();
    read_lines(stream, lines).await
}

/// True when nothing arrives within `wait`.
pub async fn stays_silent(stream: &mut TcpStream, wait: Duration) -> bool {
    let mut byte = [0u8; 1];
    tokio::time::timeout(wait, stream.read(&mut byte)).await.is_err()
}
