mod common;

use common::{request, start_bridge, stays_silent};
use rotbridge::{BridgeError, BridgeResult, DeviceIo, MalformedReply};
use std::error::Error;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Rotator whose line can be cut and restored from the test.
struct FlakyRotator {
    unplugged: Arc<AtomicBool>,
    pending: Vec<u8>,
    output: Vec<u8>,
}

impl Read for FlakyRotator {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.unplugged.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
        }
        if self.output.is_empty() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "silent"));
        }
        buf[0] = self.output.remove(0);
        Ok(1)
    }
}

impl Write for FlakyRotator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.unplugged.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "cable pulled"));
        }
        for &byte in buf {
            if byte == b'\r' {
                let line = String::from_utf8_lossy(&self.pending).to_string();
                self.pending.clear();
                let reply = match line.as_str() {
                    "AZ" => "AZ 33.0\r",
                    "EL" => "EL 11.0\r",
                    _ => "OK\r",
                };
                self.output.extend_from_slice(reply.as_bytes());
            } else {
                self.pending.push(byte);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl DeviceIo for FlakyRotator {
    fn discard_input(&mut self) -> io::Result<()> {
        self.output.clear();
        Ok(())
    }
}

fn flaky() -> (FlakyRotator, Arc<AtomicBool>) {
    let unplugged = Arc::new(AtomicBool::new(false));
    let rotator = FlakyRotator {
        unplugged: Arc::clone(&unplugged),
        pending: Vec::new(),
        output: Vec::new(),
    };
    (rotator, unplugged)
}

/// Error handling and resilience tests
#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[test]
    fn test_error_types() {
        let errors = vec![
            BridgeError::Config { message: "Config error".to_string() },
            BridgeError::Startup { message: "Startup error".to_string() },
            BridgeError::Connection { message: "Peer reset".to_string() },
            BridgeError::Device { message: "Serial write failed".to_string() },
            BridgeError::Parse { command: "P a b".to_string(), reason: "not a number".to_string() },
            BridgeError::InvalidInput("Invalid input".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty(), "Error display should not be empty");

            fn assert_send_sync<T: Send + Sync>() {}
            assert_send_sync::<BridgeError>();
        }
    }

    #[test]
    fn test_request_scoped_errors() {
        assert!(BridgeError::Device { message: "x".to_string() }.is_request_scoped());
        assert!(BridgeError::Parse { command: "P".to_string(), reason: "x".to_string() }
            .is_request_scoped());
        assert!(!BridgeError::Connection { message: "x".to_string() }.is_request_scoped());
        assert!(!BridgeError::Startup { message: "x".to_string() }.is_request_scoped());
    }

    #[test]
    fn test_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let bridge_error: BridgeError = io_error.into();
        assert!(matches!(bridge_error, BridgeError::Io(_)));
        assert!(bridge_error.source().is_some());
    }

    #[test]
    fn test_result_type() {
        fn parse_port(text: &str) -> BridgeResult<u16> {
            text.parse()
                .map_err(|_| BridgeError::InvalidInput(format!("bad port {}", text)))
        }

        assert_eq!(parse_port("7777").unwrap(), 7777);
        assert!(parse_port("seven").is_err());
    }

    #[tokio::test]
    async fn test_device_failure_is_silent_and_recoverable() {
        let (rotator, unplugged) = flaky();
        let (mut server, addr) = start_bridge(Box::new(rotator), MalformedReply::Silent).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        assert_eq!(request(&mut client, "p\r\n", 2).await, "33.0\n11.0\n");

        unplugged.store(true, Ordering::SeqCst);
        client.write_all(b"p\r\n").await.unwrap();
        assert!(stays_silent(&mut client, Duration::from_millis(300)).await);
        client.write_all(b"P 1 2\r\n").await.unwrap();
        assert!(stays_silent(&mut client, Duration::from_millis(300)).await);

        // Status never needs the device
        assert_eq!(request(&mut client, "S\r\n", 1).await, "S0\n");

        // Gateway lock was released by the failed commands
        unplugged.store(false, Ordering::SeqCst);
        assert_eq!(request(&mut client, "P 1 2\r\n", 1).await, "RPRT 0\n");

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_device_failure_does_not_affect_other_clients() {
        let (rotator, unplugged) = flaky();
        let (mut server, addr) = start_bridge(Box::new(rotator), MalformedReply::Nak).await;
        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut second = TcpStream::connect(addr).await.unwrap();

        unplugged.store(true, Ordering::SeqCst);
        first.write_all(b"p\r\n").await.unwrap();
        // Device errors stay silent even under the NAK policy
        assert!(stays_silent(&mut first, Duration::from_millis(300)).await);

        unplugged.store(false, Ordering::SeqCst);
        assert_eq!(request(&mut second, "p\r\n", 2).await, "33.0\n11.0\n");
        assert_eq!(request(&mut first, "S\r\n", 1).await, "S0\n");

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_ascii_bytes_are_dropped() {
        let (rotator, _unplugged) = flaky();
        let (mut server, addr) = start_bridge(Box::new(rotator), MalformedReply::Silent).await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"\xffS\xfe\r\n").await.unwrap();
        assert_eq!(common::read_lines(&mut client, 1).await, "S0\n");

        server.stop().await.unwrap();
    }
}
