use thiserror::Error;

/// RotBridge unified error type
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Startup error: {message}")]
    Startup { message: String },

    #[error("Connection error: {message}")]
    Connection { message: String },

    #[error("Device error: {message}")]
    Device { message: String },

    #[error("Malformed command '{command}': {reason}")]
    Parse { command: String, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BridgeError {
    /// Errors that end a single request but leave the connection usable.
    pub fn is_request_scoped(&self) -> bool {
        matches!(self, BridgeError::Device { .. } | BridgeError::Parse { .. })
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
