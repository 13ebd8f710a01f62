use crate::domain::command::DeviceCommand;
use crate::domain::error::BridgeResult;
use async_trait::async_trait;

/// Serialized access to the rotator controller.
///
/// Every call is one logical command: no exchange belonging to another
/// caller may reach the wire between its first write and its last read.
#[async_trait]
pub trait RotatorLink: Send + Sync {
    /// Write one command and read its reply line.
    async fn exchange(&self, command: DeviceCommand) -> BridgeResult<String>;

    /// Two exchanges back to back, `first` strictly before `second`.
    async fn exchange_pair(
        &self,
        first: DeviceCommand,
        second: DeviceCommand,
    ) -> BridgeResult<(String, String)>;

    /// Write a command without waiting for a reply.
    async fn notify(&self, command: DeviceCommand) -> BridgeResult<()>;
}
