// Serial module - Rotator controller access
pub mod device;
pub mod gateway;
pub mod simulator;

pub use device::{DeviceIo, SerialDevice};
pub use gateway::SerialGateway;
pub use simulator::SimulatedRotator;
