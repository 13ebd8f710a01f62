// TCP module - Client-facing listener
pub mod server;

pub use server::{BridgeServer, ClientConnection};
