// Core module - Protocol translation and connection handling
pub mod handler;
pub mod link;
pub mod translator;

pub use handler::{ConnectionHandler, ConnectionSummary, TrafficCounters};
pub use link::RotatorLink;
pub use translator::{parse_command, translate, Translation};
