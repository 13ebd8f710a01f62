// Domain module - Core types shared across layers
pub mod command;
pub mod config;
pub mod error;
