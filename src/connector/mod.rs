//! # Connector Layer
//!
//! External integrations implementing application interfaces:
//! - HTTP transport (reqwest, plus an in-process mock)
//! - Configuration from the environment and `.env`
//! - Terminal rendering

pub mod adapter;
pub mod config;
pub mod terminal;

pub use adapter::*;
pub use config::*;
pub use terminal::*;
