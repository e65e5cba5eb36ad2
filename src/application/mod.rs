//! # Application Layer
//!
//! The transport port and the use cases built on it: dispatch and
//! classification, content extraction, and the chat session.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
