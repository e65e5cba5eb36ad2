//! # Domain Layer
//!
//! Chat messages, completion outcomes and the entity-ID key parser.
//! This layer is independent of transports and presentation.

mod error;
pub mod models;
pub mod services;

pub use error::*;
pub use models::*;
pub use services::*;
