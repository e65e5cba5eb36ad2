//! Pure domain logic with no I/O.

mod entity_id;

pub use entity_id::*;
