mod chat_entry;
mod completion;
mod message;
mod outcome;

pub use chat_entry::*;
pub use completion::*;
pub use message::*;
pub use outcome::*;
