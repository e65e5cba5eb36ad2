mod chat_session;
mod dispatch_completion;
mod extract_content;

pub use chat_session::*;
pub use dispatch_completion::*;
pub use extract_content::*;
