use thiserror::Error;

/// Errors raised before a request is attempted.
///
/// Request outcomes (blocked, upstream errors, timeouts, ...) are *not*
/// errors; they are returned as [`super::CompletionOutcome`] values.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DomainError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// The bare message without the variant prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Configuration(msg) => msg.clone(),
            Self::Io(e) => e.to_string(),
        }
    }
}
