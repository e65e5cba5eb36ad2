use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::Message;

/// Request timeout used when the caller does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A fully resolved outbound completion call. Built fresh for every dispatch.
#[derive(Clone)]
pub struct CompletionRequest {
    messages: Vec<Message>,
    model: String,
    endpoint: String,
    credential: String,
    timeout: Duration,
}

/// JSON body sent upstream: `{"model": ..., "messages": [...]}`.
#[derive(Debug, Serialize)]
pub struct CompletionBody<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
}

impl CompletionRequest {
    pub fn new(
        messages: Vec<Message>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            messages,
            model: model.into(),
            endpoint: endpoint.into(),
            credential: credential.into(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn body(&self) -> CompletionBody<'_> {
        CompletionBody {
            model: &self.model,
            messages: &self.messages,
        }
    }
}

impl fmt::Debug for CompletionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionRequest")
            .field("messages", &self.messages.len())
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("credential", &mask_secret(&self.credential))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Mask a secret for log output, keeping at most four characters at each end.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
