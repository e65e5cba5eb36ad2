use chrono::Local;
use serde::Serialize;
use serde_json::{json, Value};

use super::{CompletionOutcome, Dispatch, Message, Role, Threat};

/// Shown in place of an empty successful completion.
pub const NO_CONTENT_PLACEHOLDER: &str = "No response content received from API.";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A message as displayed in the chat history, with presentation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEntry {
    message: Message,
    timestamp: String,
    error: bool,
    error_message: Option<String>,
    threats: Vec<Threat>,
    raw_data: Option<Value>,
    latency_ms: Option<f64>,
    status_code: Option<u16>,
}

impl ChatEntry {
    fn base(message: Message) -> Self {
        Self {
            message,
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            error: false,
            error_message: None,
            threats: Vec::new(),
            raw_data: None,
            latency_ms: None,
            status_code: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::base(Message::user(content))
    }

    /// Build the assistant entry for a finished dispatch.
    pub fn from_dispatch(dispatch: &Dispatch) -> Self {
        let mut entry = match &dispatch.outcome {
            CompletionOutcome::Success { content, .. } => {
                let content = if content.is_empty() {
                    NO_CONTENT_PLACEHOLDER
                } else {
                    content.as_str()
                };
                Self::base(Message::assistant(content))
            }
            outcome => {
                let message = outcome.message().unwrap_or_default().to_string();
                let mut entry = Self::base(Message::assistant(message.clone()));
                entry.error = true;
                entry.error_message = Some(message);
                entry.threats = outcome.threats().to_vec();
                entry.raw_data = Some(
                    outcome
                        .raw_response()
                        .cloned()
                        .unwrap_or_else(|| json!({})),
                );
                entry
            }
        };
        entry.latency_ms = Some(dispatch.latency_ms);
        entry.status_code = Some(dispatch.status_code);
        entry
    }

    /// Entry for a failure that prevented any request from being made.
    pub fn from_failure(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let mut entry = Self::base(Message::assistant(format!("Error: {detail}")));
        entry.error = true;
        entry.raw_data = Some(json!({ "error": detail }));
        entry.error_message = Some(detail);
        entry.latency_ms = Some(0.0);
        entry.status_code = Some(0);
        entry
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn role(&self) -> Role {
        self.message.role()
    }

    pub fn content(&self) -> &str {
        self.message.content()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn threats(&self) -> &[Threat] {
        &self.threats
    }

    pub fn is_blocked(&self) -> bool {
        self.error && !self.threats.is_empty()
    }

    pub fn raw_data(&self) -> Option<&Value> {
        self.raw_data.as_ref()
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }
}

/// In-memory, display-only conversation history.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    entries: Vec<ChatEntry>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ChatEntry) -> &ChatEntry {
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&ChatEntry> {
        self.entries.last()
    }
}
