use std::time::Duration;

use tracing::{debug, warn};

use crate::application::DispatchCompletionUseCase;
use crate::domain::{ChatEntry, ChatHistory, Message};

/// One interactive chat session: display history plus per-session overrides.
///
/// Only the latest user message is sent upstream, never the history, so a
/// gateway judges each message on its own. The history exists for display.
///
/// Every appended entry is handed to the observer passed to [`Self::submit`]
/// right after it lands, so the caller renders in response to state changes
/// instead of polling the history.
pub struct ChatSessionUseCase {
    dispatcher: DispatchCompletionUseCase,
    history: ChatHistory,
    model: Option<String>,
    credential: Option<String>,
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl ChatSessionUseCase {
    pub fn new(dispatcher: DispatchCompletionUseCase) -> Self {
        Self {
            dispatcher,
            history: ChatHistory::new(),
            model: None,
            credential: None,
            endpoint: None,
            timeout: None,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Model that will be used for the next request.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.dispatcher.defaults().model)
    }

    /// Endpoint that will be used for the next request.
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(&self.dispatcher.defaults().endpoint)
    }

    pub fn has_credential(&self) -> bool {
        self.credential.as_deref().is_some_and(|c| !c.is_empty())
            || !self.dispatcher.defaults().credential.is_empty()
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn clear(&mut self) {
        debug!("Clearing {} history entries", self.history.len());
        self.history.clear();
    }

    /// Send `input` and append both sides of the exchange to the history.
    ///
    /// Returns the assistant entry, or `None` when `input` is blank.
    /// Configuration problems become an error entry rather than an `Err`.
    pub async fn submit<F>(&mut self, input: &str, mut on_entry: F) -> Option<ChatEntry>
    where
        F: FnMut(&ChatEntry),
    {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        on_entry(self.history.push(ChatEntry::user(input)));

        let result = self
            .dispatcher
            .execute(
                vec![Message::user(input)],
                self.model.as_deref(),
                self.credential.as_deref(),
                self.endpoint.as_deref(),
                self.timeout,
            )
            .await;

        let entry = match result {
            Ok(dispatch) => ChatEntry::from_dispatch(&dispatch),
            Err(e) => {
                warn!("Request not sent: {e}");
                ChatEntry::from_failure(e.detail())
            }
        };

        let entry = self.history.push(entry);
        on_entry(entry);
        Some(entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::application::{DispatchDefaults, HttpResponse, TransportError};
    use crate::connector::MockTransport;
    use crate::domain::Role;

    fn session(transport: Arc<MockTransport>, credential: &str) -> ChatSessionUseCase {
        let dispatcher = DispatchCompletionUseCase::new(
            transport,
            DispatchDefaults::new("https://llm.test/v1/chat/completions", credential, "gpt-4o-mini"),
        );
        ChatSessionUseCase::new(dispatcher)
    }

    #[tokio::test]
    async fn test_only_latest_message_is_forwarded() {
        let transport = Arc::new(MockTransport::new());
        let mut session = session(transport.clone(), "sk");

        session.submit("first", |_| {}).await;
        session.submit("second", |_| {}).await;

        assert_eq!(session.history().len(), 4);
        let call = transport.last_call().unwrap();
        assert_eq!(
            call.body["messages"],
            json!([{"role": "user", "content": "second"}])
        );
    }

    #[tokio::test]
    async fn test_observer_sees_each_entry_once() {
        let transport = Arc::new(MockTransport::new());
        let mut session = session(transport, "sk");
        let mut seen: Vec<(Role, String)> = Vec::new();

        let reply = session
            .submit("ping", |entry| seen.push((entry.role(), entry.content().to_string())))
            .await
            .unwrap();

        assert_eq!(
            seen,
            vec![
                (Role::User, "ping".to_string()),
                (Role::Assistant, "echo: ping".to_string()),
            ]
        );
        assert_eq!(reply.content(), "echo: ping");
        assert_eq!(reply.status_code(), Some(200));
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let transport = Arc::new(MockTransport::new());
        let mut session = session(transport.clone(), "sk");

        assert!(session.submit("   ", |_| panic!("no entries expected")).await.is_none());
        assert!(session.history().is_empty());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_configuration_error_becomes_entry() {
        let transport = Arc::new(MockTransport::new());
        let mut session = session(transport.clone(), "");

        let reply = session.submit("hello", |_| {}).await.unwrap();

        assert!(reply.is_error());
        assert!(reply.content().starts_with("Error: API key is required"));
        assert_eq!(reply.status_code(), Some(0));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_blocked_reply_carries_threats() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(
            200,
            r#"{"action":"blocked","message":"PII detected","threats":[{"category":"pii","severity":"HIGH","method":"regex"}]}"#,
        ));
        let mut session = session(transport, "sk");

        let reply = session.submit("my ssn is ...", |_| {}).await.unwrap();

        assert!(reply.is_blocked());
        assert_eq!(reply.content(), "PII detected");
        assert_eq!(reply.threats()[0].display_method(), "regex");
    }

    #[tokio::test]
    async fn test_transport_failure_reply() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(TransportError::Connect("refused".into()));
        let mut session = session(transport, "sk");

        let reply = session.submit("hi", |_| {}).await.unwrap();

        assert!(reply.is_error());
        assert!(reply.content().contains("https://llm.test/v1/chat/completions"));
        assert_eq!(reply.status_code(), Some(0));
    }

    #[tokio::test]
    async fn test_overrides_and_clear() {
        let transport = Arc::new(MockTransport::new());
        let mut session = session(transport.clone(), "")
            .with_model(Some("gpt-4o".into()))
            .with_credential(Some("sk-session".into()))
            .with_endpoint(Some("http://localhost:9999/v1/chat/completions".into()))
            .with_timeout(Some(Duration::from_secs(3)));

        assert_eq!(session.model(), "gpt-4o");
        assert_eq!(session.endpoint(), "http://localhost:9999/v1/chat/completions");
        assert!(session.has_credential());

        session.submit("hi", |_| {}).await;
        let call = transport.last_call().unwrap();
        assert_eq!(call.bearer_token, "sk-session");
        assert_eq!(call.timeout, Duration::from_secs(3));

        session.clear();
        assert!(session.history().is_empty());
    }
}
