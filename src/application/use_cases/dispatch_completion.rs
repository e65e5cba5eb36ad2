use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::application::extract_content;
use crate::application::{HttpTransport, TransportError};
use crate::domain::{
    mask_secret, CompletionOutcome, CompletionRequest, Dispatch, DomainError, Message, Threat,
    DEFAULT_TIMEOUT,
};

const DEFAULT_BLOCKED_MESSAGE: &str = "Message blocked by security gateway";
const DEFAULT_GATEWAY_ERROR_MESSAGE: &str = "Error from gateway";

/// Fallback values used when a dispatch call leaves a parameter unset.
#[derive(Clone)]
pub struct DispatchDefaults {
    pub endpoint: String,
    pub credential: String,
    pub model: String,
    pub timeout: Duration,
}

impl DispatchDefaults {
    pub fn new(
        endpoint: impl Into<String>,
        credential: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential: credential.into(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for DispatchDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchDefaults")
            .field("endpoint", &self.endpoint)
            .field("credential", &mask_secret(&self.credential))
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sends one completion request and classifies whatever comes back.
///
/// Only missing configuration is reported as an error. Every response or
/// transport failure becomes a [`CompletionOutcome`], so callers render all
/// of them the same way. Nothing is retried.
pub struct DispatchCompletionUseCase {
    transport: Arc<dyn HttpTransport>,
    defaults: DispatchDefaults,
}

impl DispatchCompletionUseCase {
    pub fn new(transport: Arc<dyn HttpTransport>, defaults: DispatchDefaults) -> Self {
        Self {
            transport,
            defaults,
        }
    }

    pub fn defaults(&self) -> &DispatchDefaults {
        &self.defaults
    }

    pub async fn execute(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        credential: Option<&str>,
        endpoint: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Dispatch, DomainError> {
        let request = self.resolve(messages, model, credential, endpoint, timeout)?;
        Ok(self.send(&request).await)
    }

    /// Apply fallbacks and check preconditions without touching the network.
    pub fn resolve(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        credential: Option<&str>,
        endpoint: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<CompletionRequest, DomainError> {
        if messages.is_empty() {
            return Err(DomainError::configuration("Messages list must not be empty."));
        }

        let credential = non_empty(credential).unwrap_or(&self.defaults.credential);
        if credential.is_empty() {
            return Err(DomainError::configuration(
                "API key is required. Set OPENAI_API_KEY in .env file.",
            ));
        }

        let endpoint = non_empty(endpoint).unwrap_or(&self.defaults.endpoint);
        if endpoint.is_empty() {
            return Err(DomainError::configuration(
                "API URL is required. Set OPENAI_API_URL in .env file.",
            ));
        }

        let model = non_empty(model).unwrap_or(&self.defaults.model);

        Ok(CompletionRequest::new(
            messages,
            model,
            endpoint,
            credential,
            timeout.unwrap_or(self.defaults.timeout),
        ))
    }

    /// Perform the request and classify the result.
    pub async fn send(&self, request: &CompletionRequest) -> Dispatch {
        debug!("Dispatching completion: {:?}", request);

        let body = match serde_json::to_value(request.body()) {
            Ok(body) => body,
            Err(e) => {
                return Dispatch::from(CompletionOutcome::NetworkFailure {
                    message: format!("Request failed: {e}"),
                    latency_ms: 0.0,
                });
            }
        };

        let started = Instant::now();
        let result = self
            .transport
            .post_json(
                request.endpoint(),
                request.credential(),
                &body,
                request.timeout(),
            )
            .await;

        let outcome = match result {
            Ok(response) => classify_response(response.status, &response.body, started),
            Err(e) => classify_transport_error(&e, request.endpoint(), request.timeout(), started),
        };

        if outcome.is_error() {
            warn!(
                kind = outcome.kind(),
                status = outcome.status_code(),
                latency_ms = outcome.latency_ms(),
                "Completion failed: {}",
                outcome.message().unwrap_or_default()
            );
        } else {
            info!(
                kind = outcome.kind(),
                status = outcome.status_code(),
                latency_ms = outcome.latency_ms(),
                "Completion succeeded"
            );
        }

        Dispatch::from(outcome)
    }
}

/// Classify an HTTP response. `started` is when the request was issued; the
/// reported latency includes parsing.
pub fn classify_response(status: u16, body_text: &str, started: Instant) -> CompletionOutcome {
    let body = parse_body(body_text);

    // Gateways signal blocking in the payload, often with a 200 status.
    match body.get("action").and_then(Value::as_str) {
        Some("blocked") => {
            let message = text_field(&body, "message", DEFAULT_BLOCKED_MESSAGE);
            let threats = parse_threats(body.get("threats"));
            return CompletionOutcome::GatewayBlocked {
                message,
                threats,
                status_code: status,
                latency_ms: elapsed_ms(started),
                raw_response: Value::Object(body),
            };
        }
        Some("error") => {
            let message = text_field(&body, "message", DEFAULT_GATEWAY_ERROR_MESSAGE);
            return CompletionOutcome::GatewayError {
                message,
                status_code: status,
                latency_ms: elapsed_ms(started),
                raw_response: Value::Object(body),
            };
        }
        _ => {}
    }

    if status >= 400 {
        let message = upstream_error_message(&body, body_text, status);
        return CompletionOutcome::UpstreamHttpError {
            message,
            status_code: status,
            latency_ms: elapsed_ms(started),
            raw_response: json!({ "status_code": status, "response": body_text }),
        };
    }

    let raw_response = Value::Object(body);
    let content = extract_content(&raw_response);
    CompletionOutcome::Success {
        content,
        status_code: status,
        latency_ms: elapsed_ms(started),
        raw_response,
    }
}

/// Classify a failure where no HTTP response was received.
pub fn classify_transport_error(
    error: &TransportError,
    endpoint: &str,
    timeout: Duration,
    started: Instant,
) -> CompletionOutcome {
    let latency_ms = elapsed_ms(started);
    match error {
        TransportError::Timeout => CompletionOutcome::Timeout {
            message: format!(
                "Request timeout after {:?}s. API may be slow or unreachable.",
                timeout.as_secs_f64()
            ),
            latency_ms,
        },
        TransportError::Connect(_) => CompletionOutcome::NetworkFailure {
            message: format!(
                "Connection error: Unable to reach API at {endpoint}. Check your network and URL."
            ),
            latency_ms,
        },
        TransportError::Other(detail) => CompletionOutcome::NetworkFailure {
            message: format!("Request failed: {detail}"),
            latency_ms,
        },
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Parse the body as a JSON object, wrapping anything else as `{"raw": text}`.
fn parse_body(text: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        _ => {
            let mut map = Map::new();
            map.insert("raw".to_string(), Value::String(text.to_string()));
            map
        }
    }
}

fn text_field(body: &Map<String, Value>, key: &str, default: &str) -> String {
    body.get(key)
        .and_then(scalar_text)
        .unwrap_or_else(|| default.to_string())
}

/// Threats exactly as the gateway listed them. A `threats` value that is not
/// a list stays visible only in the raw response.
fn parse_threats(value: Option<&Value>) -> Vec<Threat> {
    match value {
        Some(Value::Array(items)) => items.iter().cloned().map(Threat::new).collect(),
        Some(other) => {
            warn!("Ignoring non-list threats field: {other}");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Message for a >= 400 response: `error.message`, a scalar `error`, the raw
/// body text, then a generic fallback.
fn upstream_error_message(body: &Map<String, Value>, raw_text: &str, status: u16) -> String {
    let from_error = match body.get("error") {
        Some(Value::Object(error)) => error.get("message").and_then(scalar_text),
        Some(other) => scalar_text(other),
        None => None,
    };

    from_error
        .or_else(|| (!raw_text.trim().is_empty()).then(|| raw_text.to_string()))
        .unwrap_or_else(|| format!("HTTP {status} error"))
}

/// Text of a non-empty scalar; `None` for null, empty strings and containers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::MockTransport;
    use crate::application::HttpResponse;

    fn defaults() -> DispatchDefaults {
        DispatchDefaults::new(
            "https://llm.test/v1/chat/completions",
            "sk-default",
            "gpt-4o-mini",
        )
    }

    fn use_case(transport: Arc<MockTransport>) -> DispatchCompletionUseCase {
        DispatchCompletionUseCase::new(transport, defaults())
    }

    #[test]
    fn blocked_payload_wins_over_200_status() {
        let body = r#"{"action":"blocked","message":"nope","threats":[{"category":"pii","severity":"HIGH"}]}"#;
        let outcome = classify_response(200, body, Instant::now());

        match outcome {
            CompletionOutcome::GatewayBlocked {
                message,
                threats,
                status_code,
                raw_response,
                ..
            } => {
                assert_eq!(message, "nope");
                assert_eq!(status_code, 200);
                assert_eq!(threats.len(), 1);
                assert_eq!(
                    serde_json::to_value(&threats).unwrap(),
                    json!([{"category": "pii", "severity": "HIGH"}])
                );
                assert_eq!(raw_response["action"], "blocked");
            }
            other => panic!("expected GatewayBlocked, got {other:?}"),
        }
    }

    #[test]
    fn blocked_payload_defaults() {
        let outcome = classify_response(403, r#"{"action":"blocked"}"#, Instant::now());
        assert_eq!(outcome.message(), Some(DEFAULT_BLOCKED_MESSAGE));
        assert!(outcome.threats().is_empty());
        assert_eq!(outcome.status_code(), 403);
    }

    #[test]
    fn blocked_threats_are_passed_through_unchanged() {
        let threats = json!([
            {"category": "pii", "severity": 3, "score": null},
            "jailbreak",
            {"category": null, "method": "llm"}
        ]);
        let body = json!({"action": "blocked", "threats": threats}).to_string();
        let outcome = classify_response(200, &body, Instant::now());

        assert_eq!(outcome.threats().len(), 3);
        assert_eq!(serde_json::to_value(outcome.threats()).unwrap(), threats);
        assert_eq!(outcome.threats()[2].display_category(), "unknown");
        assert_eq!(outcome.threats()[2].display_method(), "llm");
    }

    #[test]
    fn gateway_error_payload() {
        let outcome = classify_response(200, r#"{"action":"error"}"#, Instant::now());
        assert_eq!(outcome.kind(), "gateway_error");
        assert_eq!(outcome.message(), Some(DEFAULT_GATEWAY_ERROR_MESSAGE));

        let outcome = classify_response(
            502,
            r#"{"action":"error","message":"scanner down"}"#,
            Instant::now(),
        );
        assert_eq!(outcome.message(), Some("scanner down"));
        assert_eq!(outcome.status_code(), 502);
    }

    #[test]
    fn allowed_action_falls_through_to_completion() {
        let body = r#"{"action":"allowed","choices":[{"message":{"content":"ok"}}]}"#;
        let outcome = classify_response(200, body, Instant::now());
        match outcome {
            CompletionOutcome::Success { content, .. } => assert_eq!(content, "ok"),
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn allowed_action_with_error_status_is_upstream_error() {
        let body = r#"{"action":"allowed","error":"rate limited"}"#;
        let outcome = classify_response(429, body, Instant::now());
        assert_eq!(outcome.kind(), "upstream_http_error");
        assert_eq!(outcome.message(), Some("rate limited"));
    }

    #[test]
    fn success_extracts_content() {
        let body = r#"{"choices":[{"message":{"content":"hi"}}]}"#;
        let outcome = classify_response(200, body, Instant::now());
        match &outcome {
            CompletionOutcome::Success {
                content,
                status_code,
                latency_ms,
                raw_response,
            } => {
                assert_eq!(content, "hi");
                assert_eq!(*status_code, 200);
                assert!(*latency_ms >= 0.0);
                assert_eq!(extract_content(raw_response), "hi");
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn upstream_error_with_nested_message() {
        let body = r#"{"error":{"message":"server exploded","type":"server_error"}}"#;
        let outcome = classify_response(500, body, Instant::now());
        match outcome {
            CompletionOutcome::UpstreamHttpError {
                message,
                status_code,
                raw_response,
                ..
            } => {
                assert_eq!(message, "server exploded");
                assert_eq!(status_code, 500);
                assert_eq!(
                    raw_response,
                    json!({"status_code": 500, "response": body})
                );
            }
            other => panic!("expected UpstreamHttpError, got {other:?}"),
        }
    }

    #[test]
    fn upstream_error_with_scalar_error() {
        let outcome = classify_response(401, r#"{"error":"bad key"}"#, Instant::now());
        assert_eq!(outcome.message(), Some("bad key"));
    }

    #[test]
    fn upstream_error_object_without_message_uses_raw_text() {
        let body = r#"{"error":{"code":"x"}}"#;
        let outcome = classify_response(400, body, Instant::now());
        assert_eq!(outcome.message(), Some(body));
    }

    #[test]
    fn upstream_error_with_non_json_body() {
        let outcome = classify_response(502, "<html>Bad Gateway</html>", Instant::now());
        assert_eq!(outcome.message(), Some("<html>Bad Gateway</html>"));
    }

    #[test]
    fn upstream_error_with_empty_body() {
        let outcome = classify_response(503, "", Instant::now());
        assert_eq!(outcome.message(), Some("HTTP 503 error"));
    }

    #[test]
    fn non_json_success_body_is_wrapped() {
        let outcome = classify_response(200, "plain text", Instant::now());
        match outcome {
            CompletionOutcome::Success {
                content,
                raw_response,
                ..
            } => {
                assert_eq!(content, "");
                assert_eq!(raw_response, json!({"raw": "plain text"}));
            }
            other => panic!("expected Success, got {other:?}"),
        }
    }

    #[test]
    fn transport_errors_map_to_status_zero() {
        let started = Instant::now();
        let timeout = classify_transport_error(
            &TransportError::Timeout,
            "https://llm.test",
            Duration::from_secs(60),
            started,
        );
        assert_eq!(timeout.kind(), "timeout");
        assert_eq!(timeout.status_code(), 0);
        assert!(timeout.latency_ms() >= 0.0);
        assert_eq!(
            timeout.message(),
            Some("Request timeout after 60.0s. API may be slow or unreachable.")
        );

        let refused = classify_transport_error(
            &TransportError::Connect("refused".into()),
            "https://llm.test",
            Duration::from_secs(60),
            started,
        );
        assert_eq!(refused.kind(), "network_failure");
        assert!(refused.message().unwrap().contains("https://llm.test"));

        let other = classify_transport_error(
            &TransportError::Other("bad certificate".into()),
            "https://llm.test",
            Duration::from_secs(60),
            started,
        );
        assert_eq!(other.message(), Some("Request failed: bad certificate"));
    }

    #[tokio::test]
    async fn empty_messages_fail_before_transport() {
        let transport = Arc::new(MockTransport::new());
        let err = use_case(transport.clone())
            .execute(vec![], None, None, None, None)
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_credential_fails_before_transport() {
        let transport = Arc::new(MockTransport::new());
        let use_case = DispatchCompletionUseCase::new(
            transport.clone(),
            DispatchDefaults::new("https://llm.test", "", "m"),
        );

        let err = use_case
            .execute(vec![Message::user("hi")], None, Some(""), None, None)
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(err.to_string().contains("API key"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_endpoint_fails_before_transport() {
        let transport = Arc::new(MockTransport::new());
        let use_case = DispatchCompletionUseCase::new(
            transport.clone(),
            DispatchDefaults::new("", "sk", "m"),
        );

        let err = use_case
            .execute(vec![Message::user("hi")], None, None, None, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("API URL"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn parameters_override_defaults() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(
            200,
            r#"{"choices":[{"message":{"content":"hey"}}]}"#,
        ));

        let dispatch = use_case(transport.clone())
            .execute(
                vec![Message::user("hi")],
                Some("gpt-4o"),
                Some("sk-override"),
                Some("https://other.test/v1/chat/completions"),
                Some(Duration::from_secs(5)),
            )
            .await
            .unwrap();

        assert_eq!(dispatch.status_code, 200);
        let call = transport.last_call().unwrap();
        assert_eq!(call.url, "https://other.test/v1/chat/completions");
        assert_eq!(call.bearer_token, "sk-override");
        assert_eq!(call.timeout, Duration::from_secs(5));
        assert_eq!(call.body["model"], "gpt-4o");
        assert_eq!(call.body["messages"], json!([{"role": "user", "content": "hi"}]));
    }

    #[tokio::test]
    async fn empty_model_falls_back_to_default() {
        let transport = Arc::new(MockTransport::new());
        transport.push_response(HttpResponse::new(200, "{}"));

        use_case(transport.clone())
            .execute(vec![Message::user("hi")], Some(""), None, None, None)
            .await
            .unwrap();

        let call = transport.last_call().unwrap();
        assert_eq!(call.body["model"], "gpt-4o-mini");
        assert_eq!(call.bearer_token, "sk-default");
        assert_eq!(call.timeout, DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn timeout_is_returned_as_data() {
        let transport = Arc::new(MockTransport::new());
        transport.push_error(TransportError::Timeout);

        let dispatch = use_case(transport.clone())
            .execute(
                vec![Message::user("hi")],
                None,
                None,
                None,
                Some(Duration::from_millis(1500)),
            )
            .await
            .unwrap();

        assert_eq!(dispatch.outcome.kind(), "timeout");
        assert_eq!(dispatch.status_code, 0);
        assert!(dispatch.latency_ms >= 0.0);
        assert!(dispatch.outcome.message().unwrap().contains("1.5s"));
        assert_eq!(transport.call_count(), 1);
    }
}
