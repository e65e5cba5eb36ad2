use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A threat reported by the security gateway when it blocks a message.
///
/// Kept exactly as the gateway sent it, whatever its shape. The accessors
/// only read from it for display.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threat(Value);

impl Threat {
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Category for display, with underscores shown as spaces.
    pub fn display_category(&self) -> String {
        self.text("category")
            .unwrap_or_else(|| "unknown".to_string())
            .replace('_', " ")
    }

    pub fn display_severity(&self) -> String {
        self.text("severity")
            .unwrap_or_else(|| "UNKNOWN".to_string())
    }

    pub fn display_method(&self) -> String {
        self.text("method").unwrap_or_else(|| "unknown".to_string())
    }

    pub fn reason(&self) -> Option<String> {
        self.text("reason").filter(|r| !r.is_empty())
    }

    /// Text of a field; null and missing fields are absent, other scalars
    /// use their JSON text.
    fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<Value> for Threat {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}

/// Normalized result of one completion dispatch.
///
/// Everything except configuration problems ends up here, so callers can
/// render successes and failures through the same path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionOutcome {
    Success {
        content: String,
        status_code: u16,
        latency_ms: f64,
        raw_response: Value,
    },
    GatewayBlocked {
        message: String,
        threats: Vec<Threat>,
        status_code: u16,
        latency_ms: f64,
        raw_response: Value,
    },
    GatewayError {
        message: String,
        status_code: u16,
        latency_ms: f64,
        raw_response: Value,
    },
    UpstreamHttpError {
        message: String,
        status_code: u16,
        latency_ms: f64,
        raw_response: Value,
    },
    NetworkFailure {
        message: String,
        latency_ms: f64,
    },
    Timeout {
        message: String,
        latency_ms: f64,
    },
}

impl CompletionOutcome {
    /// Stable label, matching the serialized `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::GatewayBlocked { .. } => "gateway_blocked",
            Self::GatewayError { .. } => "gateway_error",
            Self::UpstreamHttpError { .. } => "upstream_http_error",
            Self::NetworkFailure { .. } => "network_failure",
            Self::Timeout { .. } => "timeout",
        }
    }

    /// HTTP status of the exchange; `0` when no response was received.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Success { status_code, .. }
            | Self::GatewayBlocked { status_code, .. }
            | Self::GatewayError { status_code, .. }
            | Self::UpstreamHttpError { status_code, .. } => *status_code,
            Self::NetworkFailure { .. } | Self::Timeout { .. } => 0,
        }
    }

    pub fn latency_ms(&self) -> f64 {
        match self {
            Self::Success { latency_ms, .. }
            | Self::GatewayBlocked { latency_ms, .. }
            | Self::GatewayError { latency_ms, .. }
            | Self::UpstreamHttpError { latency_ms, .. }
            | Self::NetworkFailure { latency_ms, .. }
            | Self::Timeout { latency_ms, .. } => *latency_ms,
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Success { .. })
    }

    /// Error message for failure variants, `None` on success.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::GatewayBlocked { message, .. }
            | Self::GatewayError { message, .. }
            | Self::UpstreamHttpError { message, .. }
            | Self::NetworkFailure { message, .. }
            | Self::Timeout { message, .. } => Some(message),
        }
    }

    pub fn threats(&self) -> &[Threat] {
        match self {
            Self::GatewayBlocked { threats, .. } => threats,
            _ => &[],
        }
    }

    /// Raw payload kept for debugging. Transport failures carry none.
    pub fn raw_response(&self) -> Option<&Value> {
        match self {
            Self::Success { raw_response, .. }
            | Self::GatewayBlocked { raw_response, .. }
            | Self::GatewayError { raw_response, .. }
            | Self::UpstreamHttpError { raw_response, .. } => Some(raw_response),
            Self::NetworkFailure { .. } | Self::Timeout { .. } => None,
        }
    }
}

/// The `(outcome, latency, status)` triple returned by a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispatch {
    pub outcome: CompletionOutcome,
    pub latency_ms: f64,
    pub status_code: u16,
}

impl From<CompletionOutcome> for Dispatch {
    fn from(outcome: CompletionOutcome) -> Self {
        Self {
            latency_ms: outcome.latency_ms(),
            status_code: outcome.status_code(),
            outcome,
        }
    }
}
