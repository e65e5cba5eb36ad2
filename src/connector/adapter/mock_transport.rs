use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::application::{HttpResponse, HttpTransport, TransportError};

/// Most recent calls kept for inspection; older ones are only counted.
pub const MAX_RECORDED_CALLS: usize = 64;

/// One recorded `post_json` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub url: String,
    pub bearer_token: String,
    pub body: Value,
    pub timeout: Duration,
}

/// In-process transport that serves scripted results and records calls.
///
/// Scripted responses are consumed in order. Once the script runs out it
/// answers with a completion echoing the last message, which makes it usable
/// as an offline backend as well as a test spy.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    calls: Mutex<VecDeque<RecordedCall>>,
    call_count: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: HttpResponse) {
        self.script_lock().push_back(Ok(response));
    }

    pub fn push_error(&self, error: TransportError) {
        self.script_lock().push_back(Err(error));
    }

    /// Total number of calls, including ones no longer recorded.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The last [`MAX_RECORDED_CALLS`] calls, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls_lock().iter().cloned().collect()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls_lock().back().cloned()
    }

    fn echo(body: &Value) -> HttpResponse {
        let last = body
            .get("messages")
            .and_then(Value::as_array)
            .and_then(|messages| messages.last())
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let reply = json!({
            "object": "chat.completion",
            "model": body.get("model").cloned().unwrap_or(Value::Null),
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": format!("echo: {last}")},
                "finish_reason": "stop"
            }]
        });
        HttpResponse::new(200, reply.to_string())
    }

    fn script_lock(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<HttpResponse, TransportError>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn calls_lock(&self) -> std::sync::MutexGuard<'_, VecDeque<RecordedCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        {
            let mut calls = self.calls_lock();
            if calls.len() == MAX_RECORDED_CALLS {
                calls.pop_front();
            }
            calls.push_back(RecordedCall {
                url: url.to_string(),
                bearer_token: bearer_token.to_string(),
                body: body.clone(),
                timeout,
            });
        }

        let scripted = self.script_lock().pop_front();
        debug!("MockTransport: POST {url} (scripted: {})", scripted.is_some());
        scripted.unwrap_or_else(|| Ok(Self::echo(body)))
    }
}
