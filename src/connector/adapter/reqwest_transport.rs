use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::application::{HttpResponse, HttpTransport, TransportError};

const USER_AGENT: &str = concat!("gatechat/", env!("CARGO_PKG_VERSION"));

/// [`HttpTransport`] backed by a shared `reqwest` client.
///
/// The timeout is applied per request and covers the whole exchange,
/// including reading the body. Non-2xx statuses are returned untouched so
/// the dispatcher can classify them.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn map_error(e: reqwest::Error) -> TransportError {
        // A connect timeout is reported as both; timeout takes precedence.
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer_token: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .bearer_auth(bearer_token)
            .json(body)
            .timeout(timeout)
            .send()
            .await
            .map_err(Self::map_error)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(Self::map_error)?;
        debug!("ReqwestTransport: POST {url} -> {status} ({} bytes)", text.len());

        Ok(HttpResponse::new(status, text))
    }
}
