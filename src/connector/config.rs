//! Runtime configuration resolved once at startup from the process
//! environment and an optional `.env` file.
//!
//! | Variable               | Default                                       |
//! |------------------------|-----------------------------------------------|
//! | `OPENAI_API_URL`       | `https://api.openai.com/v1/chat/completions`  |
//! | `OPENAI_API_KEY`       | `""`                                          |
//! | `DEFAULT_MODEL`        | `gpt-4o-mini`                                 |
//! | `RPROXY_URL`           | `https://devaigw.vigilnz.com/`                |
//! | `RPROXY_AUTH_HEADER`   | `""`                                          |
//! | `ENTITY_ID`            | parsed from `RPROXY_AUTH_HEADER`              |
//! | `REQUEST_TIMEOUT_SECS` | `60`                                          |

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::application::DispatchDefaults;
use crate::domain::{mask_secret, parse_entity_id, DomainError, DEFAULT_TIMEOUT};

pub const DEFAULT_ENV_FILE: &str = ".env";
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GATEWAY_URL: &str = "https://devaigw.vigilnz.com/";

#[derive(Clone)]
pub struct ChatConfig {
    pub api_url: String,
    pub api_key: String,
    pub default_model: String,
    pub gateway_url: String,
    pub gateway_auth_header: String,
    /// Computed once here and never re-derived.
    pub entity_id: Option<String>,
    pub timeout: Duration,
}

impl ChatConfig {
    /// Load from the process environment, falling back to `.env` in the
    /// working directory.
    pub fn from_env() -> Result<Self, DomainError> {
        Self::load(Path::new(DEFAULT_ENV_FILE))
    }

    /// Load from the process environment, falling back to values in
    /// `env_file`. Real environment variables win; a missing file is fine.
    pub fn load(env_file: &Path) -> Result<Self, DomainError> {
        let file_vars = read_env_file(env_file)?;
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .or_else(|| file_vars.get(key).cloned())
        })
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let mut gateway_url = get("RPROXY_URL", DEFAULT_GATEWAY_URL);
        if !gateway_url.is_empty() && !gateway_url.ends_with('/') {
            gateway_url.push('/');
        }

        let gateway_auth_header = get("RPROXY_AUTH_HEADER", "");
        let entity_id = match lookup("ENTITY_ID").filter(|id| !id.is_empty()) {
            Some(id) => Some(id),
            None => parse_entity_id(Some(&gateway_auth_header)),
        };

        let timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_TIMEOUT,
        };

        let config = Self {
            api_url: get("OPENAI_API_URL", DEFAULT_API_URL),
            api_key: get("OPENAI_API_KEY", ""),
            default_model: get("DEFAULT_MODEL", DEFAULT_MODEL),
            gateway_url,
            gateway_auth_header,
            entity_id,
            timeout,
        };
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Endpoint, credential and model fallbacks for the selected target.
    ///
    /// Gateway mode strips any `Bearer ` prefix from the configured header
    /// because the transport adds its own.
    pub fn dispatch_defaults(&self, use_gateway: bool) -> DispatchDefaults {
        let (endpoint, credential) = if use_gateway {
            let key = self.gateway_auth_header.trim();
            let key = key.strip_prefix("Bearer ").unwrap_or(key).trim();
            (self.gateway_url.as_str(), key)
        } else {
            (self.api_url.as_str(), self.api_key.as_str())
        };

        info!(
            "Target: {} ({})",
            endpoint,
            if use_gateway { "gateway" } else { "direct" }
        );
        DispatchDefaults::new(endpoint, credential, &self.default_model).with_timeout(self.timeout)
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &mask_secret(&self.api_key))
            .field("default_model", &self.default_model)
            .field("gateway_url", &self.gateway_url)
            .field("gateway_auth_header", &mask_secret(&self.gateway_auth_header))
            .field("entity_id", &self.entity_id)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>, DomainError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => {
            debug!("No env file at {}", path.display());
            return Ok(HashMap::new());
        }
        Err(e) => return Err(env_file_error(path, e)),
    };

    iter.map(|item| item.map_err(|e| env_file_error(path, e)))
        .collect()
}

/// Read failures keep their I/O error; bad lines are configuration errors.
fn env_file_error(path: &Path, error: dotenvy::Error) -> DomainError {
    match error {
        dotenvy::Error::Io(e) => DomainError::from(e),
        other => DomainError::configuration(format!(
            "failed to parse {}: {other}",
            path.display()
        )),
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, DomainError> {
    let secs: f64 = raw.trim().parse().map_err(|_| {
        DomainError::configuration(format!("REQUEST_TIMEOUT_SECS must be a number, got '{raw}'"))
    })?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(DomainError::configuration(format!(
            "REQUEST_TIMEOUT_SECS must be positive, got '{raw}'"
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}
