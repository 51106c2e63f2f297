//! Configuration helpers: environment overrides and credential lookup

use crate::{Error, Result};
use std::env;

/// Chat-completions endpoint used when nothing else is configured
pub const DEFAULT_ENDPOINT: &str = "https://api.siliconflow.cn/v1/chat/completions";

/// Model used when nothing else is configured
pub const DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1";

/// Environment variable overriding the endpoint
pub const ENDPOINT_ENV: &str = "CHAT_STREAM_ENDPOINT";

/// Environment variable overriding the model
pub const MODEL_ENV: &str = "CHAT_STREAM_MODEL";

/// Environment variable holding the bearer credential
pub const API_KEY_ENV: &str = "CHAT_STREAM_API_KEY";

/// Get the endpoint from environment variable or fallback
///
/// Priority:
/// 1. CHAT_STREAM_ENDPOINT environment variable
/// 2. fallback parameter
/// 3. [`DEFAULT_ENDPOINT`]
///
/// # Examples
///
/// ```rust,no_run
/// use chat_stream::get_endpoint;
///
/// let url = get_endpoint(None);
/// let url = get_endpoint(Some("http://localhost:1234/v1/chat/completions"));
/// ```
pub fn get_endpoint(fallback: Option<&str>) -> String {
    resolve(env::var(ENDPOINT_ENV).ok(), fallback, DEFAULT_ENDPOINT)
}

/// Get the model name from environment variable or fallback
///
/// Priority:
/// 1. CHAT_STREAM_MODEL environment variable (if prefer_env is true)
/// 2. fallback parameter
/// 3. [`DEFAULT_MODEL`]
pub fn get_model(fallback: Option<&str>, prefer_env: bool) -> String {
    let from_env = if prefer_env {
        env::var(MODEL_ENV).ok()
    } else {
        None
    };
    resolve(from_env, fallback, DEFAULT_MODEL)
}

fn resolve(from_env: Option<String>, fallback: Option<&str>, default: &str) -> String {
    from_env
        .filter(|value| !value.trim().is_empty())
        .or_else(|| fallback.map(str::to_string))
        .unwrap_or_else(|| default.to_string())
}

/// Source of the bearer credential sent with every request.
///
/// Where the key is stored is the caller's business; the engine only asks for
/// it when a request is about to be issued.
pub trait CredentialSource: Send + Sync {
    fn api_key(&self) -> Result<String>;
}

/// A credential known up front.
#[derive(Clone)]
pub struct StaticCredential(String);

impl StaticCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Debug for StaticCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticCredential").field(&"***").finish()
    }
}

impl CredentialSource for StaticCredential {
    fn api_key(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(Error::config("API key is empty"));
        }
        Ok(self.0.clone())
    }
}

/// Reads the credential from an environment variable at request time.
#[derive(Debug, Clone)]
pub struct EnvCredential {
    var: String,
}

impl EnvCredential {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredential {
    fn default() -> Self {
        Self::new(API_KEY_ENV)
    }
}

impl CredentialSource for EnvCredential {
    fn api_key(&self) -> Result<String> {
        match env::var(&self.var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::config(format!("{} is not set", self.var))),
        }
    }
}
