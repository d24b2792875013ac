//! Configuration management for the chat relay.
//!
//! Configuration is read once from the process environment at startup and then
//! shared read-only (behind an `Arc`) with every request handler. Request-handling
//! code never consults the environment directly.

use anyhow::{Context, Result};
use regex::Regex;
use std::str::FromStr;

/// Client-facing framing of the relayed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamProtocol {
    /// AI data-stream protocol: one `0:"<text>"` line per chunk plus a finish trailer.
    #[default]
    Data,
    /// Raw chunk text, nothing else.
    Text,
}

impl FromStr for StreamProtocol {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "data" => Ok(StreamProtocol::Data),
            "text" => Ok(StreamProtocol::Text),
            other => Err(anyhow::anyhow!(
                "Unknown stream protocol '{}' (expected 'data' or 'text')",
                other
            )),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server configuration (host, port)
    pub server: ServerConfig,

    /// Upstream provider configuration
    pub upstream: UpstreamConfig,

    /// Model selection policy
    pub models: ModelPolicy,

    /// Framing used when writing chunks to the client
    pub stream_protocol: StreamProtocol,
}

/// Server-specific configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Upstream completion provider settings.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Credential for the provider. Absence is reported per request, not at startup.
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API (without trailing `/chat/completions`)
    pub base_url: String,

    /// Whether to verify SSL certificates for upstream requests
    pub verify_ssl: bool,

    /// Request timeout in seconds for the upstream HTTP client
    pub request_timeout_secs: u64,

    /// Sampling temperature sent with every completion
    pub temperature: f32,

    /// Maximum completion tokens sent with every completion
    pub max_tokens: u32,
}

impl UpstreamConfig {
    /// The configured credential, if present and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            verify_ssl: true,
            request_timeout_secs: default_request_timeout(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Model defaults and the vendor deny rule.
#[derive(Debug, Clone)]
pub struct ModelPolicy {
    /// Model used when the client does not ask for one
    pub default_model: String,

    /// Model substituted for identifiers matching `deny_pattern`
    pub fallback_model: String,

    /// Identifiers the upstream is known to reject
    pub deny_pattern: Regex,
}

impl Default for ModelPolicy {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            deny_pattern: Regex::new(DEFAULT_DENY_PATTERN).expect("default deny pattern is valid"),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            models: ModelPolicy::default(),
            stream_protocol: StreamProtocol::default(),
        }
    }
}

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DENY_PATTERN: &str = "^google/";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

impl AppConfig {
    /// Build configuration from environment variables.
    ///
    /// Unset variables fall back to built-in defaults. Unparseable values are
    /// rejected so a typo fails at startup rather than on the first request.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = AppConfig::default();

        if let Some(host) = var("HOST") {
            config.server.host = host;
        }
        if let Some(port) = var("PORT") {
            config.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT: {}", port))?;
        }

        config.upstream.api_key = var("AI_GATEWAY_API_KEY");
        if let Some(base_url) = var("AI_GATEWAY_BASE_URL") {
            config.upstream.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(verify_ssl) = var("VERIFY_SSL") {
            config.upstream.verify_ssl = str_to_bool(&verify_ssl);
        }
        if let Some(timeout) = var("REQUEST_TIMEOUT_SECS") {
            config.upstream.request_timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid REQUEST_TIMEOUT_SECS: {}", timeout))?;
        }
        if let Some(temperature) = var("AI_TEMPERATURE") {
            config.upstream.temperature = temperature
                .trim()
                .parse()
                .with_context(|| format!("Invalid AI_TEMPERATURE: {}", temperature))?;
        }
        if let Some(max_tokens) = var("AI_MAX_TOKENS") {
            config.upstream.max_tokens = max_tokens
                .trim()
                .parse()
                .with_context(|| format!("Invalid AI_MAX_TOKENS: {}", max_tokens))?;
        }

        if let Some(model) = var("AI_MODEL") {
            config.models.default_model = model.trim().to_string();
        }
        if let Some(fallback) = var("AI_FALLBACK_MODEL") {
            config.models.fallback_model = fallback.trim().to_string();
        }
        if let Some(pattern) = var("AI_MODEL_DENY_PATTERN") {
            config.models.deny_pattern = Regex::new(&pattern)
                .with_context(|| format!("Invalid AI_MODEL_DENY_PATTERN: {}", pattern))?;
        }

        if let Some(protocol) = var("STREAM_PROTOCOL") {
            config.stream_protocol = protocol.parse()?;
        }

        Ok(config)
    }

    /// Whether `AI_MODEL` was supplied explicitly (used by the startup banner).
    pub fn has_custom_model(&self) -> bool {
        self.models.default_model != DEFAULT_MODEL
    }
}

/// Convert string to boolean.
///
/// Accepts: "true", "1", "yes", "on" (case-insensitive)
fn str_to_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_str_to_bool() {
        assert!(str_to_bool("true"));
        assert!(str_to_bool("TRUE"));
        assert!(str_to_bool("1"));
        assert!(str_to_bool("yes"));
        assert!(str_to_bool("On"));
        assert!(!str_to_bool("false"));
        assert!(!str_to_bool("0"));
        assert!(!str_to_bool("off"));
        assert!(!str_to_bool(""));
        assert!(!str_to_bool("invalid"));
    }

    #[test]
    fn test_defaults_when_environment_empty() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3001);
        assert!(config.upstream.api_key.is_none());
        assert!(config.upstream.credential().is_none());
        assert_eq!(config.upstream.base_url, "https://api.openai.com/v1");
        assert!(config.upstream.verify_ssl);
        assert_eq!(config.upstream.request_timeout_secs, 300);
        assert_eq!(config.upstream.temperature, 0.7);
        assert_eq!(config.upstream.max_tokens, 2000);
        assert_eq!(config.models.default_model, "gpt-4");
        assert_eq!(config.models.fallback_model, "gpt-4o-mini");
        assert!(config.models.deny_pattern.is_match("google/gemini-pro"));
        assert_eq!(config.stream_protocol, StreamProtocol::Data);
        assert!(!config.has_custom_model());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("AI_GATEWAY_API_KEY", "sk-test"),
            ("AI_GATEWAY_BASE_URL", "http://localhost:9000/v1/"),
            ("VERIFY_SSL", "false"),
            ("REQUEST_TIMEOUT_SECS", "30"),
            ("AI_TEMPERATURE", "0.2"),
            ("AI_MAX_TOKENS", "512"),
            ("AI_MODEL", "gpt-4o"),
            ("AI_FALLBACK_MODEL", "gpt-3.5-turbo"),
            ("AI_MODEL_DENY_PATTERN", "^(google|anthropic)/"),
            ("STREAM_PROTOCOL", "text"),
        ]))
        .unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.upstream.credential(), Some("sk-test"));
        assert_eq!(config.upstream.base_url, "http://localhost:9000/v1");
        assert!(!config.upstream.verify_ssl);
        assert_eq!(config.upstream.request_timeout_secs, 30);
        assert_eq!(config.upstream.temperature, 0.2);
        assert_eq!(config.upstream.max_tokens, 512);
        assert_eq!(config.models.default_model, "gpt-4o");
        assert_eq!(config.models.fallback_model, "gpt-3.5-turbo");
        assert!(config.models.deny_pattern.is_match("anthropic/claude-3"));
        assert_eq!(config.stream_protocol, StreamProtocol::Text);
        assert!(config.has_custom_model());
    }

    #[test]
    fn test_blank_credential_is_absent() {
        let config = AppConfig::from_lookup(lookup_from(&[("AI_GATEWAY_API_KEY", "   ")])).unwrap();
        assert!(config.upstream.credential().is_none());
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_deny_pattern_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("AI_MODEL_DENY_PATTERN", "(")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_stream_protocol_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("STREAM_PROTOCOL", "sse")]));
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        std::env::set_var("AI_GATEWAY_API_KEY", "env-key");
        std::env::set_var("AI_MODEL", "gpt-4o");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.upstream.credential(), Some("env-key"));
        assert_eq!(config.models.default_model, "gpt-4o");

        std::env::remove_var("AI_GATEWAY_API_KEY");
        std::env::remove_var("AI_MODEL");
    }
}
