//! `type` and `code` values of the structured error body, and the categories
//! used when logging upstream failures.

use std::fmt;

// Error body `type`
pub const ERROR_TYPE_API: &str = "api_error";
pub const ERROR_TYPE_TIMEOUT: &str = "timeout_error";
pub const ERROR_TYPE_INVALID_REQUEST: &str = "invalid_request_error";
pub const ERROR_TYPE_CONFIGURATION: &str = "configuration_error";
pub const ERROR_TYPE_UPSTREAM: &str = "upstream_error";

// Error body `code`
pub const ERROR_CODE_MISSING_CREDENTIAL: &str = "missing_credential";
pub const ERROR_CODE_INVALID_JSON: &str = "invalid_json";
pub const ERROR_CODE_INVALID_MESSAGES: &str = "invalid_messages";
pub const ERROR_CODE_EMPTY_MESSAGES: &str = "empty_messages";
pub const ERROR_CODE_PROVIDER: &str = "provider_error";
pub const ERROR_CODE_UPSTREAM_TIMEOUT: &str = "upstream_timeout";
pub const ERROR_CODE_INTERNAL: &str = "internal_error";

/// Why an upstream exchange failed, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategoryCode {
    /// No credential configured; nothing was sent.
    Configuration,
    /// Provider refused the request (4xx).
    ProviderRejected,
    /// Provider failed or is overloaded (5xx).
    ProviderUnavailable,
    Timeout,
    Connect,
    Network,
    /// Provider body was not a decodable event stream.
    MalformedStream,
}

impl ErrorCategoryCode {
    /// Category for a non-2xx provider status.
    pub const fn from_status(status: u16) -> Self {
        if status >= 500 {
            Self::ProviderUnavailable
        } else {
            Self::ProviderRejected
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::ProviderRejected => "provider_rejected",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Network => "network",
            Self::MalformedStream => "malformed_stream",
        }
    }
}

impl fmt::Display for ErrorCategoryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
