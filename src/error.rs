//! Error types shared by the access layer and the command handlers.

use serde_json::Value;
use thiserror::Error;

/// Envelope error codes meaning the credential itself was rejected.
const AUTH_ERROR_CODES: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "token_revoked",
    "token_expired",
    "account_inactive",
];

#[derive(Debug, Error)]
pub enum CliError {
    /// No workspace configured, or a workspace reference that is unknown or ambiguous.
    #[error("configuration error: {0}")]
    Config(String),

    /// The remote rejected the stored credential.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// `ok: false` envelope, non-2xx status, or an unreadable response.
    #[error("remote error: {code}{}", format_message(.message))]
    Remote { code: String, message: String },

    /// Malformed curl text or a missing token/URL.
    #[error("parse error: {0}")]
    Parse(String),

    /// Input that does not look like a curl command at all.
    #[error("input does not look like a curl command (expected text starting with `curl`)")]
    NotCurl,

    /// The filter program is missing or rejected the expression.
    #[error("filter error: {message}")]
    Filter {
        message: String,
        shape: Option<Value>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_message(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" ({})", message)
    }
}

impl CliError {
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Map an envelope `error` string to the matching error kind.
    pub fn from_envelope(code: &str, operation: &str) -> Self {
        if AUTH_ERROR_CODES.contains(&code) {
            Self::Auth(format!("{} (during {})", code, operation))
        } else {
            Self::remote(code, format!("{} failed", operation))
        }
    }

    /// Machine-readable code for remote failures.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CliError {
    fn from(e: reqwest::Error) -> Self {
        let code = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connect_failed"
        } else {
            "transport_error"
        };
        Self::remote(code, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
