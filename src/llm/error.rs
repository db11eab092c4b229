//! Error type shared by LLM clients.

use thiserror::Error;

/// Broad category of a failed completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Upstream asked us to slow down (HTTP 429 or equivalent).
    RateLimited,
    /// Credential rejected.
    Authentication,
    /// Request was malformed or named an unknown model.
    InvalidRequest,
    /// Upstream server failure (5xx).
    ServerError,
    /// Connection, TLS or timeout failure before a response arrived.
    Network,
    /// Response arrived but could not be decoded.
    Parse,
    Other,
}

/// A failed completion call.
///
/// Carries the HTTP status when one was observed so callers can tell
/// rate limiting apart from other faults.
#[derive(Debug, Clone, Error)]
#[error("{}", describe(.status, .message))]
pub struct LlmError {
    pub kind: LlmErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

fn describe(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("{} {}", code, message),
        None => message.to_string(),
    }
}

impl LlmError {
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Build an error from an HTTP status and the upstream message.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: classify_http_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Network, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(LlmErrorKind::Parse, message)
    }

    /// Whether this failure signals rate limiting.
    ///
    /// True for status 429, and for messages mentioning `429` or `rate`
    /// (case-insensitive), since some providers only say so in the text.
    pub fn is_rate_limited(&self) -> bool {
        if self.kind == LlmErrorKind::RateLimited || self.status == Some(429) {
            return true;
        }
        let text = self.to_string();
        text.contains("429") || text.to_lowercase().contains("rate")
    }
}

/// Map an HTTP status code onto an error category.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        401 | 402 | 403 => LlmErrorKind::Authentication,
        400 | 404 | 413 | 422 => LlmErrorKind::InvalidRequest,
        500..=599 => LlmErrorKind::ServerError,
        _ => LlmErrorKind::Other,
    }
}
