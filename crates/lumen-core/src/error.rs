// ── Core error types ──
//
// User-facing errors from lumen-core. Consumers never see reqwest errors
// or JSON parse failures directly; the `From<lumen_api::Error>` impl
// translates transport-layer errors into domain variants. Registry error
// events carry the flattened `ErrorReport` form instead of the error itself.

use serde::Serialize;
use strum::Display;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to bridge at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Bridge request timed out")]
    Timeout,

    #[error("Pairing failed: {message}")]
    PairingFailed { message: String },

    // ── Bridge responses ─────────────────────────────────────────────
    /// HTTP 429. Never retried by this crate.
    #[error("Rate limited by the bridge")]
    RateLimited,

    #[error("Bridge rejected the request (HTTP {status}): {}", .errors.join("; "))]
    Bridge { status: u16, errors: Vec<String> },

    // ── Caller errors ────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Resource not found: {rtype} {id}")]
    ResourceNotFound { rtype: String, id: String },

    #[error("Unsupported resource type: {0}")]
    UnsupportedResourceType(String),

    // ── Entertainment ────────────────────────────────────────────────
    #[error("Streaming unavailable: {reason}")]
    StreamingUnavailable { reason: String },

    #[error("Entertainment session is already streaming")]
    AlreadyStreaming,

    #[error("Entertainment session is not streaming")]
    NotStreaming,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Flatten into the structured form carried by registry error events.
    pub fn report(&self) -> ErrorReport {
        let kind = match self {
            Self::RateLimited => ErrorKind::RateLimit,
            Self::ValidationFailed { .. } | Self::UnsupportedResourceType(_) => ErrorKind::Validation,
            Self::Bridge { .. } | Self::ResourceNotFound { .. } => ErrorKind::Bridge,
            _ => ErrorKind::Transport,
        };
        ErrorReport {
            kind,
            message: self.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }
}

/// Category of a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimit,
    Validation,
    Transport,
    Bridge,
}

/// One structured error inside a `RegistryEvent::Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<lumen_api::Error> for CoreError {
    fn from(err: lumen_api::Error) -> Self {
        match err {
            lumen_api::Error::RateLimited => CoreError::RateLimited,
            lumen_api::Error::Bridge { status, errors } => CoreError::Bridge { status, errors },
            lumen_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else {
                    CoreError::ConnectionFailed {
                        url: e.url().map(ToString::to_string).unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                }
            }
            lumen_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            lumen_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            lumen_api::Error::LinkButtonNotPressed => CoreError::PairingFailed {
                message: "link button not pressed".into(),
            },
            lumen_api::Error::PairingTimeout { timeout_secs } => CoreError::PairingFailed {
                message: format!("link button not pressed within {timeout_secs}s"),
            },
            lumen_api::Error::Pairing(message) => CoreError::PairingFailed { message },
            lumen_api::Error::EventStream(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("event stream: {reason}"),
            },
            lumen_api::Error::Dtls(reason) => CoreError::StreamingUnavailable { reason },
            lumen_api::Error::InvalidClientKey(reason) => CoreError::Config {
                message: format!("invalid client key: {reason}"),
            },
            lumen_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_maps_to_distinct_kind() {
        let err = CoreError::from(lumen_api::Error::RateLimited);
        assert!(err.is_rate_limited());
        assert_eq!(err.report().kind, ErrorKind::RateLimit);
    }

    #[test]
    fn bridge_errors_keep_descriptions() {
        let err = CoreError::from(lumen_api::Error::Bridge {
            status: 400,
            errors: vec!["bad".into()],
        });
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::Bridge);
        assert!(report.message.contains("bad"));
    }

    #[test]
    fn validation_report_kind() {
        assert_eq!(CoreError::validation("x").report().kind, ErrorKind::Validation);
    }
}
