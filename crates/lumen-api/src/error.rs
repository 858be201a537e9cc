use thiserror::Error;

/// Top-level error type for the `lumen-api` crate.
///
/// Covers every failure mode across the bridge surfaces: pairing,
/// transport, CLIP REST, the event stream, and the entertainment socket.
/// `lumen-core` maps these into domain errors and registry error events.
#[derive(Debug, Error)]
pub enum Error {
    // ── Pairing ─────────────────────────────────────────────────────
    /// The bridge's physical link button has not been pressed.
    #[error("Link button not pressed")]
    LinkButtonNotPressed,

    /// The link button was not pressed before the caller's deadline.
    #[error("Pairing timed out after {timeout_secs}s -- press the link button on the bridge")]
    PairingTimeout { timeout_secs: u64 },

    /// Any other pairing rejection reported by the bridge.
    #[error("Pairing failed: {0}")]
    Pairing(String),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── CLIP API ────────────────────────────────────────────────────
    /// The bridge answered HTTP 429. Never retried by this layer.
    #[error("Rate limited by the bridge (HTTP 429)")]
    RateLimited,

    /// Non-2xx response carrying the bridge's own error descriptions.
    #[error("Bridge error (HTTP {status}): {}", .errors.join("; "))]
    Bridge { status: u16, errors: Vec<String> },

    // ── Event stream ────────────────────────────────────────────────
    /// The push event stream could not be opened or broke mid-read.
    #[error("Event stream error: {0}")]
    EventStream(String),

    // ── Entertainment transport ─────────────────────────────────────
    /// DTLS handshake, send, or close failure.
    #[error("DTLS error: {0}")]
    Dtls(String),

    /// The client key is not valid hex and cannot be used as a PSK.
    #[error("Invalid client key: {0}")]
    InvalidClientKey(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the bridge rejected the call with HTTP 429.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Returns `true` for network-level failures that might succeed later.
    ///
    /// Rate limiting is deliberately excluded: callers must not
    /// retry into a bridge that is already shedding load.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::EventStream(_) | Self::Dtls(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Bridge { status: 404, .. } => true,
            _ => false,
        }
    }

    /// Bridge-supplied error descriptions, if any.
    pub fn descriptions(&self) -> &[String] {
        match self {
            Self::Bridge { errors, .. } => errors,
            _ => &[],
        }
    }
}
