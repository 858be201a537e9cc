//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use lumen_config::ConfigError;
use lumen_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const RATE_LIMIT: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to bridge at {url}")]
    #[diagnostic(
        code(lumen::connection_failed),
        help(
            "Check that the bridge is powered and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(lumen::timeout),
        help("Increase the timeout with --timeout or check bridge responsiveness.")
    )]
    Timeout,

    #[error("Rate limited by the bridge")]
    #[diagnostic(
        code(lumen::rate_limited),
        help("The bridge throttles bursts of requests. Wait a moment and retry.")
    )]
    RateLimited,

    // ── Authentication ───────────────────────────────────────────────
    #[error("No app key configured for profile '{profile}'")]
    #[diagnostic(
        code(lumen::no_credentials),
        help(
            "Pair with the bridge: lumen pair https://<bridge-ip>\n\
             Or set LUMEN_APP_KEY."
        )
    )]
    NoCredentials { profile: String },

    #[error("Pairing failed: {message}")]
    #[diagnostic(
        code(lumen::pairing_failed),
        help("Press the link button on the bridge, then run the command again.")
    )]
    PairingFailed { message: String },

    #[error("Bridge rejected the app key")]
    #[diagnostic(
        code(lumen::unauthorized),
        help("The key may have been revoked. Pair again: lumen pair https://<bridge-ip>")
    )]
    Unauthorized,

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(lumen::not_found),
        help("Run: lumen {list_command} to see what the bridge has")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Bridge error (HTTP {status}): {message}")]
    #[diagnostic(code(lumen::bridge_error))]
    Bridge { status: u16, message: String },

    // ── Streaming ────────────────────────────────────────────────────
    #[error("Streaming unavailable: {reason}")]
    #[diagnostic(
        code(lumen::streaming_unavailable),
        help(
            "Entertainment streaming needs a client key.\n\
             Pair again to obtain one, or set LUMEN_CLIENT_KEY."
        )
    )]
    StreamingUnavailable { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(lumen::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(lumen::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: lumen pair https://<bridge-ip> --name {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No bridge configured")]
    #[diagnostic(
        code(lumen::no_config),
        help(
            "Pair with a bridge first: lumen pair https://<bridge-ip>\n\
             Or pass --bridge and --app-key. Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(lumen::config))]
    Config(#[from] ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(lumen::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(lumen::internal))]
    Internal(String),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamingUnavailable { .. } => exit_code::CONNECTION,
            Self::NoCredentials { .. } | Self::PairingFailed { .. } | Self::Unauthorized => exit_code::AUTH,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::RateLimited => exit_code::RATE_LIMIT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Timeout => CliError::Timeout,
            CoreError::RateLimited => CliError::RateLimited,
            CoreError::PairingFailed { message } => CliError::PairingFailed { message },
            CoreError::Bridge { status: 401 | 403, .. } => CliError::Unauthorized,
            CoreError::Bridge { status, errors } => CliError::Bridge {
                status,
                message: errors.join("; "),
            },
            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::ResourceNotFound { rtype, id } => CliError::NotFound {
                resource_type: rtype,
                identifier: id,
                list_command: "resources list".into(),
            },
            CoreError::UnsupportedResourceType(rtype) => CliError::Validation {
                field: "type".into(),
                reason: format!("unknown resource type '{rtype}'"),
            },
            CoreError::StreamingUnavailable { reason } => CliError::StreamingUnavailable { reason },
            CoreError::AlreadyStreaming | CoreError::NotStreaming => CliError::Internal(err.to_string()),
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

impl From<lumen_api::Error> for CliError {
    fn from(err: lumen_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
