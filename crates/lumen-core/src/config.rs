// ── Runtime connection configuration ──
//
// These types describe *how* to talk to a bridge. They carry credential
// data and tuning, but never touch disk: the CLI builds a `BridgeConfig`
// (usually through lumen-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Bridges serve self-signed certificates, so this
    /// is the default for local connections.
    #[default]
    DangerAcceptInvalid,
}

impl TlsVerification {
    pub(crate) fn to_api(&self) -> lumen_api::TlsMode {
        match self {
            Self::SystemDefaults => lumen_api::TlsMode::System,
            Self::CustomCa(path) => lumen_api::TlsMode::CustomCa(path.clone()),
            Self::DangerAcceptInvalid => lumen_api::TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Event-stream reconnection policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

impl From<&ReconnectPolicy> for lumen_api::ReconnectConfig {
    fn from(p: &ReconnectPolicy) -> Self {
        Self {
            initial_delay: p.initial_delay,
            max_delay: p.max_delay,
            max_retries: p.max_retries,
        }
    }
}

/// Configuration for one bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge URL (e.g., `https://192.168.1.2`).
    pub url: Url,
    /// Application key issued at pairing.
    pub app_key: SecretString,
    /// Client key (hex PSK) for entertainment streaming.
    pub client_key: Option<SecretString>,
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Open the push event stream on connect.
    pub event_stream_enabled: bool,
    pub reconnect: ReconnectPolicy,
    /// Minimum gap after a successful write before the same resource is
    /// written again.
    pub write_throttle: Duration,
    pub entertainment_port: u16,
    /// Default streaming frame rate.
    pub fps: u32,
}

impl BridgeConfig {
    pub fn new(url: Url, app_key: SecretString) -> Self {
        Self {
            url,
            app_key,
            client_key: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            event_stream_enabled: true,
            reconnect: ReconnectPolicy::default(),
            write_throttle: Duration::from_millis(100),
            entertainment_port: lumen_api::ENTERTAINMENT_PORT,
            fps: 50,
        }
    }

    pub(crate) fn transport(&self) -> lumen_api::TransportConfig {
        lumen_api::TransportConfig {
            tls: self.tls.to_api(),
            timeout: self.timeout,
            ..lumen_api::TransportConfig::default()
        }
    }

    /// Host part of the bridge URL, for the datagram transport.
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }
}
