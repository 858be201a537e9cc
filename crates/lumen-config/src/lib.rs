//! Shared configuration for the lumen CLI.
//!
//! TOML profiles, credential resolution (env, keyring, plaintext) and
//! translation to `lumen_core::BridgeConfig`. After pairing, the CLI hands
//! the issued keys to [`store_credentials`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use lumen_core::{BridgeConfig, TlsVerification};

const KEYRING_SERVICE: &str = "lumen";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no app key configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level `config.toml`.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named bridge profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use, given an optional override.
    pub fn profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| ConfigError::UnknownProfile {
            profile: name.into(),
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_fps")]
    pub fps: u32,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            fps: default_fps(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_fps() -> u32 {
    50
}

/// A named bridge profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Bridge base URL (e.g., "https://192.168.1.2").
    pub bridge: String,

    /// Application key (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key: Option<String>,

    /// Environment variable holding the application key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_key_env: Option<String>,

    /// Entertainment client key, hex (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_env: Option<String>,

    /// Path to a custom CA certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// `Some(false)` demands a verified certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Streaming frame rate override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "lumen").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("lumen");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path`, then overlay `LUMEN_*` env vars. Nested keys use a
/// double underscore: `LUMEN_DEFAULTS__OUTPUT=json`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LUMEN_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_else(|e| {
        debug!(error = %e, "Falling back to default config");
        Config::default()
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str, secret: &str) -> Option<keyring::Entry> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{secret}")).ok()
}

/// Env var named by the profile, then the keyring, then plaintext.
fn resolve_secret(
    env_name: Option<&str>,
    keyring_secret: &str,
    plaintext: Option<&str>,
    profile_name: &str,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> Option<SecretString> {
    if let Some(val) = env_name.and_then(&lookup_env) {
        return Some(SecretString::from(val));
    }

    if let Some(secret) = keyring_entry(profile_name, keyring_secret).and_then(|e| e.get_password().ok()) {
        return Some(SecretString::from(secret));
    }

    plaintext.map(SecretString::from)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Resolve the application key for a profile.
pub fn resolve_app_key(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_secret(
        profile.app_key_env.as_deref(),
        "app-key",
        profile.app_key.as_deref(),
        profile_name,
        env_var,
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve the entertainment client key, if one is configured anywhere.
pub fn resolve_client_key(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_secret(
        profile.client_key_env.as_deref(),
        "client-key",
        profile.client_key.as_deref(),
        profile_name,
        env_var,
    )
}

// ── Credential persistence ──────────────────────────────────────────

/// Where freshly issued keys ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStorage {
    Keyring,
    /// The keyring was unavailable; keys were written into the profile.
    Plaintext,
}

/// Persist keys issued by pairing and record the profile in `cfg`.
///
/// The caller saves `cfg` afterwards.
pub fn store_credentials(
    cfg: &mut Config,
    profile_name: &str,
    bridge: &str,
    app_key: &SecretString,
    client_key: Option<&SecretString>,
) -> Result<CredentialStorage, ConfigError> {
    bridge.parse::<url::Url>().map_err(|e| ConfigError::Validation {
        field: "bridge".into(),
        reason: format!("invalid URL {bridge}: {e}"),
    })?;

    let in_keyring = store_in_keyring(profile_name, "app-key", app_key)
        && client_key.is_none_or(|k| store_in_keyring(profile_name, "client-key", k));

    let profile = cfg.profiles.entry(profile_name.to_owned()).or_default();
    profile.bridge = bridge.to_owned();

    let storage = if in_keyring {
        profile.app_key = None;
        profile.client_key = None;
        CredentialStorage::Keyring
    } else {
        warn!(profile = profile_name, "Keyring unavailable, storing keys in config file");
        profile.app_key = Some(app_key.expose_secret().to_owned());
        profile.client_key = client_key.map(|k| k.expose_secret().to_owned());
        CredentialStorage::Plaintext
    };

    if cfg.profiles.len() == 1 {
        cfg.default_profile = Some(profile_name.to_owned());
    }
    Ok(storage)
}

fn store_in_keyring(profile_name: &str, secret: &str, value: &SecretString) -> bool {
    let Some(entry) = keyring_entry(profile_name, secret) else {
        return false;
    };
    match entry.set_password(value.expose_secret()) {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, secret, "Keyring write failed");
            false
        }
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `BridgeConfig` from a profile.
pub fn profile_to_bridge_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<BridgeConfig, ConfigError> {
    let url: url::Url = profile.bridge.parse().map_err(|_| ConfigError::Validation {
        field: "bridge".into(),
        reason: format!("invalid URL: {}", profile.bridge),
    })?;

    let mut config = BridgeConfig::new(url, resolve_app_key(profile, profile_name)?);
    config.client_key = resolve_client_key(profile, profile_name);

    config.tls = match (profile.insecure, &profile.ca_cert) {
        (Some(true), _) => TlsVerification::DangerAcceptInvalid,
        (_, Some(ca_path)) => TlsVerification::CustomCa(ca_path.clone()),
        (Some(false), None) => TlsVerification::SystemDefaults,
        // Bridges ship self-signed certificates.
        (None, None) => TlsVerification::DangerAcceptInvalid,
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    let fps = profile.fps.unwrap_or(defaults.fps);
    if fps == 0 {
        return Err(ConfigError::Validation {
            field: "fps".into(),
            reason: "must be at least 1".into(),
        });
    }
    config.fps = fps;
    Ok(config)
}
