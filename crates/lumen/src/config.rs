//! `GlobalOpts`-aware wrappers over lumen-config.
//!
//! Flags and `LUMEN_*` env vars override the active profile; without any
//! profile, `--bridge` plus `--app-key` is enough.

use std::time::Duration;

use secrecy::SecretString;

use lumen_config::{Config, load_config_or_default, profile_to_bridge_config};
use lumen_core::{BridgeConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref()).to_owned()
}

/// Build a `BridgeConfig` from the config file, profile and CLI overrides.
pub fn build_bridge_config(global: &GlobalOpts) -> Result<BridgeConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut config = match cfg.profiles.get(&profile_name) {
        Some(profile) => {
            let mut profile = profile.clone();
            if let Some(ref bridge) = global.bridge {
                profile.bridge.clone_from(bridge);
            }
            if let Some(ref key) = global.app_key {
                profile.app_key = Some(key.clone());
                profile.app_key_env = None;
            }
            profile_to_bridge_config(&profile, &profile_name, &cfg.defaults)?
        }
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        None => from_flags(global, &profile_name)?,
    };

    if let Some(ref key) = global.client_key {
        config.client_key = Some(SecretString::from(key.clone()));
    }
    if global.strict_tls {
        config.tls = TlsVerification::SystemDefaults;
    }
    config.timeout = Duration::from_secs(global.timeout);
    Ok(config)
}

fn from_flags(global: &GlobalOpts, profile_name: &str) -> Result<BridgeConfig, CliError> {
    let url_str = global.bridge.as_deref().ok_or_else(|| CliError::NoConfig {
        path: lumen_config::config_path().display().to_string(),
    })?;
    let url = parse_url(url_str)?;

    let app_key = global.app_key.as_ref().ok_or_else(|| CliError::NoCredentials {
        profile: profile_name.to_owned(),
    })?;
    Ok(BridgeConfig::new(url, SecretString::from(app_key.clone())))
}

pub fn parse_url(url_str: &str) -> Result<url::Url, CliError> {
    url_str.parse().map_err(|_| CliError::Validation {
        field: "bridge".into(),
        reason: format!("invalid URL: {url_str}"),
    })
}

pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
    names.sort_unstable();
    if names.is_empty() {
        "(none)".into()
    } else {
        names.join(", ")
    }
}
