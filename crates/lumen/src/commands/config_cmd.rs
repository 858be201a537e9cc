//! Config subcommand handlers.

use serde::Serialize;
use tabled::Tabled;

use lumen_config::{Config, config_path, load_config};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::active_profile_name;
use crate::error::CliError;
use crate::output;

/// A profile as shown to the user: secrets reduced to where they live.
#[derive(Serialize)]
struct ProfileView {
    name: String,
    active: bool,
    bridge: String,
    app_key: String,
    client_key: String,
    fps: Option<u32>,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Bridge")]
    bridge: String,
    #[tabled(rename = "App key")]
    app_key: String,
    #[tabled(rename = "Client key")]
    client_key: String,
}

fn secret_source(plaintext: Option<&String>, env: Option<&String>) -> String {
    match (env, plaintext) {
        (Some(var), _) => format!("env:{var}"),
        (None, Some(_)) => "config (plaintext)".into(),
        (None, None) => "keyring".into(),
    }
}

fn views(cfg: &Config, active: &str) -> Vec<ProfileView> {
    let mut views: Vec<ProfileView> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileView {
            name: name.clone(),
            active: name == active,
            bridge: p.bridge.clone(),
            app_key: secret_source(p.app_key.as_ref(), p.app_key_env.as_ref()),
            client_key: secret_source(p.client_key.as_ref(), p.client_key_env.as_ref()),
            fps: p.fps,
        })
        .collect();
    views.sort_by(|a, b| a.name.cmp(&b.name));
    views
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = load_config()?;
            let active = active_profile_name(global, &cfg);
            let profiles = views(&cfg, &active);

            let out = output::render_list(
                &global.output,
                &profiles,
                |v| ProfileRow {
                    marker: if v.active { "*" } else { "" },
                    name: v.name.clone(),
                    bridge: v.bridge.clone(),
                    app_key: v.app_key.clone(),
                    client_key: v.client_key.clone(),
                },
                |v| v.name.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
