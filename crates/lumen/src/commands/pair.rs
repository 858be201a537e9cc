//! `lumen pair`: wait for the link button and store the issued keys.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use lumen_api::{PairingOptions, PairingRequest, TlsMode, TransportConfig, register_app};
use lumen_config::{CredentialStorage, load_config_or_default, save_config, store_credentials};

use crate::cli::{GlobalOpts, PairArgs};
use crate::config::parse_url;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Paired {
    profile: String,
    bridge: String,
    client_key: bool,
    storage: &'static str,
}

pub async fn handle(args: PairArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let url = parse_url(&args.bridge)?;

    let transport = TransportConfig {
        tls: if global.strict_tls {
            TlsMode::System
        } else {
            TlsMode::DangerAcceptInvalid
        },
        timeout: Duration::from_secs(global.timeout),
        ..TransportConfig::default()
    };
    let http = transport.build_client()?;

    let spinner = (!global.quiet).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Press the link button on {url} ..."));
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    });

    let options = PairingOptions {
        timeout: Duration::from_secs(args.wait),
        ..PairingOptions::default()
    };
    let result = register_app(&http, &url, &PairingRequest::new("lumen", &args.instance), &options).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let credentials = result?;

    let mut cfg = load_config_or_default();
    let storage = store_credentials(
        &mut cfg,
        &args.name,
        url.as_str(),
        &credentials.app_key,
        credentials.client_key.as_ref(),
    )?;
    save_config(&cfg)?;

    let paired = Paired {
        profile: args.name,
        bridge: url.to_string(),
        client_key: credentials.client_key.is_some(),
        storage: match storage {
            CredentialStorage::Keyring => "keyring",
            CredentialStorage::Plaintext => "config file",
        },
    };
    let out = output::render_single(
        &global.output,
        &paired,
        |p| {
            output::detail_lines(&[
                ("Profile", p.profile.clone()),
                ("Bridge", p.bridge.clone()),
                ("Client key", if p.client_key { "issued" } else { "not issued" }.into()),
                ("Stored in", p.storage.into()),
            ])
        },
        |p| p.profile.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
