// Application pairing: `POST /api` until the link button is pressed.
//
// The bridge answers with a JSON array holding either
// `{"success": {"username", "clientkey"}}` or `{"error": {"type", "description"}}`.
// Error type 101 means the physical link button has not been pressed yet.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::auth::AppCredentials;
use crate::error::Error;

const LINK_BUTTON_NOT_PRESSED: u16 = 101;

/// Who is asking to pair.
#[derive(Debug, Clone)]
pub struct PairingRequest {
    pub app_name: String,
    pub instance_name: String,
    /// Ask for a client key too (needed for entertainment streaming).
    pub generate_client_key: bool,
}

impl PairingRequest {
    pub fn new(app_name: impl Into<String>, instance_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            instance_name: instance_name.into(),
            generate_client_key: true,
        }
    }

    /// The `devicetype` field: `<app>#<instance>`.
    pub fn device_type(&self) -> String {
        format!("{}#{}", self.app_name, self.instance_name)
    }
}

/// How long to wait for the link button and how often to ask.
#[derive(Debug, Clone)]
pub struct PairingOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    devicetype: &'a str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    generateclientkey: bool,
}

#[derive(Debug, Deserialize)]
struct RegisterItem {
    #[serde(default)]
    success: Option<RegisterSuccess>,
    #[serde(default)]
    error: Option<RegisterError>,
}

#[derive(Debug, Deserialize)]
struct RegisterSuccess {
    username: String,
    #[serde(default)]
    clientkey: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisterError {
    #[serde(rename = "type")]
    kind: u16,
    #[serde(default)]
    description: String,
}

/// Poll the register endpoint until the bridge issues credentials.
///
/// Fails with [`Error::PairingTimeout`] if the link button is not pressed
/// within `options.timeout`. Any other bridge rejection fails immediately.
pub async fn register_app(
    http: &reqwest::Client,
    base_url: &Url,
    request: &PairingRequest,
    options: &PairingOptions,
) -> Result<AppCredentials, Error> {
    let base = base_url.as_str().trim_end_matches('/');
    let url = Url::parse(&format!("{base}/api"))?;
    info!(devicetype = %request.device_type(), "Waiting for link button");

    let poll = async {
        loop {
            match try_register(http, &url, request).await {
                Err(Error::LinkButtonNotPressed) => {
                    debug!("link button not pressed yet");
                    tokio::time::sleep(options.poll_interval).await;
                }
                other => return other,
            }
        }
    };

    tokio::time::timeout(options.timeout, poll)
        .await
        .map_err(|_| Error::PairingTimeout {
            timeout_secs: options.timeout.as_secs(),
        })?
}

/// A single registration attempt.
pub async fn try_register(
    http: &reqwest::Client,
    url: &Url,
    request: &PairingRequest,
) -> Result<AppCredentials, Error> {
    let device_type = request.device_type();
    let body = RegisterBody {
        devicetype: &device_type,
        generateclientkey: request.generate_client_key,
    };

    debug!("POST {url}");
    let resp = http.post(url.clone()).json(&body).send().await?;
    let status = resp.status();
    let text = resp.text().await?;

    if !status.is_success() {
        return Err(Error::Bridge {
            status: status.as_u16(),
            errors: vec![format!("pairing request rejected: {status}")],
        });
    }

    let items: Vec<RegisterItem> =
        serde_json::from_str(&text).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: text.clone(),
        })?;

    for item in items {
        if let Some(ok) = item.success {
            info!("Pairing succeeded");
            return Ok(AppCredentials {
                app_key: SecretString::from(ok.username),
                client_key: ok.clientkey.map(SecretString::from),
            });
        }
        if let Some(err) = item.error {
            if err.kind == LINK_BUTTON_NOT_PRESSED {
                return Err(Error::LinkButtonNotPressed);
            }
            return Err(Error::Pairing(err.description));
        }
    }

    Err(Error::Pairing("empty response from bridge".into()))
}
