use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::Error;

/// Header carrying the application key on every CLIP v2 request.
pub const APPLICATION_KEY_HEADER: &str = "hue-application-key";

/// Credentials issued by the bridge when an application is paired.
///
/// The application key authenticates REST and event-stream calls; the
/// client key is the PSK for the entertainment DTLS transport and is only
/// issued when pairing asked for it.
#[derive(Debug, Clone)]
pub struct AppCredentials {
    pub app_key: SecretString,
    pub client_key: Option<SecretString>,
}

/// Build the default header map that authenticates an HTTP client.
pub(crate) fn app_key_headers(app_key: &SecretString) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    let mut value = HeaderValue::from_str(app_key.expose_secret())
        .map_err(|e| Error::Pairing(format!("invalid application key header value: {e}")))?;
    value.set_sensitive(true);
    headers.insert(APPLICATION_KEY_HEADER, value);
    Ok(headers)
}
