// Hand-crafted async HTTP client for the bridge's CLIP v2 API.
//
// Base path: /clip/v2/resource
// Auth: application key header (see `auth::APPLICATION_KEY_HEADER`)

use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::types::{ClipEnvelope, ResourceRef};
use crate::auth::app_key_headers;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Async client for the CLIP v2 resource API.
///
/// Every call unwraps the `{ errors, data }` envelope: callers see the
/// `data` array on success, `Error::Bridge` with the bridge's own error
/// descriptions on failure, and `Error::RateLimited` on HTTP 429.
pub struct ClipClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ClipClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from an application key and transport config.
    ///
    /// Injects the application key as a default header on every request.
    pub fn new(
        base_url: Url,
        app_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client_with_headers(app_key_headers(app_key)?)?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The bridge base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// `{base}/clip/v2/resource{suffix}`
    fn resource_url(&self, suffix: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/clip/v2/resource{suffix}"))?)
    }

    // ── Resource endpoints ───────────────────────────────────────────

    /// `GET /clip/v2/resource` -- every resource the bridge knows about.
    pub async fn list_resources<T: DeserializeOwned>(&self) -> Result<Vec<T>, Error> {
        self.get(self.resource_url("")?).await
    }

    /// `GET /clip/v2/resource/{type}` -- all resources of one type.
    pub async fn list_resources_of<T: DeserializeOwned>(&self, rtype: &str) -> Result<Vec<T>, Error> {
        self.get(self.resource_url(&format!("/{rtype}"))?).await
    }

    /// `GET /clip/v2/resource/{type}/{id}`
    pub async fn get_resource<T: DeserializeOwned>(
        &self,
        rtype: &str,
        id: &Uuid,
    ) -> Result<Option<T>, Error> {
        let mut items = self.get(self.resource_url(&format!("/{rtype}/{id}"))?).await?;
        Ok(if items.is_empty() {
            None
        } else {
            Some(items.swap_remove(0))
        })
    }

    /// `POST /clip/v2/resource/{type}` -- returns references to what was created.
    pub async fn create_resource<B: Serialize + Sync>(
        &self,
        rtype: &str,
        body: &B,
    ) -> Result<Vec<ResourceRef>, Error> {
        let url = self.resource_url(&format!("/{rtype}"))?;
        debug!("POST {url}");
        let resp = self.http.post(url).json(body).send().await?;
        handle_response(resp).await
    }

    /// `PUT /clip/v2/resource/{type}/{id}`
    pub async fn update_resource<B: Serialize + Sync>(
        &self,
        rtype: &str,
        id: &Uuid,
        body: &B,
    ) -> Result<Vec<ResourceRef>, Error> {
        let url = self.resource_url(&format!("/{rtype}/{id}"))?;
        debug!("PUT {url}");
        let resp = self.http.put(url).json(body).send().await?;
        handle_response(resp).await
    }

    /// `DELETE /clip/v2/resource/{type}/{id}`
    pub async fn delete_resource(&self, rtype: &str, id: &Uuid) -> Result<Vec<ResourceRef>, Error> {
        let url = self.resource_url(&format!("/{rtype}/{id}"))?;
        debug!("DELETE {url}");
        let resp = self.http.delete(url).send().await?;
        handle_response(resp).await
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, Error> {
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        handle_response(resp).await
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Unwrap the `{ errors, data }` envelope.
///
/// 429 maps to `RateLimited`; any other non-2xx maps to `Bridge` carrying
/// whatever error descriptions the body holds. A 2xx with errors but no
/// data is also a failure (the bridge rejected every item).
async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Vec<T>, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited);
    }

    let body = resp.text().await?;

    if !status.is_success() {
        let errors = serde_json::from_str::<ClipEnvelope<serde_json::Value>>(&body)
            .ok()
            .map(|env| env.errors.into_iter().map(|e| e.description).collect::<Vec<_>>())
            .filter(|errs| !errs.is_empty())
            .unwrap_or_else(|| vec![fallback_description(status, &body)]);
        return Err(Error::Bridge {
            status: status.as_u16(),
            errors,
        });
    }

    let envelope: ClipEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
        let head = preview(&body);
        Error::Deserialization {
            message: format!("{e} (body preview: {head:?})"),
            body: body.clone(),
        }
    })?;

    if !envelope.errors.is_empty() {
        let errors: Vec<String> = envelope.errors.into_iter().map(|e| e.description).collect();
        if envelope.data.is_empty() {
            return Err(Error::Bridge {
                status: status.as_u16(),
                errors,
            });
        }
        warn!(?errors, "bridge reported partial errors");
    }

    Ok(envelope.data)
}

fn fallback_description(status: reqwest::StatusCode, body: &str) -> String {
    if body.is_empty() {
        status.to_string()
    } else {
        format!("HTTP {status}: {}", preview(body))
    }
}

/// At most the first 200 characters of a response body.
fn preview(body: &str) -> &str {
    body.char_indices().nth(200).map_or(body, |(end, _)| &body[..end])
}
