//! Single entry point for every call to the NutriScan service.
//!
//! [`RequestGateway::send`] attaches the session credential, encodes the
//! body, routes the request through the [`OfflineCache`] and classifies the
//! response:
//!
//! | Response | Result |
//! |---|---|
//! | `401` | session invalidated if the rejected credential is still current, [`ClientError::AuthExpired`] |
//! | detail `subscription_required` | [`ClientError::SubscriptionRequired`] |
//! | other non-2xx | [`ClientError::Request`] with the server detail |
//! | transport failure | [`ClientError::NetworkUnavailable`] |
//! | 2xx | decoded JSON body |

use std::sync::Arc;

use nutriscan_core::Credential;
use reqwest::Method;
use reqwest::multipart::{Form, Part as FormPart};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cache::{Fetched, OfflineCache};
use crate::error::{ClientError, SUBSCRIPTION_REQUIRED_DETAIL};
use crate::session::SessionStore;

const DEFAULT_AUTH_DETAIL: &str = "Invalid token";

// =============================================================================
// Request bodies
// =============================================================================

/// Request body.
#[derive(Debug, Clone)]
pub enum Body {
    /// Sent as `application/json`.
    Json(Value),
    /// Sent as `multipart/form-data`.
    Multipart(Vec<Part>),
}

impl Body {
    /// Serialize `value` into a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Decode` if `value` cannot be represented as JSON.
    pub fn json<T: serde::Serialize>(value: &T) -> Result<Self, ClientError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }
}

/// One field of a multipart body.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    kind: PartKind,
}

#[derive(Debug, Clone)]
enum PartKind {
    Text(String),
    File {
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl Part {
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PartKind::Text(value.into()),
        }
    }

    #[must_use]
    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: PartKind::File {
                file_name: file_name.into(),
                mime: mime.into(),
                bytes,
            },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn multipart_form(parts: Vec<Part>) -> Result<Form, ClientError> {
    parts.into_iter().try_fold(Form::new(), |form, part| {
        Ok(match part.kind {
            PartKind::Text(value) => form.text(part.name, value),
            PartKind::File {
                file_name,
                mime,
                bytes,
            } => {
                let file = FormPart::bytes(bytes)
                    .file_name(file_name)
                    .mime_str(&mime)
                    .map_err(ClientError::Build)?;
                form.part(part.name, file)
            }
        })
    })
}

// =============================================================================
// RequestGateway
// =============================================================================

/// Authenticated, cache-aware HTTP gateway.
#[derive(Clone)]
pub struct RequestGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    client: reqwest::Client,
    api_url: Url,
    session: SessionStore,
    cache: OfflineCache,
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("api_url", &self.inner.api_url.as_str())
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

impl RequestGateway {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_url: Url,
        session: SessionStore,
        cache: OfflineCache,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                client,
                api_url,
                session,
                cache,
            }),
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    #[must_use]
    pub fn cache(&self) -> &OfflineCache {
        &self.inner.cache
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.inner.api_url
    }

    /// Absolute URL for `path` (which may carry a query string).
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidUrl` if the result is not a valid URL.
    pub fn url(&self, path: &str) -> Result<Url, ClientError> {
        let base = self.inner.api_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Send an authenticated request and decode the JSON response.
    ///
    /// # Errors
    ///
    /// See the module documentation for the full classification.
    #[instrument(skip(self, body), fields(method = %method))]
    pub async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        method: Method,
        body: Option<Body>,
    ) -> Result<T, ClientError> {
        let mut builder = self.inner.client.request(method, self.url(path)?);
        let credential = self.inner.session.credential();
        if let Some(credential) = &credential {
            builder = builder.bearer_auth(credential.expose());
        }
        builder = match body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Multipart(parts)) => builder.multipart(multipart_form(parts)?),
            None => builder,
        };
        let request = builder.build().map_err(ClientError::from_transport)?;

        let fetched = self.inner.cache.fetch(request).await?;
        self.classify(path, credential.as_ref(), fetched)
    }

    /// Unauthenticated `GET`. Never carries the credential, so the response
    /// may be served from the offline cache when the network is down.
    ///
    /// # Errors
    ///
    /// Same as [`RequestGateway::send`].
    #[instrument(skip(self))]
    pub async fn fetch_public<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let request = self
            .inner
            .client
            .get(self.url(path)?)
            .build()
            .map_err(ClientError::from_transport)?;

        let fetched = self.inner.cache.fetch(request).await?;
        if fetched.is_from_cache() {
            debug!(path, "Served public request from offline cache");
        }
        self.classify(path, None, fetched)
    }

    /// `sent` is the credential the request carried; a 401 only clears the
    /// session while that credential is still current.
    fn classify<T: DeserializeOwned>(
        &self,
        path: &str,
        sent: Option<&Credential>,
        fetched: Fetched,
    ) -> Result<T, ClientError> {
        let status = fetched.status;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            match sent {
                Some(credential) => {
                    self.inner.session.invalidate_if(credential);
                }
                None => self.inner.session.invalidate(),
            }
            let detail = extract_detail(&fetched.body)
                .unwrap_or_else(|| DEFAULT_AUTH_DETAIL.to_string());
            return Err(ClientError::AuthExpired { detail });
        }

        if !status.is_success() {
            let detail = extract_detail(&fetched.body)
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            if detail == SUBSCRIPTION_REQUIRED_DETAIL {
                debug!(path, status = status.as_u16(), "Subscription required");
                return Err(ClientError::SubscriptionRequired);
            }
            warn!(path, status = status.as_u16(), detail = %detail, "Request failed");
            return Err(ClientError::Request {
                status: status.as_u16(),
                detail,
            });
        }

        let body: &[u8] = if fetched.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &fetched.body
        };
        serde_json::from_slice(body).map_err(|e| {
            warn!(path, error = %e, "Failed to decode response");
            ClientError::Decode(e)
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Pull the human readable detail out of an error body.
///
/// Accepts `{"detail": "..."}` and validation lists of the form
/// `{"detail": [{"msg": "..."}, ...]}`, joined with `"; "`.
fn extract_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        Value::Array(entries) => {
            let messages: Vec<&str> = entries
                .iter()
                .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}
