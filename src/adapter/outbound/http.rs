//! JSON-over-HTTP peer client.
//!
//! Every request goes through the peer's [`DependencyClient`], so transport
//! failures and 5xx responses are retried and counted by its breaker while
//! 4xx responses fail immediately.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::application::resilience::DependencyClient;
use crate::domain::ErrorKind;
use crate::error::{Error, Result};

/// Longest response body excerpt carried in an error.
const MAX_ERROR_BODY: usize = 256;

/// HTTP client bound to one peer service.
#[derive(Debug, Clone)]
pub struct HttpPeer {
    client: Client,
    base_url: Url,
    health_path: String,
    dependency: Arc<DependencyClient>,
}

impl HttpPeer {
    /// Build a peer rooted at `base_url`.
    ///
    /// Paths passed to the request methods are joined onto `base_url` with
    /// URL reference rules, so a base without a trailing slash loses its
    /// last segment.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` does not parse or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str, timeout: Duration, dependency: Arc<DependencyClient>) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            health_path: "health".into(),
            dependency,
        })
    }

    /// Path probed by [`health`](Self::health), relative to the base URL.
    #[must_use]
    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.dependency.name()
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn dependency(&self) -> &Arc<DependencyClient> {
        &self.dependency
    }

    /// GET `path` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Returns the classified failure after retries, or a circuit-open
    /// error while the peer's breaker is open.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None).await
    }

    /// POST `body` as JSON to `path` and decode the JSON response.
    ///
    /// # Errors
    ///
    /// Same as [`get_json`](Self::get_json), plus a permanent error if
    /// `body` cannot be serialized.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(&body)).await
    }

    #[must_use]
    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    /// GET the health path and report the response status, ignoring the
    /// body.
    ///
    /// Any 2xx counts as healthy; other statuses are classified like
    /// regular requests.
    ///
    /// # Errors
    ///
    /// Returns the classified failure after retries, or a circuit-open
    /// error.
    pub async fn health(&self) -> Result<u16> {
        let url = self.base_url.join(&self.health_path)?;
        let name = self.name();
        self.dependency
            .call(|| {
                let request = self.client.get(url.clone());
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    if status.is_success() {
                        Ok(status.as_u16())
                    } else {
                        Err(status_error(name, status, response.text().await.unwrap_or_default()))
                    }
                }
            })
            .await
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let url = self.base_url.join(path)?;
        let name = self.name();
        debug!(dependency = name, %method, %url, "Peer request");

        self.dependency
            .call(|| {
                let mut request = self.client.request(method.clone(), url.clone());
                if let Some(body) = body {
                    request = request.json(body);
                }
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        let text = response.text().await.unwrap_or_default();
                        return Err(status_error(name, status, text));
                    }
                    response.json::<T>().await.map_err(|err| {
                        Error::permanent(name, Some(status.as_u16()), format!("invalid response body: {err}"))
                    })
                }
            })
            .await
    }
}

/// Map a non-success status to a transient or permanent error.
fn status_error(dependency: &str, status: StatusCode, body: String) -> Error {
    let code = status.as_u16();
    let mut excerpt = body;
    if excerpt.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !excerpt.is_char_boundary(cut) {
            cut -= 1;
        }
        excerpt.truncate(cut);
    }

    match ErrorKind::from_status(code) {
        ErrorKind::Transient => Error::transient(dependency, format!("status {code}: {excerpt}")),
        _ => Error::permanent(dependency, Some(code), excerpt),
    }
}
