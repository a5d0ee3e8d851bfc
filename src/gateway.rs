use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;
use crate::session::SessionStore;

/// Default bound on a single request, connect through body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Single outbound path to the toss service.
///
/// Attaches the bearer credential, maps every failure into [`ClientError`],
/// and tears the session down on any 401.
#[derive(Clone, Debug)]
pub struct Gateway {
    http: reqwest::Client,
    base_url: String,
    session: SessionStore,
}

impl Gateway {
    /// Build a gateway rooted at `base_url` (for example `https://host/api`).
    pub fn new(base_url: &str, timeout: Duration, session: SessionStore) -> Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("invalid API base URL {base_url}"))?;
        if parsed.cannot_be_a_base() {
            anyhow::bail!("API base URL {base_url} cannot carry paths");
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(encode(body)?)).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, Some(encode(body)?)).await
    }

    /// DELETE a resource addressed by path segments, each percent-encoded.
    ///
    /// Use this when a segment comes from user input: a `/` or `?` inside it
    /// stays part of the segment instead of reaching another route.
    pub async fn delete_segments<T: DeserializeOwned>(
        &self,
        segments: &[&str],
    ) -> Result<T, ClientError> {
        let url = self.segment_url(segments)?;
        let label = format!("/{}", segments.join("/"));
        self.send(Method::DELETE, url.as_str(), &label, None).await
    }

    fn segment_url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
            return Err(ClientError::Validation(format!(
                "invalid path segment in {segments:?}"
            )));
        }
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::Validation(format!("invalid API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Validation("API base URL cannot carry paths".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Issue one request and decode the JSON response.
    ///
    /// Never retries. A 401 clears the session before returning
    /// [`ClientError::Auth`]; redirecting is up to the caller.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.send(method, &url, path, body).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let mut req = self.http.request(method.clone(), url);
        match self.session.current_credential() {
            Some(token) => req = req.bearer_auth(token),
            None => debug!("{method} {path} without credential"),
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let response = req.send().await.map_err(network_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(network_error)?;
        debug!("{method} {path} -> {status} ({} bytes)", bytes.len());

        if status == StatusCode::UNAUTHORIZED {
            self.session.expire();
            return Err(ClientError::Auth(server_message(&bytes)));
        }
        if !status.is_success() {
            let message = server_message(&bytes);
            warn!(
                "API error on {method} {path}: {status} {}",
                message.as_deref().unwrap_or("<no message>")
            );
            return Err(ClientError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(payload).map_err(|e| ClientError::Http {
            status: status.as_u16(),
            message: Some(format!("unexpected response body: {e}")),
        })
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value, ClientError> {
    serde_json::to_value(body)
        .map_err(|e| ClientError::Validation(format!("request body not serializable: {e}")))
}

fn network_error(err: reqwest::Error) -> ClientError {
    ClientError::Network {
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

/// Pull `message` (or `error`) out of a JSON error payload.
fn server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["message", "error"]
        .iter()
        .filter_map(|key| value.get(key)?.as_str())
        .map(str::trim)
        .find(|msg| !msg.is_empty())
        .map(str::to_string)
}
