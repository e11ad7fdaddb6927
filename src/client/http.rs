//! HTTP plumbing shared by both backends.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use super::config::BackendConfig;
use super::retry::retry_send;
use super::session::Session;
use crate::core::{BackendError, BackendErrorKind, VoteCounts};

/// Longest response body excerpt kept in an error message.
const MAX_BODY_EXCERPT: usize = 256;

/// Counts as stored on a post or comment row.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct CountsRow {
    #[serde(default)]
    pub up_count: Option<i64>,
    #[serde(default)]
    pub down_count: Option<i64>,
}

impl CountsRow {
    pub fn counts(&self) -> VoteCounts {
        VoteCounts::from_wire(self.up_count, self.down_count)
    }
}

/// Row holding a single vote value.
#[derive(Debug, Deserialize)]
pub(crate) struct ValueRow {
    #[serde(default)]
    pub value: Option<i64>,
}

/// Configured `reqwest` client plus session.
#[derive(Clone)]
pub(crate) struct HttpCore {
    http: reqwest::Client,
    base_url: Url,
    max_retries: u32,
    session: Arc<Session>,
}

impl HttpCore {
    pub fn new(config: &BackendConfig, session: Arc<Session>) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.anon_key {
            let mut value = HeaderValue::from_str(key.as_str()).map_err(|_| {
                BackendError::new(
                    BackendErrorKind::Rejected,
                    "anon key is not a valid header value",
                )
            })?;
            value.set_sensitive(true);
            headers.insert("apikey", value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| {
                BackendError::new(BackendErrorKind::Transport, format!("client init: {e}"))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            max_retries: config.max_retries,
            session,
        })
    }

    /// Absolute URL for `path` (plus extra escaped segments) with query pairs.
    pub fn url(
        &self,
        path: &str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<Url, BackendError> {
        let mut url = self.base_url.clone();
        {
            let mut parts = url.path_segments_mut().map_err(|()| {
                BackendError::new(BackendErrorKind::Rejected, "base URL cannot be a base")
            })?;
            parts.pop_if_empty();
            parts.extend(path.split('/').filter(|s| !s.is_empty()));
            parts.extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub fn get(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.get(url))
    }

    pub fn post(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.post(url))
    }

    pub fn delete(&self, url: Url) -> RequestBuilder {
        self.authorize(self.http.delete(url))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match self.session.bearer() {
            Some(token) => req.bearer_auth(token.as_str()),
            None => req,
        }
    }

    /// Send a mutation exactly once.
    pub async fn send_once(
        &self,
        endpoint: &str,
        req: RequestBuilder,
    ) -> Result<Response, BackendError> {
        debug!(endpoint, "backend request");
        let resp = req.send().await.map_err(|e| transport(endpoint, &e))?;
        check_status(endpoint, resp).await
    }

    /// Send an idempotent read, retrying transport failures.
    ///
    /// `allow_not_found` hands a 404 back to the caller instead of failing.
    pub async fn send_read<F>(
        &self,
        endpoint: &str,
        allow_not_found: bool,
        build: F,
    ) -> Result<Response, BackendError>
    where
        F: Fn() -> RequestBuilder,
    {
        debug!(endpoint, "backend read");
        let resp = retry_send(endpoint, self.max_retries, || build().send())
            .await
            .map_err(|e| transport(endpoint, &e))?;
        if allow_not_found && resp.status() == StatusCode::NOT_FOUND {
            return Ok(resp);
        }
        check_status(endpoint, resp).await
    }
}

impl std::fmt::Debug for HttpCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCore")
            .field("base_url", &self.base_url.as_str())
            .field("max_retries", &self.max_retries)
            .field("session", &self.session)
            .finish()
    }
}

fn transport(endpoint: &str, err: &reqwest::Error) -> BackendError {
    warn!(endpoint, "backend unreachable: {err}");
    BackendError::new(BackendErrorKind::Transport, format!("{endpoint}: {err}"))
}

async fn check_status(endpoint: &str, resp: Response) -> Result<Response, BackendError> {
    let status = resp.status().as_u16();
    let Some(kind) = BackendErrorKind::from_status(status) else {
        return Ok(resp);
    };

    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > MAX_BODY_EXCERPT {
        let cut = (0..=MAX_BODY_EXCERPT)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    warn!(endpoint, status, %kind, "backend refused request");
    Err(BackendError::new(kind, format!("{endpoint} returned {status}: {body}")))
}

/// Decode a JSON body.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    endpoint: &str,
    resp: Response,
) -> Result<T, BackendError> {
    resp.json().await.map_err(|e| {
        BackendError::new(BackendErrorKind::Decode, format!("{endpoint}: {e}"))
    })
}
