use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const USER_AGENT: &str = concat!("walkabout-backend/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("request to {url} failed: {reason}")]
pub struct TransportError {
    pub url: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Outbound HTTP GET. Everything that talks to a third party API goes
/// through here so the calls can be stubbed in tests.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: Url) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

impl<T: HttpTransport> HttpTransport for Arc<T> {
    fn get(&self, url: Url) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        (**self).get(url)
    }
}

#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: Url) -> Result<HttpResponse, TransportError> {
        let to_error = |url: &Url, e: reqwest::Error| TransportError {
            url: redact(url),
            // reqwest's Display repeats the raw url, key included
            reason: e.without_url().to_string(),
        };

        debug!("GET {}", redact(&url));
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| to_error(&url, e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| to_error(&url, e))?;

        Ok(HttpResponse { status, body })
    }
}

/// Strips API keys from a URL before it ends up in logs or error messages.
pub fn redact(url: &Url) -> String {
    if !url.query_pairs().any(|(k, _)| k == "key") {
        return url.to_string();
    }
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "key" { "REDACTED".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}
