//! HTTP transport seam between the pipeline and the remote workflow service.
//!
//! The submission client and the poller never touch `reqwest` directly; they
//! talk to an [`Arc<dyn Transport>`]. Production code uses
//! [`ReqwestTransport`]; tests inject a scripted implementation so the
//! endpoint-fallback and completion rules can be exercised without a network.
//!
//! A transport only moves bytes. It reports every HTTP status as a normal
//! [`HttpReply`] and reserves [`TransportError`] for calls that produced no
//! status at all (timeouts, refused connections, TLS failures).

use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Status code and raw body of one HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Decode the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    /// First `max` characters of the body, for error messages.
    pub fn body_excerpt(&self, max: usize) -> String {
        self.body.chars().take(max).collect()
    }
}

/// Outbound HTTP calls needed by the pipeline.
///
/// Implementations must be `Send + Sync`: batch extraction shares one
/// transport across concurrently running documents.
#[async_trait]
pub trait Transport: Send + Sync {
    /// `POST url` with a JSON body and bearer authorisation.
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError>;

    /// `GET url` with bearer authorisation.
    async fn get(
        &self,
        url: &str,
        bearer: &str,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing client (custom proxies, root certificates, …).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn finish(
        url: &str,
        timeout: Duration,
        sent: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<HttpReply, TransportError> {
        let response = sent.map_err(|e| map_reqwest_error(url, timeout, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))?;
        debug!("{} → HTTP {} ({} bytes)", url, status, body.len());
        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        let sent = self
            .client
            .post(url)
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, "*/*")
            .json(body)
            .timeout(timeout)
            .send()
            .await;
        Self::finish(url, timeout, sent).await
    }

    async fn get(
        &self,
        url: &str,
        bearer: &str,
        timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        let sent = self
            .client
            .get(url)
            .bearer_auth(bearer)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .send()
            .await;
        Self::finish(url, timeout, sent).await
    }
}

fn map_reqwest_error(url: &str, timeout: Duration, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            secs: timeout.as_secs(),
        }
    } else if e.is_connect() {
        TransportError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        }
    } else {
        TransportError::Request {
            url: url.to_string(),
            detail: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_status_helpers() {
        assert!(HttpReply::new(200, "{}").is_success());
        assert!(HttpReply::new(204, "").is_success());
        assert!(!HttpReply::new(404, "").is_success());
        assert!(HttpReply::new(404, "").is_not_found());
    }

    #[test]
    fn reply_json_and_excerpt() {
        let r = HttpReply::new(200, r#"{"run_id":"abc"}"#);
        assert_eq!(r.json().unwrap()["run_id"], "abc");
        assert_eq!(HttpReply::new(500, "x".repeat(500)).body_excerpt(200).len(), 200);
    }
}
