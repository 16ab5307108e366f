//! Transport layer for the loupe client
//!
//! One trait, one production implementation. The trait is the seam between
//! the retry controller and the wire so behavior tests can script outcomes
//! without a live server.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::TransportError;
use loupe_protocol::{PROTOCOL_VERSION, SESSION_HEADER, VERSION_HEADER};

/// One HTTP exchange's worth of reply data.
#[derive(Debug, Clone)]
pub struct TransportReply {
    /// HTTP status code
    pub status: u16,
    /// Session token from the dedicated response header, when present
    pub session_id: Option<String>,
    /// Raw response body
    pub body: Bytes,
}

/// A single request/response exchange with the analysis server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to the RPC endpoint, echoing `session` in the session
    /// header when present, bounded by `deadline`.
    async fn send(
        &self,
        body: Vec<u8>,
        session: Option<&str>,
        deadline: Duration,
    ) -> Result<TransportReply, TransportError>;

    /// The endpoint this transport talks to.
    fn endpoint(&self) -> &Url;
}

/// Type alias for a boxed transport
pub type BoxedTransport = Box<dyn Transport>;

/// HTTP transport backed by reqwest.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Create a transport for the given RPC endpoint.
    pub fn new(endpoint: Url) -> Result<Self, TransportError> {
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                endpoint.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("loupe-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                TransportError::InvalidEndpoint(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client, endpoint })
    }

    async fn exchange(
        &self,
        body: Vec<u8>,
        session: Option<&str>,
    ) -> Result<TransportReply, TransportError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", "application/json")
            .header("accept", "application/json, text/event-stream")
            .header(VERSION_HEADER, PROTOCOL_VERSION);

        if let Some(token) = session {
            request = request.header(SESSION_HEADER, token);
        }

        let response = request.body(body).send().await.map_err(map_reqwest)?;

        let status = response.status();
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(map_reqwest)?;
        debug!(
            status = status.as_u16(),
            bytes = body.len(),
            has_session = session_id.is_some(),
            "received reply"
        );

        Ok(TransportReply {
            status: status.as_u16(),
            session_id,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        body: Vec<u8>,
        session: Option<&str>,
        deadline: Duration,
    ) -> Result<TransportReply, TransportError> {
        match tokio::time::timeout(deadline, self.exchange(body, session)).await {
            Ok(reply) => reply,
            Err(_) => Err(TransportError::Timeout(deadline)),
        }
    }

    fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(Duration::ZERO)
    } else {
        // Connection refused/reset and DNS failures all land here; reqwest
        // keeps the detail in the error chain.
        TransportError::ConnectionFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_scheme() {
        let endpoint = Url::parse("ftp://127.0.0.1:8650/rpc").unwrap();
        let result = HttpTransport::new(endpoint);
        assert!(matches!(result, Err(TransportError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_endpoint_accessor() {
        let endpoint = Url::parse("http://127.0.0.1:8650/rpc").unwrap();
        let transport = HttpTransport::new(endpoint.clone()).unwrap();
        assert_eq!(transport.endpoint(), &endpoint);
    }
}
