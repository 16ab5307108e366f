//! Error types and failure classification for the loupe client
//!
//! Classification drives the retry controller: every error knows whether a
//! fresh attempt could succeed ([`ClientError::is_retryable`]) and whether
//! the session token must be discarded first
//! ([`ClientError::requires_session_reset`]).

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use loupe_protocol::RpcErrorObject;
use loupe_protocol::error::codes;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Top-level error type for client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level errors
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Protocol-level errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session management errors
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// The server answered with an application-level error
    #[error("server error (code {code}): {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// The server could not be reached and retries are exhausted. Carries
    /// ordered remediation steps for the operator.
    #[error(
        "analysis server at {endpoint} is unreachable: {reason}\n{}",
        format_suggestions(.suggestions)
    )]
    ServerUnavailable {
        endpoint: String,
        reason: String,
        suggestions: Vec<String>,
    },
}

/// Transport-specific errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection refused/reset, DNS failure, or any other network-level
    /// failure to complete the exchange
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The per-attempt deadline elapsed
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The endpoint could not be used for HTTP at all
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Protocol-specific errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The body parsed under neither the event-stream framing nor as a
    /// direct payload
    #[error("undecodable response body: {0}")]
    InvalidResponse(String),

    /// The response id does not belong to the request that was sent
    #[error("response id mismatch: expected {expected}, got {got}")]
    IdMismatch { expected: u64, got: u64 },
}

/// Session management errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// The initialize response carried no session token header
    #[error("server did not provide a session token during initialization")]
    MissingToken,
}

impl ClientError {
    /// Build an `Rpc` error from a wire error object.
    pub fn rpc(error: RpcErrorObject) -> Self {
        Self::Rpc {
            code: error.code,
            message: error.message,
            data: error.data,
        }
    }

    /// Whether a fresh attempt at the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(TransportError::ConnectionFailed(_)) => true,
            Self::Transport(TransportError::Timeout(_)) => true,
            Self::Transport(TransportError::Status { status, .. }) => {
                *status >= 500 || *status == 401
            }
            // An invalidated session is recoverable by re-initializing;
            // every other application error is authoritative.
            Self::Rpc { code, .. } => *code == codes::INVALID_SESSION,
            _ => false,
        }
    }

    /// Whether the session token must be discarded and re-acquired before
    /// the next attempt.
    pub fn requires_session_reset(&self) -> bool {
        match self {
            Self::Transport(TransportError::Status { status, .. }) => *status == 401,
            Self::Rpc { code, .. } => *code == codes::INVALID_SESSION,
            _ => false,
        }
    }

    /// Whether the failure indicates the server cannot be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Transport(TransportError::ConnectionFailed(_)))
    }

    /// Wrap a terminal unreachability failure into the diagnostic error the
    /// public API surfaces. The remediation list grows more drastic once
    /// failures become persistent.
    pub fn server_unavailable(
        endpoint: &url::Url,
        reason: String,
        consecutive_failures: u32,
    ) -> Self {
        let port = endpoint.port().unwrap_or(crate::config::DEFAULT_PORT);
        let mut suggestions = vec![
            format!("start the analysis server: louped serve --port {}", port),
            "check the server status: louped status".to_string(),
            "inspect the server log for startup failures: louped logs".to_string(),
        ];
        if consecutive_failures >= 3 {
            suggestions.push("restart the server: louped restart".to_string());
        }

        Self::ServerUnavailable {
            endpoint: endpoint.to_string(),
            reason,
            suggestions,
        }
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    suggestions
        .iter()
        .enumerate()
        .map(|(i, s)| format!("  {}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}
