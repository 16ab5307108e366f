use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Error codes used on the wire.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;

    /// Session token missing, expired, or unknown to the server. A client
    /// receiving this must discard its token and re-initialize.
    pub const INVALID_SESSION: i64 = -32001;
}

/// Error object carried in a failure response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
#[error("{code}: {message}")]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcErrorObject {
    pub fn new(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("Method '{}' not found", method),
            None,
        )
    }

    pub fn invalid_params(message: &str) -> Self {
        Self::new(codes::INVALID_PARAMS, message, None)
    }

    pub fn invalid_session() -> Self {
        Self::new(codes::INVALID_SESSION, "Invalid or expired session", None)
    }

    pub fn server_error(code: i64, message: &str, data: Option<Value>) -> Self {
        debug_assert!(
            (codes::SERVER_ERROR_START..=codes::SERVER_ERROR_END).contains(&code),
            "server error code must be in range -32099 to -32000"
        );
        Self::new(code, message, data)
    }

    /// Whether this error invalidates the client's session token.
    pub fn is_invalid_session(&self) -> bool {
        self.code == codes::INVALID_SESSION
    }
}
