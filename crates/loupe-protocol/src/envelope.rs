use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RpcErrorObject;

/// A request to the analysis server.
///
/// Ids are allocated strictly increasingly by the sending client; the server
/// echoes the id back so the caller can match its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub protocol_version: String,
    pub id: u64,
    pub method: String,
    pub params: Map<String, Value>,
}

impl RequestEnvelope {
    pub fn new(id: u64, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A response from the analysis server: either a result or an error, never
/// both. Kept as an untagged union so success and failure stay structurally
/// separate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseEnvelope {
    Success { id: u64, result: Value },
    Failure { id: u64, error: RpcErrorObject },
}

impl ResponseEnvelope {
    pub fn success(id: u64, result: Value) -> Self {
        Self::Success { id, result }
    }

    pub fn failure(id: u64, error: RpcErrorObject) -> Self {
        Self::Failure { id, error }
    }

    pub fn id(&self) -> u64 {
        match self {
            Self::Success { id, .. } | Self::Failure { id, .. } => *id,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// Collapse into the usual `Result` shape.
    pub fn into_result(self) -> Result<Value, RpcErrorObject> {
        match self {
            Self::Success { result, .. } => Ok(result),
            Self::Failure { error, .. } => Err(error),
        }
    }
}
