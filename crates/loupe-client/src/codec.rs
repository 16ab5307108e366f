//! Request/response codec
//!
//! Builds outbound request envelopes and parses inbound bodies. The server
//! may answer with a direct JSON payload or wrap the same payload in
//! event-stream framing (`data: ` prefixed lines); both decode identically.
//! Pure transformation, no I/O.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::ProtocolError;
use loupe_protocol::{RequestEnvelope, ResponseEnvelope};

/// Encodes requests with per-instance strictly increasing ids and decodes
/// response bodies under either accepted framing.
#[derive(Debug)]
pub struct Codec {
    next_id: AtomicU64,
}

impl Codec {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
        }
    }

    /// Build a request envelope with a freshly allocated id and serialize
    /// it. Returns the id so the caller can match the response.
    pub fn encode(
        &self,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<(u64, Vec<u8>), ProtocolError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let envelope = RequestEnvelope::new(id, method, params);
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| ProtocolError::InvalidResponse(format!("unencodable request: {}", e)))?;
        Ok((id, body))
    }

    /// Parse a response body. Event-stream framing is tried first; when no
    /// `data:` marker is present the body is parsed directly.
    pub fn decode(&self, body: &[u8]) -> Result<ResponseEnvelope, ProtocolError> {
        if let Ok(text) = std::str::from_utf8(body)
            && let Some(payload) = extract_event_payload(text)
        {
            trace!(bytes = body.len(), "decoding event-stream framed response");
            return serde_json::from_str(&payload).map_err(|e| {
                ProtocolError::InvalidResponse(format!("bad event-stream payload: {}", e))
            });
        }

        serde_json::from_slice(body)
            .map_err(|e| ProtocolError::InvalidResponse(format!("bad response payload: {}", e)))
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the first event's `data:` payload, honoring multi-line `data:`
/// continuation. Returns `None` when the body carries no framing at all.
fn extract_event_payload(text: &str) -> Option<String> {
    let mut data = String::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            // The SSE grammar allows one optional space after the colon.
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest);
        } else if !data.is_empty() && line.trim().is_empty() {
            // Blank line terminates the event; later events belong to
            // whoever streams them, not to this request/response exchange.
            break;
        }
    }

    (!data.is_empty()).then_some(data)
}
