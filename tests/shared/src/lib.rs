//! Shared testing utilities for the loupe workspace
//!
//! Provides a scripted [`MockTransport`] so behavior tests can drive the
//! client through exact failure sequences without a live server, plus small
//! helpers for building fast-retry clients.

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use loupe_client::error::TransportError;
use loupe_client::transport::{Transport, TransportReply};
use loupe_client::{ClientConfig, LoupeClient};

/// One scripted transport exchange. Envelope-producing variants echo the
/// request's id so responses always match, the way a real server would.
#[derive(Debug)]
pub enum Scripted {
    /// `{id, result}` with an optional session header
    Success {
        result: Value,
        session: Option<String>,
    },
    /// Same payload delivered under event-stream framing
    SseSuccess {
        result: Value,
        session: Option<String>,
    },
    /// `{id, error: {code, message}}`
    RpcError { code: i64, message: String },
    /// Network-level failure before any response
    ConnectionRefused,
    /// Per-attempt deadline elapsed
    Timeout,
    /// Non-success HTTP status
    Status { status: u16, body: String },
    /// Arbitrary body bytes, for malformed-response cases
    Raw { body: Vec<u8> },
    /// Never responds; exercises caller-side deadlines
    Hang,
}

impl Scripted {
    pub fn ok(result: Value) -> Self {
        Self::Success {
            result,
            session: None,
        }
    }

    pub fn ok_with_session(result: Value, session: &str) -> Self {
        Self::Success {
            result,
            session: Some(session.to_string()),
        }
    }

    /// The usual initialize reply: server info plus a session header.
    pub fn init(session: &str) -> Self {
        Self::ok_with_session(json!({"serverInfo": {"name": "louped"}}), session)
    }

    pub fn invalid_session() -> Self {
        Self::RpcError {
            code: loupe_protocol::error::codes::INVALID_SESSION,
            message: "Invalid or expired session".to_string(),
        }
    }
}

/// What the client actually put on the wire, one entry per exchange.
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: String,
    pub id: u64,
    pub session: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    script: Mutex<VecDeque<Scripted>>,
    sent: Mutex<Vec<SentRequest>>,
}

/// Transport that replays a script instead of touching the network.
#[derive(Debug)]
pub struct MockTransport {
    endpoint: Url,
    state: Arc<MockState>,
}

/// Inspection handle that outlives the boxed transport.
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Arc<MockState>,
}

impl MockTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        let state = MockState {
            script: Mutex::new(script.into_iter().collect()),
            sent: Mutex::new(Vec::new()),
        };
        Self {
            endpoint: Url::parse("http://127.0.0.1:8650/rpc").expect("static endpoint"),
            state: Arc::new(state),
        }
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: self.state.clone(),
        }
    }
}

impl MockHandle {
    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.sent.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.sent().into_iter().map(|r| r.method).collect()
    }

    pub fn remaining(&self) -> usize {
        self.state.script.lock().len()
    }

    /// Append more scripted exchanges mid-test.
    pub fn extend(&self, steps: impl IntoIterator<Item = Scripted>) {
        self.state.script.lock().extend(steps);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        body: Vec<u8>,
        session: Option<&str>,
        deadline: Duration,
    ) -> Result<TransportReply, TransportError> {
        let request: Value = serde_json::from_slice(&body).expect("request body is JSON");
        let id = request["id"].as_u64().expect("request carries an id");
        let method = request["method"]
            .as_str()
            .expect("request carries a method")
            .to_string();

        self.state.sent.lock().push(SentRequest {
            method,
            id,
            session: session.map(str::to_owned),
        });

        let step = self
            .state
            .script
            .lock()
            .pop_front()
            .expect("mock script exhausted");

        match step {
            Scripted::Success { result, session } => Ok(TransportReply {
                status: 200,
                session_id: session,
                body: Bytes::from(json!({"id": id, "result": result}).to_string()),
            }),
            Scripted::SseSuccess { result, session } => Ok(TransportReply {
                status: 200,
                session_id: session,
                body: Bytes::from(format!(
                    "data: {}\n\n",
                    json!({"id": id, "result": result})
                )),
            }),
            Scripted::RpcError { code, message } => Ok(TransportReply {
                status: 200,
                session_id: None,
                body: Bytes::from(
                    json!({"id": id, "error": {"code": code, "message": message}}).to_string(),
                ),
            }),
            Scripted::ConnectionRefused => Err(TransportError::ConnectionFailed(
                "tcp connect error: connection refused (os error 111)".to_string(),
            )),
            Scripted::Timeout => Err(TransportError::Timeout(deadline)),
            Scripted::Status { status, body } => Err(TransportError::Status { status, body }),
            Scripted::Raw { body } => Ok(TransportReply {
                status: 200,
                session_id: None,
                body: Bytes::from(body),
            }),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(TransportError::ConnectionFailed("unreachable".to_string()))
            }
        }
    }

    fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Default config with a 1 ms backoff base so exhaustion tests finish fast.
pub fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.retry.backoff_base = Duration::from_millis(1);
    config
}

/// Client wired to a scripted transport, plus the inspection handle.
pub fn scripted_client(script: impl IntoIterator<Item = Scripted>) -> (LoupeClient, MockHandle) {
    scripted_client_with(fast_config(), script)
}

pub fn scripted_client_with(
    config: ClientConfig,
    script: impl IntoIterator<Item = Scripted>,
) -> (LoupeClient, MockHandle) {
    let transport = MockTransport::new(script);
    let handle = transport.handle();
    let client = LoupeClient::builder()
        .with_config(config)
        .with_transport(Box::new(transport))
        .build()
        .expect("mock-backed client builds");
    (client, handle)
}

/// Install the test tracing subscriber; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
