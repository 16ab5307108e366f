//! Main loupe client implementation

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use crate::codec::Codec;
use crate::config::{ClientConfig, EndpointConfig};
use crate::error::{ClientError, ClientResult, ProtocolError, SessionError};
use crate::metrics::{MetricsCollector, MetricsSnapshot};
use crate::session::{SessionManager, SessionState};
use crate::transport::{BoxedTransport, HttpTransport};

use loupe_protocol::methods;

/// Client for a long-lived loupe analysis server.
///
/// Each instance owns its session token, request-id counter, failure
/// counter, and metrics outright; instances targeting different servers are
/// freely concurrent. A single instance serializes overlapping calls through
/// its transport lock and is intended for one outstanding call at a time.
/// Issue concurrent calls from separate instances instead.
pub struct LoupeClient {
    /// Transport layer; the lock is the single-call-in-flight boundary
    transport: tokio::sync::Mutex<BoxedTransport>,
    /// Request envelope codec, owns the id counter
    codec: Codec,
    /// Session token and staleness tracking
    session: SessionManager,
    /// Call-outcome accounting
    metrics: MetricsCollector,
    /// Logical calls that exhausted retries since the last success
    consecutive_failures: AtomicU32,
    /// Resolved RPC endpoint
    endpoint: Url,
    /// Effective server port, reported by health probes
    port: u16,
    /// Configuration
    config: ClientConfig,
}

/// Outcome of a liveness probe. Produced for every probe; a probe never
/// raises.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub port: u16,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoupeClient {
    pub fn builder() -> LoupeClientBuilder {
        LoupeClientBuilder::new()
    }

    /// Invoke a named analysis tool.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> ClientResult<Value> {
        self.call_tool_with_timeout(name, arguments, self.config.timeouts.request)
            .await
    }

    /// Invoke a named analysis tool under a caller-chosen per-attempt
    /// deadline.
    pub async fn call_tool_with_timeout(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> ClientResult<Value> {
        let mut params = Map::new();
        params.insert("name".to_string(), Value::String(name.to_string()));
        params.insert("arguments".to_string(), arguments);

        self.call_with_retry(methods::CALL_TOOL, params, timeout)
            .await
    }

    /// List the tools the server currently offers.
    pub async fn list_tools(&self) -> ClientResult<Value> {
        self.call_with_retry(methods::LIST_TOOLS, Map::new(), self.config.timeouts.request)
            .await
    }

    /// Probe server liveness with one minimal round-trip under its own
    /// short deadline. Failures are folded into the report, never raised.
    pub async fn health_check(&self, timeout: Option<Duration>) -> HealthReport {
        let deadline = timeout.unwrap_or(self.config.timeouts.health_check);
        let started = Instant::now();

        let outcome = tokio::time::timeout(deadline, self.probe(deadline)).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(())) => HealthReport {
                healthy: true,
                port: self.port,
                response_time_ms,
                error: None,
            },
            Ok(Err(err)) => {
                debug!(error = %err, "health probe failed");
                HealthReport {
                    healthy: false,
                    port: self.port,
                    response_time_ms,
                    error: Some(err.to_string()),
                }
            }
            Err(_) => HealthReport {
                healthy: false,
                port: self.port,
                response_time_ms,
                error: Some(format!("health probe timed out after {:?}", deadline)),
            },
        }
    }

    /// Current metrics counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Zero the metrics counters. Session and retry state are untouched.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Observable session lifecycle state.
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Drop the session token; the next call re-initializes.
    pub fn invalidate_session(&self) {
        self.session.invalidate();
        self.metrics.record_session_reset();
    }

    /// Logical calls that have exhausted retries since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Retry controller: bounded attempts with exponential backoff, driven
    /// by error classification. One outcome lands in metrics per logical
    /// call; the failure counter moves only on exhaustion or success.
    async fn call_with_retry(
        &self,
        method: &str,
        params: Map<String, Value>,
        deadline: Duration,
    ) -> ClientResult<Value> {
        let started = Instant::now();
        let max_retries = self.config.retry.max_retries;
        let mut attempt: u32 = 0;

        loop {
            self.metrics.record_attempt();
            match self.attempt_call(method, &params, deadline).await {
                Ok(result) => {
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    self.metrics.record_success(started.elapsed());
                    debug!(
                        method,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "call completed"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    warn!(method, attempt, error = %err, "call attempt failed");

                    if err.requires_session_reset() {
                        self.session.invalidate();
                        self.metrics.record_session_reset();
                    }

                    if !err.is_retryable() {
                        self.metrics.record_failure(&err.to_string());
                        return Err(err);
                    }

                    if attempt >= max_retries {
                        let failures =
                            self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                        let terminal = if err.is_unreachable() {
                            ClientError::server_unavailable(
                                &self.endpoint,
                                err.to_string(),
                                failures,
                            )
                        } else {
                            err
                        };
                        self.metrics.record_failure(&terminal.to_string());
                        warn!(
                            method,
                            attempts = attempt + 1,
                            consecutive_failures = failures,
                            "call failed after exhausting retries"
                        );
                        return Err(terminal);
                    }

                    attempt += 1;
                    let delay = self.config.retry.delay_for_attempt(attempt);
                    debug!(
                        method,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// One physical attempt: ensure session, encode, send, decode.
    async fn attempt_call(
        &self,
        method: &str,
        params: &Map<String, Value>,
        deadline: Duration,
    ) -> ClientResult<Value> {
        let token = self.ensure_session().await?;
        let (id, body) = self.codec.encode(method, params.clone())?;
        debug!(id, method, "sending request");

        let reply = {
            let transport = self.transport.lock().await;
            transport.send(body, Some(&token), deadline).await?
        };

        // The server may rotate the token mid-session; adopt whatever it
        // hands back.
        if let Some(fresh) = reply.session_id
            && fresh != token
        {
            self.session.activate(fresh);
        }

        let envelope = self.codec.decode(&reply.body)?;
        if envelope.id() != id {
            return Err(ProtocolError::IdMismatch {
                expected: id,
                got: envelope.id(),
            }
            .into());
        }

        envelope.into_result().map_err(ClientError::rpc)
    }

    /// Hand back the current token, initializing first when none is held or
    /// the held one has gone stale.
    async fn ensure_session(&self) -> ClientResult<String> {
        if let Some(token) = self.session.current() {
            return Ok(token);
        }
        self.initialize_session().await
    }

    async fn initialize_session(&self) -> ClientResult<String> {
        info!(state = %self.session.state(), "initializing analysis session");
        self.session.mark_initializing();

        match self.perform_initialize().await {
            Ok(token) => {
                self.session.activate(token.clone());
                info!("analysis session established");
                Ok(token)
            }
            Err(err) => {
                self.session.invalidate();
                Err(err)
            }
        }
    }

    async fn perform_initialize(&self) -> ClientResult<String> {
        let mut params = Map::new();
        params.insert(
            "clientInfo".to_string(),
            json!({
                "name": "loupe-client",
                "version": env!("CARGO_PKG_VERSION"),
            }),
        );
        params.insert(
            "protocolVersion".to_string(),
            json!(loupe_protocol::PROTOCOL_VERSION),
        );

        let (id, body) = self.codec.encode(methods::INITIALIZE, params)?;
        let reply = {
            let transport = self.transport.lock().await;
            transport
                .send(body, None, self.config.timeouts.initialization)
                .await?
        };

        let envelope = self.codec.decode(&reply.body)?;
        if envelope.id() != id {
            return Err(ProtocolError::IdMismatch {
                expected: id,
                got: envelope.id(),
            }
            .into());
        }
        if let Err(rpc) = envelope.into_result() {
            return Err(ClientError::rpc(rpc));
        }

        reply
            .session_id
            .ok_or_else(|| SessionError::MissingToken.into())
    }

    async fn probe(&self, deadline: Duration) -> ClientResult<()> {
        self.attempt_call(methods::LIST_TOOLS, &Map::new(), deadline)
            .await
            .map(|_| ())
    }
}

/// Builder for [`LoupeClient`]
pub struct LoupeClientBuilder {
    port: Option<u16>,
    base_url: Option<String>,
    config: Option<ClientConfig>,
    transport: Option<BoxedTransport>,
}

impl LoupeClientBuilder {
    pub fn new() -> Self {
        Self {
            port: None,
            base_url: None,
            config: None,
            transport: None,
        }
    }

    /// Explicit server port; takes precedence over the environment fallback.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Full base-address override, e.g. `https://analysis.internal:9000`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Substitute the wire transport; used by tests to script exchanges.
    pub fn with_transport(mut self, transport: BoxedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> ClientResult<LoupeClient> {
        let had_config = self.config.is_some();
        let mut config = self.config.unwrap_or_default();

        if let Some(base_url) = self.base_url {
            config.endpoint.base_url = Some(base_url);
        }
        config.endpoint.port = match (self.port, had_config) {
            (Some(port), _) => port,
            (None, true) => config.endpoint.port,
            (None, false) => EndpointConfig::resolve_port(None),
        };

        let (transport, endpoint) = match self.transport {
            Some(transport) => {
                let endpoint = transport.endpoint().clone();
                (transport, endpoint)
            }
            None => {
                let endpoint = config.endpoint.url()?;
                let transport: BoxedTransport = Box::new(HttpTransport::new(endpoint.clone())?);
                (transport, endpoint)
            }
        };
        let port = endpoint
            .port_or_known_default()
            .unwrap_or(config.endpoint.port);

        let session = SessionManager::new(config.session.max_age);

        Ok(LoupeClient {
            transport: tokio::sync::Mutex::new(transport),
            codec: Codec::new(),
            session,
            metrics: MetricsCollector::new(),
            consecutive_failures: AtomicU32::new(0),
            endpoint,
            port,
            config,
        })
    }
}

impl Default for LoupeClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
