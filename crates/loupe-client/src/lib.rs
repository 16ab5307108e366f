//! # Loupe Client Library
//!
//! A resilient client for the loupe analysis server: a long-lived daemon
//! answering analysis requests over an HTTP request/response protocol. The
//! client keeps a continuity session alive across nominally stateless
//! requests, retries transient failures with exponential backoff, and
//! reports server liveness without disturbing callers.
//!
//! ## Features
//!
//! - **Session continuity**: automatic handshake, staleness detection, and
//!   re-initialization after server-side invalidation
//! - **Failure classification**: transient failures retry, permanent ones
//!   propagate immediately
//! - **Bounded retry**: exponential backoff that suspends only the calling
//!   task
//! - **Liveness probing**: independently time-bounded health checks that
//!   never raise
//! - **Metrics**: per-instance outcome counts, latency, and session resets
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use loupe_client::LoupeClient;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LoupeClient::builder().with_port(8650).build()?;
//!
//!     let references = client
//!         .call_tool("find_references", json!({"symbol": "parse_config"}))
//!         .await?;
//!     println!("{references}");
//!
//!     let health = client.health_check(None).await;
//!     println!("server healthy: {}", health.healthy);
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod metrics;
pub mod session;
pub mod transport;

// Re-export main types
pub use client::{HealthReport, LoupeClient, LoupeClientBuilder};
pub use config::{ClientConfig, EndpointConfig, RetryConfig, SessionConfig, TimeoutConfig};
pub use error::{ClientError, ClientResult};
pub use metrics::MetricsSnapshot;
pub use session::SessionState;

// Re-export transport types
pub use transport::{BoxedTransport, HttpTransport, Transport, TransportReply};

// Re-export the wire protocol for convenience
pub use loupe_protocol;
