//! Wire protocol for the loupe analysis server.
//!
//! The server speaks a small JSON request/response protocol over HTTP POST.
//! This crate holds the envelope types and the constants shared between the
//! client and any tooling that inspects the wire format. It performs no I/O.

pub mod envelope;
pub mod error;

pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use error::RpcErrorObject;

/// Protocol version carried in every request envelope.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Request header carrying the protocol version.
pub const VERSION_HEADER: &str = "loupe-protocol-version";

/// Header carrying the opaque session token. The server sets it on the
/// initialize response; the client echoes it on every subsequent request
/// until the session is invalidated.
pub const SESSION_HEADER: &str = "loupe-session-id";

/// Endpoint path requests are POSTed to.
pub const RPC_PATH: &str = "/rpc";

/// Method names understood by the analysis server.
pub mod methods {
    /// Session handshake; must precede any other method.
    pub const INITIALIZE: &str = "initialize";
    /// Capability listing; also used as the liveness probe.
    pub const LIST_TOOLS: &str = "tools/list";
    /// Invoke a named analysis tool.
    pub const CALL_TOOL: &str = "tools/call";
}
