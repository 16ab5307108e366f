//! Session state for the loupe client
//!
//! A session is an opaque continuity token plus its acquisition time, owned
//! exclusively by one client instance. Nothing here touches the network; the
//! initialize exchange itself lives in the client, which calls back into
//! this type to record the outcome.

use parking_lot::Mutex;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Observable session lifecycle state.
///
/// `Uninitialized → Initializing → Active → (Stale | Invalidated)`, and from
/// either of the last two back through `Initializing` on next access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Active,
    Stale,
    Invalidated,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::Active => "active",
            SessionState::Stale => "stale",
            SessionState::Invalidated => "invalidated",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug)]
struct SessionToken {
    value: String,
    acquired_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    token: Option<SessionToken>,
    initializing: bool,
    invalidated: bool,
}

/// Owns the session token and decides when a new handshake is required.
#[derive(Debug)]
pub struct SessionManager {
    inner: Mutex<Inner>,
    max_age: Duration,
}

impl SessionManager {
    pub fn new(max_age: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_age,
        }
    }

    /// The token, if one is held and still fresh. A token older than the
    /// staleness threshold reads as absent, which forces re-initialization
    /// on the caller's side.
    pub fn current(&self) -> Option<String> {
        let inner = self.inner.lock();
        inner
            .token
            .as_ref()
            .filter(|t| t.acquired_at.elapsed() <= self.max_age)
            .map(|t| t.value.clone())
    }

    pub fn state(&self) -> SessionState {
        let inner = self.inner.lock();
        if inner.initializing {
            return SessionState::Initializing;
        }
        match &inner.token {
            Some(t) if t.acquired_at.elapsed() <= self.max_age => SessionState::Active,
            Some(_) => SessionState::Stale,
            None if inner.invalidated => SessionState::Invalidated,
            None => SessionState::Uninitialized,
        }
    }

    /// Record that a handshake is in flight.
    pub fn mark_initializing(&self) {
        let mut inner = self.inner.lock();
        inner.initializing = true;
    }

    /// Store a freshly issued token and stamp its acquisition time.
    pub fn activate(&self, token: String) {
        let mut inner = self.inner.lock();
        debug!(
            token_prefix = token.get(..8).unwrap_or(token.as_str()),
            "session active"
        );
        inner.token = Some(SessionToken {
            value: token,
            acquired_at: Instant::now(),
        });
        inner.initializing = false;
        inner.invalidated = false;
    }

    /// Drop the token and its timestamp unconditionally. Idempotent.
    pub fn invalidate(&self) {
        let mut inner = self.inner.lock();
        if inner.token.is_some() || inner.initializing {
            debug!("session invalidated");
        }
        inner.token = None;
        inner.initializing = false;
        inner.invalidated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_states() {
        let session = SessionManager::new(Duration::from_secs(60));
        assert_eq!(session.state(), SessionState::Uninitialized);
        assert!(session.current().is_none());

        session.mark_initializing();
        assert_eq!(session.state(), SessionState::Initializing);

        session.activate("tok-1".to_string());
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.current().as_deref(), Some("tok-1"));

        session.invalidate();
        assert_eq!(session.state(), SessionState::Invalidated);
        assert!(session.current().is_none());
    }

    #[test]
    fn test_stale_token_reads_as_absent() {
        let session = SessionManager::new(Duration::ZERO);
        session.activate("tok-1".to_string());
        // Any measurable age exceeds a zero threshold.
        std::thread::sleep(Duration::from_millis(2));
        assert!(session.current().is_none());
        assert_eq!(session.state(), SessionState::Stale);
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let session = SessionManager::new(Duration::from_secs(60));
        session.activate("tok-1".to_string());
        session.invalidate();
        session.invalidate();
        assert_eq!(session.state(), SessionState::Invalidated);
    }

    #[test]
    fn test_reactivation_after_invalidate() {
        let session = SessionManager::new(Duration::from_secs(60));
        session.activate("tok-1".to_string());
        session.invalidate();
        session.mark_initializing();
        session.activate("tok-2".to_string());
        assert_eq!(session.current().as_deref(), Some("tok-2"));
        assert_eq!(session.state(), SessionState::Active);
    }
}
