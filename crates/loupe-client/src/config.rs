//! Configuration types for the loupe client

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{ClientError, ClientResult};

/// Port the analysis server listens on when nothing else is configured.
pub const DEFAULT_PORT: u16 = 8650;

/// Environment variable consulted when no explicit port is given.
pub const PORT_ENV_VAR: &str = "LOUPE_PORT";

/// Main client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    /// Where the analysis server lives
    pub endpoint: EndpointConfig,

    /// Timeout configurations
    pub timeouts: TimeoutConfig,

    /// Retry configurations
    pub retry: RetryConfig,

    /// Session lifetime configuration
    pub session: SessionConfig,
}

/// Endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Full base-address override. When set, host and port are ignored.
    pub base_url: Option<String>,
}

/// Timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-attempt timeout for ordinary requests
    #[serde(with = "duration_serde")]
    pub request: Duration,

    /// Session initialization timeout
    #[serde(with = "duration_serde")]
    pub initialization: Duration,

    /// Independent deadline for health probes, deliberately shorter than
    /// the request timeout so liveness checks stay fast on a degraded server
    #[serde(with = "duration_serde")]
    pub health_check: Duration,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Base interval for exponential backoff
    #[serde(with = "duration_serde")]
    pub backoff_base: Duration,

    /// Upper bound on any single backoff delay
    #[serde(with = "duration_serde")]
    pub max_delay: Duration,
}

/// Session lifetime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// A token older than this is treated as absent and re-acquired
    #[serde(with = "duration_serde")]
    pub max_age: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            base_url: None,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: Duration::from_secs(30),
            initialization: Duration::from_secs(15),
            health_check: Duration::from_secs(5),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(30 * 60),
        }
    }
}

impl EndpointConfig {
    /// Resolve the effective port: explicit value, then the `LOUPE_PORT`
    /// environment variable, then the fixed default.
    pub fn resolve_port(explicit: Option<u16>) -> u16 {
        explicit
            .or_else(|| {
                std::env::var(PORT_ENV_VAR)
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_PORT)
    }

    /// Full URL of the RPC endpoint.
    pub fn url(&self) -> ClientResult<Url> {
        let base = match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        };
        let endpoint = format!("{}{}", base, loupe_protocol::RPC_PATH);
        Url::parse(&endpoint)
            .map_err(|e| ClientError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))
    }
}

impl RetryConfig {
    /// Delay before attempt `attempt` (zero-indexed): nothing before the
    /// first attempt, then `backoff_base * 2^attempt` capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(attempt);
        let delay = self.backoff_base.saturating_mul(factor);
        delay.min(self.max_delay)
    }

    /// Total attempts per logical call.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

// Helper module for Duration serialization as milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
