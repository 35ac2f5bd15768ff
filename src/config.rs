//! Connection and pool configuration.
//!
//! [`Options`] configures one dialed connection (endpoint, timeouts,
//! keepalive, credentials); [`PoolOptions`] bounds the pool that owns those
//! connections.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use gremlin_ws::{Options, PoolOptions};
//!
//! let options = Options::new("ws://127.0.0.1:8182/gremlin")
//!     .with_timeout(Duration::from_secs(5))
//!     .with_auth("neptune", "s3cret");
//!
//! let pool_options = PoolOptions::new()
//!     .with_max_open(8)
//!     .with_max_lifetime(Duration::from_secs(300));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default dial timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default keepalive ping interval.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Default per-write deadline.
const DEFAULT_WRITING_WAIT: Duration = Duration::from_secs(15);

/// Default per-read deadline.
const DEFAULT_READING_WAIT: Duration = Duration::from_secs(15);

// ============================================================================
// Credentials
// ============================================================================

/// SASL PLAIN credentials for a server that challenges with status 407.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account secret.
    pub password: String,
}

// ============================================================================
// Options
// ============================================================================

/// Per-connection dial configuration.
#[derive(Debug, Clone)]
pub struct Options {
    /// WebSocket endpoint, e.g. `ws://host:8182/gremlin`.
    pub url: String,

    /// Dial timeout.
    pub timeout: Duration,

    /// Keepalive ping interval.
    pub ping_interval: Duration,

    /// Deadline applied to each write operation.
    pub writing_wait: Duration,

    /// Deadline applied to each read operation.
    pub reading_wait: Duration,

    /// SASL PLAIN credentials, if the server requires authentication.
    pub credentials: Option<Credentials>,
}

impl Options {
    /// Creates options for the given endpoint with default timeouts.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            writing_wait: DEFAULT_WRITING_WAIT,
            reading_wait: DEFAULT_READING_WAIT,
            credentials: None,
        }
    }

    /// Sets the dial timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the keepalive ping interval.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the per-write deadline.
    #[inline]
    #[must_use]
    pub fn with_writing_wait(mut self, wait: Duration) -> Self {
        self.writing_wait = wait;
        self
    }

    /// Sets the per-read deadline.
    #[inline]
    #[must_use]
    pub fn with_reading_wait(mut self, wait: Duration) -> Self {
        self.reading_wait = wait;
        self
    }

    /// Sets SASL PLAIN credentials.
    #[inline]
    #[must_use]
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

// ============================================================================
// PoolOptions
// ============================================================================

/// Pool sizing and eviction configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum total connections, idle and in-use. Zero means unlimited.
    pub max_open: usize,

    /// Maximum idle age before eviction. Zero means never evict.
    pub max_lifetime: Duration,
}

impl PoolOptions {
    /// Creates pool options with no cap and no eviction.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_open: 0,
            max_lifetime: Duration::ZERO,
        }
    }

    /// Caps the total number of connections.
    #[inline]
    #[must_use]
    pub const fn with_max_open(mut self, max_open: usize) -> Self {
        self.max_open = max_open;
        self
    }

    /// Evicts idle connections older than `max_lifetime`.
    #[inline]
    #[must_use]
    pub const fn with_max_lifetime(mut self, max_lifetime: Duration) -> Self {
        self.max_lifetime = max_lifetime;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
