//! Server configuration.
//!
//! [`ServerProperties`] carries the settings the factory needs to assemble a
//! server. It is a plain value built once during assembly; parsing these
//! values out of files or flags is the host application's job.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use girder_server::ServerProperties;
//!
//! let properties = ServerProperties::builder()
//!     .address("0.0.0.0:50051")
//!     .grace_period(Duration::from_secs(30))
//!     .build();
//!
//! assert_eq!(properties.address(), "0.0.0.0:50051");
//! ```

use std::net::SocketAddr;
use std::time::Duration;

/// Default bind address.
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:50051";

/// Default graceful shutdown grace period in seconds.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 30;

/// Settings consumed by the server factory.
#[derive(Debug, Clone)]
pub struct ServerProperties {
    /// Bind address, e.g. "0.0.0.0:50051".
    address: String,

    /// How long a graceful stop waits for in-flight calls.
    grace_period: Duration,

    /// Cap on concurrently executing calls (None = unlimited).
    max_concurrent_calls: Option<usize>,
}

impl ServerProperties {
    /// Creates a builder with default values.
    #[must_use]
    pub fn builder() -> ServerPropertiesBuilder {
        ServerPropertiesBuilder::default()
    }

    /// Returns the configured bind address.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid `host:port` pair.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.address.parse()
    }

    /// Returns the graceful shutdown grace period.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Returns the concurrent call cap, if configured.
    #[must_use]
    pub fn max_concurrent_calls(&self) -> Option<usize> {
        self.max_concurrent_calls
    }
}

impl Default for ServerProperties {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`ServerProperties`].
#[derive(Debug, Clone)]
pub struct ServerPropertiesBuilder {
    address: String,
    grace_period: Duration,
    max_concurrent_calls: Option<usize>,
}

impl ServerPropertiesBuilder {
    /// Creates a builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            grace_period: Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS),
            max_concurrent_calls: None,
        }
    }

    /// Sets the bind address.
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the graceful shutdown grace period.
    #[must_use]
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Caps the number of concurrently executing calls.
    #[must_use]
    pub fn max_concurrent_calls(mut self, max: Option<usize>) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    /// Builds the properties.
    #[must_use]
    pub fn build(self) -> ServerProperties {
        ServerProperties {
            address: self.address,
            grace_period: self.grace_period,
            max_concurrent_calls: self.max_concurrent_calls,
        }
    }
}

impl Default for ServerPropertiesBuilder {
    fn default() -> Self {
        Self::new()
    }
}
