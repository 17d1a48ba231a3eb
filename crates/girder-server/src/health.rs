//! Per-service health status.
//!
//! [`HealthStatusManager`] keeps one [`ServingStatus`] per service name. The
//! lifecycle drives it: services flip to `Serving` when the server reaches
//! running, and to `NotServing` before a stop begins so load balancers stop
//! routing ahead of the drain.
//!
//! Querying a name that was never set answers [`ServingStatus::Unknown`]
//! rather than failing; absence of information is itself a status.
//!
//! # Example
//!
//! ```
//! use girder_server::{HealthStatusManager, ServingStatus};
//!
//! let health = HealthStatusManager::new();
//! assert_eq!(health.status("echo.Echo"), ServingStatus::Unknown);
//!
//! health.set_status("echo.Echo", ServingStatus::Serving);
//! assert_eq!(health.status("echo.Echo"), ServingStatus::Serving);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Health state of a single service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServingStatus {
    /// No status has been reported for the service.
    Unknown,
    /// The service is accepting calls.
    Serving,
    /// The service is registered but not accepting calls.
    NotServing,
}

impl ServingStatus {
    /// Returns `true` for [`ServingStatus::Serving`].
    #[must_use]
    pub fn is_serving(self) -> bool {
        matches!(self, Self::Serving)
    }
}

impl std::fmt::Display for ServingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Unknown => "UNKNOWN",
            Self::Serving => "SERVING",
            Self::NotServing => "NOT_SERVING",
        };
        f.write_str(label)
    }
}

/// Thread-safe registry of per-service health.
///
/// Clones share the same underlying table, so the lifecycle and a health
/// endpoint can hold the same manager.
#[derive(Debug, Clone, Default)]
pub struct HealthStatusManager {
    statuses: Arc<RwLock<HashMap<String, ServingStatus>>>,
}

impl HealthStatusManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the status of a service.
    pub fn set_status(&self, service: impl Into<String>, status: ServingStatus) {
        let service = service.into();
        tracing::debug!(service = %service, %status, "health status changed");
        self.statuses.write().insert(service, status);
    }

    /// Returns the status of a service, or `Unknown` if never reported.
    #[must_use]
    pub fn status(&self, service: &str) -> ServingStatus {
        self.statuses
            .read()
            .get(service)
            .copied()
            .unwrap_or(ServingStatus::Unknown)
    }

    /// Sets every known service to the given status.
    pub fn set_all(&self, status: ServingStatus) {
        let mut statuses = self.statuses.write();
        for value in statuses.values_mut() {
            *value = status;
        }
    }

    /// Returns a point-in-time copy of all known statuses.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, ServingStatus> {
        self.statuses.read().clone()
    }
}
