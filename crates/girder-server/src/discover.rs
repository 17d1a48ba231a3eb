//! Service discovery strategies.
//!
//! A [`ServiceDiscoverer`] produces the snapshot of services a server will
//! expose. Discovery runs exactly once, at assembly time, and returns a
//! finite list, never a lazy stream.
//!
//! Two strategies ship with Girder:
//!
//! - [`ManualServiceDiscoverer`] - an explicitly constructed list, for hosts
//!   that register services by hand.
//! - [`ScanServiceDiscoverer`] - inspects a provided set of candidates and
//!   extracts `(name, handler)` pairs from their declared metadata, failing
//!   if a candidate cannot resolve a name.

use std::sync::Arc;

use girder_core::{ServiceDefinition, ServiceHandler};
use thiserror::Error;

/// Errors produced while discovering services.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// A scan candidate did not declare a service name.
    #[error("scan candidate at position {position} has no resolvable service name")]
    UnresolvedName {
        /// Zero-based position of the candidate in the scanned set.
        position: usize,
    },
}

/// Produces the set of services to expose on a server.
///
/// Implementations are polymorphic over the discovery strategy; the factory
/// only sees the resulting snapshot.
pub trait ServiceDiscoverer: Send + Sync {
    /// Returns the discovered services.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscoveryError`] if any unit cannot be resolved into a
    /// named definition. Errors are returned, never deferred to call time.
    fn find_services(&self) -> Result<Vec<ServiceDefinition>, DiscoveryError>;
}

/// Explicit, pre-populated discovery.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use girder_core::{CallContext, CallRequest, CallResponse, FnService, ServiceDefinition};
/// use girder_server::{ManualServiceDiscoverer, ServiceDiscoverer};
///
/// let echo = Arc::new(FnService::new(|_ctx: CallContext, request: CallRequest| async move {
///     girder_core::CallResult::Ok(CallResponse::new(request.payload().clone()))
/// }));
///
/// let discoverer = ManualServiceDiscoverer::new()
///     .with_service(ServiceDefinition::new("echo.Echo", echo));
///
/// assert_eq!(discoverer.find_services().unwrap().len(), 1);
/// ```
#[derive(Default)]
pub struct ManualServiceDiscoverer {
    services: Vec<ServiceDefinition>,
}

impl ManualServiceDiscoverer {
    /// Creates an empty discoverer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service definition.
    #[must_use]
    pub fn with_service(mut self, definition: ServiceDefinition) -> Self {
        self.services.push(definition);
        self
    }
}

impl ServiceDiscoverer for ManualServiceDiscoverer {
    fn find_services(&self) -> Result<Vec<ServiceDefinition>, DiscoveryError> {
        Ok(self.services.clone())
    }
}

/// A unit eligible for scan-based discovery.
///
/// Candidates declare their service name as metadata; the scanner extracts
/// it. A candidate returning `None` is a configuration mistake and fails
/// the scan.
pub trait ServiceCandidate: Send + Sync {
    /// The declared service name, if any.
    fn service_name(&self) -> Option<&str>;

    /// The request handler to expose under the declared name.
    fn handler(&self) -> Arc<dyn ServiceHandler>;
}

/// Scan-based discovery over a provided candidate set.
///
/// The scan preserves candidate order and takes a one-shot snapshot; later
/// mutation of candidate state is not observed.
#[derive(Default)]
pub struct ScanServiceDiscoverer {
    candidates: Vec<Arc<dyn ServiceCandidate>>,
}

impl ScanServiceDiscoverer {
    /// Creates an empty scanner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate to scan.
    #[must_use]
    pub fn with_candidate(mut self, candidate: Arc<dyn ServiceCandidate>) -> Self {
        self.candidates.push(candidate);
        self
    }
}

impl ServiceDiscoverer for ScanServiceDiscoverer {
    fn find_services(&self) -> Result<Vec<ServiceDefinition>, DiscoveryError> {
        let mut services = Vec::with_capacity(self.candidates.len());
        for (position, candidate) in self.candidates.iter().enumerate() {
            let name = candidate
                .service_name()
                .ok_or(DiscoveryError::UnresolvedName { position })?;
            tracing::debug!(service = name, "discovered service");
            services.push(ServiceDefinition::new(name, candidate.handler()));
        }
        Ok(services)
    }
}
