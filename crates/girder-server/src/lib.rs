//! Server assembly and lifecycle control for Girder.
//!
//! This crate wires the bootstrap collaborators together:
//!
//! - [`ServerProperties`] - configuration consumed at assembly time.
//! - [`ServiceDiscoverer`] - produces the services to expose.
//! - [`ServerConfigurer`] - open-ended hooks that tune the builder.
//! - [`ServerFactory`] - fail-fast assembly into an inert [`Server`].
//! - [`ServerLifecycle`] - the start/drain/stop state machine.
//! - [`HealthStatusManager`] - per-service health driven by the lifecycle.
//!
//! The wire protocol itself is an injected collaborator (see
//! [`WireProtocol`]); this crate owns everything around it.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use girder_core::{CallContext, CallRequest, CallResponse, FnService, ServiceDefinition};
//! use girder_interceptor::InterceptorRegistry;
//! use girder_server::{
//!     HealthStatusManager, InProcessServerFactory, ManualServiceDiscoverer, ServerFactory,
//!     ServerLifecycle, ServerProperties,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let echo = Arc::new(FnService::new(|_ctx: CallContext, request: CallRequest| async move {
//!     girder_core::CallResult::Ok(CallResponse::new(request.payload().clone()))
//! }));
//! let discoverer = ManualServiceDiscoverer::new()
//!     .with_service(ServiceDefinition::new("echo.Echo", echo));
//!
//! let factory = InProcessServerFactory::new(ServerProperties::default());
//! let server = factory.create_server(&discoverer, &InterceptorRegistry::new(), &[])?;
//!
//! let lifecycle = ServerLifecycle::new(server, HealthStatusManager::new());
//! lifecycle.start().await?;
//! lifecycle.stop(Duration::from_secs(5)).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod configurer;
pub mod discover;
pub mod factory;
pub mod health;
pub mod lifecycle;
pub mod server;
pub mod shutdown;

pub use config::{ServerProperties, ServerPropertiesBuilder, DEFAULT_ADDRESS, DEFAULT_GRACE_PERIOD_SECS};
pub use configurer::{
    call_limit_configurer, compression_configurer, decompression_configurer, server_configurer,
    ConfigurerError, ServerConfigurer,
};
pub use discover::{
    DiscoveryError, ManualServiceDiscoverer, ScanServiceDiscoverer, ServiceCandidate,
    ServiceDiscoverer,
};
pub use factory::{
    BuildError, InProcessServerFactory, ServerBuilder, ServerFactory, TcpServerFactory,
};
pub use health::{HealthStatusManager, ServingStatus};
pub use lifecycle::{LifecycleError, LifecycleState, ServerLifecycle, StopOutcome};
pub use server::{Dispatcher, Server, WireProtocol};
pub use shutdown::{CallGuard, CallTracker, ShutdownReceiver, ShutdownSignal};
