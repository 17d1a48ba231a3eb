//! # Girder
//!
//! **Service bootstrap and lifecycle control for RPC-style servers**
//!
//! Girder assembles a server out of pluggable collaborators and drives it
//! through a predictable lifecycle:
//!
//! - **Discovery** - find the services to expose, explicitly or by scanning.
//! - **Interceptors** - a deterministically ordered cross-cutting chain.
//! - **Configurers** - open-ended hooks that tune the server builder.
//! - **Factory** - fail-fast assembly; no half-built servers.
//! - **Lifecycle** - a monotonic start/drain/stop state machine with
//!   per-service health reporting.
//!
//! The wire protocol is deliberately not part of Girder: a transport
//! integration implements [`server::WireProtocol`] and everything around
//! it (bootstrap, ordering, draining, health) comes from this crate.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use girder::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let echo = Arc::new(FnService::new(|_ctx, request| async move {
//!         Ok(CallResponse::new(request.payload().clone()))
//!     }));
//!     let discoverer = ManualServiceDiscoverer::new()
//!         .with_service(ServiceDefinition::new("echo.Echo", echo));
//!
//!     let factory = InProcessServerFactory::new(ServerProperties::default());
//!     let server = factory.create_server(&discoverer, &InterceptorRegistry::new(), &[])?;
//!
//!     let lifecycle = ServerLifecycle::new(server, HealthStatusManager::new());
//!     lifecycle.run(ShutdownSignal::with_os_signals()).await?;
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/girder/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use girder_core as core;

// Re-export interceptor types
pub use girder_interceptor as interceptor;

// Re-export server types
pub use girder_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use girder::prelude::*;
/// ```
pub mod prelude {
    pub use girder_core::{
        CallContext, CallError, CallId, CallRequest, CallResponse, CallResult, FnService,
        ServiceDefinition, ServiceHandler,
    };

    pub use girder_interceptor::{
        FnInterceptor, Interceptor, InterceptorConfigurer, InterceptorEntry, InterceptorRegistry,
        InterceptorScope, Next, TracingInterceptor,
    };

    pub use girder_server::{
        BuildError, Dispatcher, HealthStatusManager, InProcessServerFactory, LifecycleError,
        LifecycleState, ManualServiceDiscoverer, ScanServiceDiscoverer, Server, ServerConfigurer,
        ServerFactory, ServerLifecycle, ServerProperties, ServiceCandidate, ServiceDiscoverer,
        ServingStatus, ShutdownSignal, StopOutcome, TcpServerFactory, WireProtocol,
    };
}
