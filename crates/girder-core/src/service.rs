//! Service definitions and the type-erased handler seam.
//!
//! A [`ServiceDefinition`] pairs a unique service name with an opaque
//! [`ServiceHandler`]. Definitions are produced once by a discoverer during
//! assembly and consumed by the server factory; they are immutable after
//! discovery.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::context::CallContext;

/// A boxed future, used throughout the call path.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result type for a single dispatched call.
pub type CallResult = Result<CallResponse, CallError>;

/// Errors surfaced on the per-call dispatch path.
///
/// These are call-scoped: they never affect the server lifecycle. Assembly
/// and lifecycle errors live in `girder-server`.
#[derive(Error, Debug)]
pub enum CallError {
    /// No service with the requested name is exposed on this server.
    #[error("service not found: {0}")]
    ServiceNotFound(String),

    /// The handler reported a failure.
    #[error("handler error: {message}")]
    Handler {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The call was interrupted by a forced shutdown.
    #[error("call cancelled by server shutdown")]
    Cancelled,

    /// The server is draining and no longer accepts new calls.
    #[error("server is shutting down, call rejected")]
    Unavailable,

    /// The server is at its configured concurrent-call limit.
    #[error("concurrent call limit reached")]
    ResourceExhausted,
}

impl CallError {
    /// Creates a handler error with a message.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a handler error wrapping a source error.
    pub fn handler_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Handler {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// An opaque inbound call.
///
/// The wire protocol is owned by the external transport library; by the
/// time a call reaches Girder it is a method name, an opaque payload, and
/// flat string metadata.
#[derive(Debug, Clone, Default)]
pub struct CallRequest {
    method: String,
    payload: Bytes,
    metadata: HashMap<String, String>,
}

impl CallRequest {
    /// Creates a request for the given method with an opaque payload.
    #[must_use]
    pub fn new(method: impl Into<String>, payload: Bytes) -> Self {
        Self {
            method: method.into(),
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the method name.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the opaque payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns a metadata value, if present.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// An opaque call response.
#[derive(Debug, Clone, Default)]
pub struct CallResponse {
    payload: Bytes,
    metadata: HashMap<String, String>,
}

impl CallResponse {
    /// Creates a response from an opaque payload.
    #[must_use]
    pub fn new(payload: Bytes) -> Self {
        Self {
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Attaches a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the opaque payload.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns a metadata value, if present.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// The type-erased request-dispatch seam.
///
/// Implementations are supplied by the discovery collaborator; the actual
/// call signature belongs to the external RPC library and is opaque to
/// Girder. Handlers must be safe for concurrent invocation: once the server
/// is running, every inbound call runs on its own task.
pub trait ServiceHandler: Send + Sync + 'static {
    /// Dispatches one call.
    fn call(&self, ctx: CallContext, request: CallRequest) -> BoxFuture<'static, CallResult>;
}

/// A function-based service handler.
///
/// Lets tests and small integrations use async closures directly instead of
/// implementing [`ServiceHandler`].
///
/// # Example
///
/// ```
/// use girder_core::{CallContext, CallRequest, CallResponse, CallResult, FnService};
///
/// let echo = FnService::new(|_ctx: CallContext, request: CallRequest| async move {
///     CallResult::Ok(CallResponse::new(request.payload().clone()))
/// });
/// ```
pub struct FnService<F> {
    func: F,
}

impl<F> FnService<F> {
    /// Wraps an async function as a service handler.
    pub const fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F, Fut> ServiceHandler for FnService<F>
where
    F: Fn(CallContext, CallRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    fn call(&self, ctx: CallContext, request: CallRequest) -> BoxFuture<'static, CallResult> {
        Box::pin((self.func)(ctx, request))
    }
}

/// A named, discovered unit of request-handling logic to expose on a server.
///
/// Names must be unique within a server; the factory rejects duplicates
/// before any server handle is built.
#[derive(Clone)]
pub struct ServiceDefinition {
    name: String,
    handler: Arc<dyn ServiceHandler>,
}

impl ServiceDefinition {
    /// Creates a definition from a name and a handler.
    #[must_use]
    pub fn new(name: impl Into<String>, handler: Arc<dyn ServiceHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
        }
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the handler reference.
    #[must_use]
    pub fn handler(&self) -> Arc<dyn ServiceHandler> {
        Arc::clone(&self.handler)
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
