//! Per-call context.
//!
//! A [`CallContext`] is created for every inbound call and flows through the
//! interceptor chain into the handler. Interceptors enrich it (peer address,
//! deadline, type-erased extensions); handlers read it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use uuid::Uuid;

/// Unique identifier for one call.
///
/// Backed by a UUID v7 so identifiers sort roughly by creation time, which
/// keeps log correlation cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(Uuid);

impl CallId {
    /// Generates a fresh call ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Context that flows with one call through the interceptor chain.
///
/// # Example
///
/// ```
/// use girder_core::CallContext;
///
/// let mut ctx = CallContext::new("greeter.Greeter");
/// ctx.set_extension(42u32);
///
/// assert_eq!(ctx.service(), "greeter.Greeter");
/// assert_eq!(ctx.extension::<u32>(), Some(&42));
/// ```
#[derive(Debug)]
pub struct CallContext {
    call_id: CallId,
    service: String,
    peer: Option<SocketAddr>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl CallContext {
    /// Creates a context for a call to the named service.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            call_id: CallId::new(),
            service: service.into(),
            peer: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// Returns the call ID.
    #[must_use]
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Returns the target service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Returns the remote peer address, if the transport provided one.
    ///
    /// In-process calls have no peer.
    #[must_use]
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Sets the remote peer address. Called by the transport boundary.
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    /// Returns when this call started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Stores a typed extension value.
    ///
    /// One value per type; storing the same type again replaces it.
    pub fn set_extension<T: Any + Send + Sync>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a typed extension value.
    #[must_use]
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }
}
