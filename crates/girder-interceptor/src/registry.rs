//! Ordered interceptor registry.
//!
//! The registry collects [`InterceptorEntry`] values during the
//! single-threaded assembly phase and hands the server factory a
//! deterministically ordered list. Entries are ordered by `(order,
//! registration sequence)`: lower `order` first, ties broken by insertion
//! order, never by name, so the effective chain is identical across
//! restarts.
//!
//! Registration is best-effort: duplicates are kept, deduplication is the
//! caller's responsibility.

use std::fmt;
use std::sync::Arc;

use crate::interceptor::Interceptor;

/// Default order assigned to entries that do not care about position.
pub const DEFAULT_ORDER: i32 = 0;

/// Where an interceptor applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorScope {
    /// Wraps every service call path on the server.
    Global,
    /// Wraps only calls to the named service.
    Service(String),
}

impl InterceptorScope {
    /// Returns whether this scope covers a call to `service`.
    #[must_use]
    pub fn covers(&self, service: &str) -> bool {
        match self {
            Self::Global => true,
            Self::Service(name) => name == service,
        }
    }
}

/// One registered interceptor with its ordering metadata.
#[derive(Clone)]
pub struct InterceptorEntry {
    interceptor: Arc<dyn Interceptor>,
    order: i32,
    scope: InterceptorScope,
    seq: usize,
}

impl InterceptorEntry {
    /// Creates a global entry with the given order. Lower order runs closer
    /// to the transport boundary: first inbound, last outbound.
    #[must_use]
    pub fn new(interceptor: Arc<dyn Interceptor>, order: i32) -> Self {
        Self {
            interceptor,
            order,
            scope: InterceptorScope::Global,
            seq: 0,
        }
    }

    /// Creates a global entry with [`DEFAULT_ORDER`].
    #[must_use]
    pub fn global(interceptor: Arc<dyn Interceptor>) -> Self {
        Self::new(interceptor, DEFAULT_ORDER)
    }

    /// Restricts this entry to a single service.
    #[must_use]
    pub fn for_service(mut self, service: impl Into<String>) -> Self {
        self.scope = InterceptorScope::Service(service.into());
        self
    }

    /// Returns the interceptor.
    #[must_use]
    pub fn interceptor(&self) -> Arc<dyn Interceptor> {
        Arc::clone(&self.interceptor)
    }

    /// Returns the order value.
    #[must_use]
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Returns the scope.
    #[must_use]
    pub fn scope(&self) -> &InterceptorScope {
        &self.scope
    }

    /// Returns the registration sequence number assigned by the registry.
    #[must_use]
    pub fn seq(&self) -> usize {
        self.seq
    }
}

impl fmt::Debug for InterceptorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorEntry")
            .field("name", &self.interceptor.name())
            .field("order", &self.order)
            .field("scope", &self.scope)
            .field("seq", &self.seq)
            .finish()
    }
}

/// A contribution hook that adds interceptors to the registry.
///
/// This is the discovery-side counterpart to direct [`register`] calls:
/// optional collaborators (a tracing integration, a security module) expose
/// a configurer, and the assembly root merges all contributions with
/// [`InterceptorRegistry::apply_configurers`].
///
/// [`register`]: InterceptorRegistry::register
pub trait InterceptorConfigurer: Send + Sync {
    /// Adds this collaborator's interceptors to the registry.
    fn configure(&self, registry: &mut InterceptorRegistry);
}

impl<F> InterceptorConfigurer for F
where
    F: Fn(&mut InterceptorRegistry) + Send + Sync,
{
    fn configure(&self, registry: &mut InterceptorRegistry) {
        self(registry);
    }
}

/// Ordered collection of interceptor entries.
///
/// One registry instance is owned by the assembly root and passed by
/// reference into the server factory; it is deliberately not shared through
/// any global lookup. It is also not synchronized: registration happens
/// once, on the assembly thread, before any request traffic exists.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use girder_interceptor::{InterceptorEntry, InterceptorRegistry, TracingInterceptor};
///
/// let mut registry = InterceptorRegistry::new();
/// registry.register(InterceptorEntry::new(Arc::new(TracingInterceptor::new()), 10));
/// assert_eq!(registry.len(), 1);
/// ```
#[derive(Default)]
pub struct InterceptorRegistry {
    entries: Vec<InterceptorEntry>,
    next_seq: usize,
}

impl InterceptorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    ///
    /// Duplicate entries are kept; deduplication is the caller's
    /// responsibility.
    pub fn register(&mut self, mut entry: InterceptorEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        tracing::debug!(
            interceptor = entry.interceptor.name(),
            order = entry.order,
            "registered interceptor"
        );
        self.entries.push(entry);
    }

    /// Bulk-appends entries, preserving the caller-given relative order.
    pub fn add_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = InterceptorEntry>,
    {
        for entry in entries {
            self.register(entry);
        }
    }

    /// Merges contributions from configurer hooks, in provider order.
    pub fn apply_configurers<'c, I>(&mut self, configurers: I)
    where
        I: IntoIterator<Item = &'c dyn InterceptorConfigurer>,
    {
        for configurer in configurers {
            configurer.configure(self);
        }
    }

    /// Returns the entries ordered by `(order, registration sequence)`.
    ///
    /// The sort is stable: entries with equal order keep their insertion
    /// order.
    #[must_use]
    pub fn sorted(&self) -> Vec<InterceptorEntry> {
        let mut entries = self.entries.clone();
        entries.sort_by_key(|entry| (entry.order, entry.seq));
        entries
    }

    /// Returns the number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorRegistry")
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::{BoxFuture, CallContext, CallRequest, CallResult};

    use crate::interceptor::Next;

    struct Named(&'static str);

    impl Interceptor for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn call(
            &self,
            ctx: CallContext,
            request: CallRequest,
            next: Next,
        ) -> BoxFuture<'static, CallResult> {
            Box::pin(async move { next.run(ctx, request).await })
        }
    }

    fn entry(name: &'static str, order: i32) -> InterceptorEntry {
        InterceptorEntry::new(Arc::new(Named(name)), order)
    }

    fn names(entries: &[InterceptorEntry]) -> Vec<&'static str> {
        entries.iter().map(|e| e.interceptor.name()).collect()
    }

    #[test]
    fn sorted_orders_by_order_then_registration() {
        let mut registry = InterceptorRegistry::new();
        registry.register(entry("a5", 5));
        registry.register(entry("a1", 1));
        registry.register(entry("b5", 5));
        registry.register(entry("a2", 2));

        let sorted = registry.sorted();
        assert_eq!(names(&sorted), vec!["a1", "a2", "a5", "b5"]);
    }

    #[test]
    fn sorted_is_stable_across_repeated_calls() {
        let mut registry = InterceptorRegistry::new();
        registry.register(entry("first", 0));
        registry.register(entry("second", 0));
        registry.register(entry("third", 0));

        for _ in 0..3 {
            assert_eq!(names(&registry.sorted()), vec!["first", "second", "third"]);
        }
    }

    #[test]
    fn add_all_preserves_relative_order() {
        let mut registry = InterceptorRegistry::new();
        registry.add_all(vec![entry("x", 3), entry("y", 3), entry("z", 1)]);

        assert_eq!(names(&registry.sorted()), vec!["z", "x", "y"]);
    }

    #[test]
    fn duplicates_are_kept() {
        let shared: Arc<dyn Interceptor> = Arc::new(Named("dup"));

        let mut registry = InterceptorRegistry::new();
        registry.register(InterceptorEntry::new(Arc::clone(&shared), 0));
        registry.register(InterceptorEntry::new(shared, 0));

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn configurers_merge_after_direct_registrations() {
        let mut registry = InterceptorRegistry::new();
        registry.register(entry("direct", 0));

        let contribute = |registry: &mut InterceptorRegistry| {
            registry.register(entry("contributed", 0));
        };
        registry.apply_configurers([&contribute as &dyn InterceptorConfigurer]);

        assert_eq!(names(&registry.sorted()), vec!["direct", "contributed"]);
    }

    #[test]
    fn scope_covers() {
        assert!(InterceptorScope::Global.covers("anything"));
        assert!(InterceptorScope::Service("a".into()).covers("a"));
        assert!(!InterceptorScope::Service("a".into()).covers("b"));
    }

    #[test]
    fn service_scoped_entry() {
        let scoped = entry("auth", 0).for_service("billing.Billing");
        assert!(scoped.scope().covers("billing.Billing"));
        assert!(!scoped.scope().covers("greeter.Greeter"));
    }
}
