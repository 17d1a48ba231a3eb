//! Built-in tracing interceptor.
//!
//! Opens a `tracing` span per call carrying the call ID and service name,
//! and records the outcome on the way out. Register it globally with a low
//! order so the span covers the rest of the chain.

use girder_core::{BoxFuture, CallContext, CallRequest, CallResult};
use tracing::Instrument;

use crate::interceptor::{Interceptor, Next};

/// Interceptor that wraps every call in a `tracing` span.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use girder_interceptor::{InterceptorEntry, InterceptorRegistry, TracingInterceptor};
///
/// let mut registry = InterceptorRegistry::new();
/// registry.register(InterceptorEntry::new(Arc::new(TracingInterceptor::new()), -100));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingInterceptor {
    _private: (),
}

impl TracingInterceptor {
    /// Creates the interceptor.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Interceptor for TracingInterceptor {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn call(
        &self,
        ctx: CallContext,
        request: CallRequest,
        next: Next,
    ) -> BoxFuture<'static, CallResult> {
        let span = tracing::info_span!(
            "call",
            call_id = %ctx.call_id(),
            service = %ctx.service(),
            method = %request.method(),
        );

        Box::pin(
            async move {
                let result = next.run(ctx, request).await;
                match &result {
                    Ok(_) => tracing::debug!("call completed"),
                    Err(error) => tracing::warn!(%error, "call failed"),
                }
                result
            }
            .instrument(span),
        )
    }
}
