//! Core interceptor trait and chain types.
//!
//! An [`Interceptor`] receives the call context, the request, and a [`Next`]
//! continuation for the rest of the chain. It may enrich the context,
//! rewrite the request or response, or short-circuit by returning without
//! calling `next`.
//!
//! Context and request move through the chain by value: an interceptor owns
//! them until it hands them to `next.run()`. Anything it needs afterwards
//! (call ID, service name, timings) must be captured before the hand-off.
//!
//! # Invariants
//!
//! - An interceptor can call `next.run()` at most once; `Next` is consumed
//!   by value, so the compiler enforces this.
//! - Interceptors must be safe for concurrent invocation: once the server
//!   is running, every call executes the chain on its own task.
//!
//! # Example
//!
//! ```
//! use girder_core::{BoxFuture, CallContext, CallError, CallRequest, CallResult};
//! use girder_interceptor::{Interceptor, Next};
//!
//! struct DenyAnonymous;
//!
//! impl Interceptor for DenyAnonymous {
//!     fn name(&self) -> &'static str {
//!         "deny_anonymous"
//!     }
//!
//!     fn call(
//!         &self,
//!         ctx: CallContext,
//!         request: CallRequest,
//!         next: Next,
//!     ) -> BoxFuture<'static, CallResult> {
//!         Box::pin(async move {
//!             if request.metadata("authorization").is_none() {
//!                 return Err(CallError::handler("missing credentials"));
//!             }
//!             next.run(ctx, request).await
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use girder_core::{BoxFuture, CallContext, CallRequest, CallResult, ServiceHandler};

/// A composable wrapper around request dispatch.
pub trait Interceptor: Send + Sync + 'static {
    /// Returns the name of this interceptor, used for logging and debugging.
    fn name(&self) -> &'static str;

    /// Processes one call, invoking `next` to continue the chain.
    fn call(&self, ctx: CallContext, request: CallRequest, next: Next)
        -> BoxFuture<'static, CallResult>;
}

/// Continuation for the remainder of the interceptor chain.
///
/// Consumed by value so it can be invoked at most once. A `Next` is built
/// per call from shared interceptor references, so construction is cheap.
pub struct Next {
    inner: NextInner,
}

enum NextInner {
    Chain {
        interceptor: Arc<dyn Interceptor>,
        next: Box<Next>,
    },
    Handler(Arc<dyn ServiceHandler>),
}

impl Next {
    /// Creates a `Next` that invokes the given interceptor before the rest
    /// of the chain.
    #[must_use]
    pub fn new(interceptor: Arc<dyn Interceptor>, next: Next) -> Self {
        Self {
            inner: NextInner::Chain {
                interceptor,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal `Next` that invokes the service handler.
    #[must_use]
    pub fn handler(handler: Arc<dyn ServiceHandler>) -> Self {
        Self {
            inner: NextInner::Handler(handler),
        }
    }

    /// Builds the full chain for one call.
    ///
    /// Interceptors are applied so that the first element of `interceptors`
    /// is outermost: first on the inbound path, last on the outbound path.
    #[must_use]
    pub fn chain<'i, I>(interceptors: I, handler: Arc<dyn ServiceHandler>) -> Self
    where
        I: IntoIterator<Item = &'i Arc<dyn Interceptor>>,
        I::IntoIter: DoubleEndedIterator,
    {
        let mut next = Self::handler(handler);
        for interceptor in interceptors.into_iter().rev() {
            next = Self::new(Arc::clone(interceptor), next);
        }
        next
    }

    /// Invokes the next interceptor or the handler.
    pub async fn run(self, ctx: CallContext, request: CallRequest) -> CallResult {
        match self.inner {
            NextInner::Chain { interceptor, next } => interceptor.call(ctx, request, *next).await,
            NextInner::Handler(handler) => handler.call(ctx, request).await,
        }
    }
}

/// An interceptor built from an async function.
///
/// # Example
///
/// ```
/// use girder_core::{CallContext, CallRequest};
/// use girder_interceptor::{FnInterceptor, Next};
///
/// let timing = FnInterceptor::new("timing", |ctx: CallContext, request: CallRequest, next: Next| async move {
///     let started = std::time::Instant::now();
///     let result = next.run(ctx, request).await;
///     tracing::debug!(elapsed = ?started.elapsed(), "call finished");
///     result
/// });
/// ```
pub struct FnInterceptor<F> {
    name: &'static str,
    func: F,
}

impl<F> FnInterceptor<F> {
    /// Creates a function-based interceptor.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F, Fut> Interceptor for FnInterceptor<F>
where
    F: Fn(CallContext, CallRequest, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CallResult> + Send + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn call(
        &self,
        ctx: CallContext,
        request: CallRequest,
        next: Next,
    ) -> BoxFuture<'static, CallResult> {
        Box::pin((self.func)(ctx, request, next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use girder_core::{CallError, CallResponse, FnService};

    struct TagInterceptor {
        name: &'static str,
    }

    impl Interceptor for TagInterceptor {
        fn name(&self) -> &'static str {
            self.name
        }

        fn call(
            &self,
            ctx: CallContext,
            request: CallRequest,
            next: Next,
        ) -> BoxFuture<'static, CallResult> {
            let name = self.name;
            Box::pin(async move {
                let response = next.run(ctx, request).await?;
                Ok(response.with_metadata("visited", name))
            })
        }
    }

    fn ok_handler() -> Arc<dyn ServiceHandler> {
        Arc::new(FnService::new(|_ctx, _request| async {
            Ok(CallResponse::new(Bytes::from_static(b"ok")))
        }))
    }

    #[tokio::test]
    async fn terminal_next_runs_handler() {
        let next = Next::handler(ok_handler());
        let result = next
            .run(CallContext::new("svc"), CallRequest::default())
            .await;
        assert_eq!(result.unwrap().payload().as_ref(), b"ok");
    }

    #[tokio::test]
    async fn chain_wraps_outermost_first() {
        let outer: Arc<dyn Interceptor> = Arc::new(TagInterceptor { name: "outer" });
        let inner: Arc<dyn Interceptor> = Arc::new(TagInterceptor { name: "inner" });

        let chain = Next::chain([&outer, &inner], ok_handler());
        let response = chain
            .run(CallContext::new("svc"), CallRequest::default())
            .await
            .unwrap();

        // The outer interceptor rewrites metadata last, on the way out.
        assert_eq!(response.metadata("visited"), Some("outer"));
    }

    #[tokio::test]
    async fn interceptor_can_short_circuit() {
        struct Reject;

        impl Interceptor for Reject {
            fn name(&self) -> &'static str {
                "reject"
            }

            fn call(
                &self,
                _ctx: CallContext,
                _request: CallRequest,
                _next: Next,
            ) -> BoxFuture<'static, CallResult> {
                Box::pin(async { Err(CallError::handler("rejected")) })
            }
        }

        let reject: Arc<dyn Interceptor> = Arc::new(Reject);
        let chain = Next::chain([&reject], ok_handler());

        let result = chain
            .run(CallContext::new("svc"), CallRequest::default())
            .await;
        assert!(matches!(result, Err(CallError::Handler { .. })));
    }

    #[tokio::test]
    async fn fn_interceptor_runs() {
        let mark = FnInterceptor::new("mark", |mut ctx: CallContext, request, next: Next| async move {
            ctx.set_extension("marked".to_string());
            next.run(ctx, request).await
        });
        assert_eq!(mark.name(), "mark");

        let mark: Arc<dyn Interceptor> = Arc::new(mark);
        let saw_extension: Arc<dyn ServiceHandler> = Arc::new(FnService::new(|ctx: CallContext, _request| async move {
            match ctx.extension::<String>().map(String::as_str) {
                Some("marked") => Ok(CallResponse::default()),
                _ => Err(CallError::handler("extension missing")),
            }
        }));

        let chain = Next::chain([&mark], saw_extension);
        let result = chain
            .run(CallContext::new("svc"), CallRequest::default())
            .await;
        assert!(result.is_ok());
    }
}
