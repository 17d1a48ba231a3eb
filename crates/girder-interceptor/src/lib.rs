//! # Girder Interceptor
//!
//! Composable call wrappers for cross-cutting concerns (tracing, security,
//! compression negotiation) and the ordered registry that assembles them
//! into a deterministic chain.
//!
//! Interceptors wrap the request-dispatch path of every service exposed on
//! a server. Ordering is controlled by an explicit `order` value: lower
//! order means closer to the transport boundary: first on the inbound
//! path, last on the outbound path. Entries with equal order keep their
//! registration order, never an arbitrary one, so the effective chain is
//! identical across restarts.

#![doc(html_root_url = "https://docs.rs/girder-interceptor/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod interceptor;
pub mod registry;
pub mod trace;

pub use interceptor::{FnInterceptor, Interceptor, Next};
pub use registry::{InterceptorConfigurer, InterceptorEntry, InterceptorRegistry, InterceptorScope};
pub use trace::TracingInterceptor;
