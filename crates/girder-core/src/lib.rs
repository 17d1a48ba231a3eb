//! # Girder Core
//!
//! Shared types for the Girder service bootstrap layer:
//!
//! - [`ServiceDefinition`] - a named, discovered unit of request handling
//! - [`ServiceHandler`] - the type-erased dispatch seam owned by the
//!   external RPC transport library
//! - [`CallContext`] - per-call state carried through the interceptor chain
//!
//! This crate deliberately knows nothing about wire formats. Payloads are
//! opaque [`bytes::Bytes`] and call metadata is a flat string map; the real
//! request/response shapes belong to the transport collaborator.

#![doc(html_root_url = "https://docs.rs/girder-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod service;

pub use context::{CallContext, CallId};
pub use service::{
    BoxFuture, CallError, CallRequest, CallResponse, CallResult, FnService, ServiceDefinition,
    ServiceHandler,
};
