//! The assembled server and its call dispatch path.
//!
//! A [`Server`] is the inert product of the factory: the service table, the
//! sorted interceptor chain, codec names, and the transport binding, wired
//! together but not yet bound to a port. The lifecycle controller owns
//! starting and stopping it.
//!
//! [`Dispatcher`] is the per-call view of the server. It is cheap to clone
//! and handed to the wire protocol for every accepted connection; the wire
//! protocol decodes frames into [`CallRequest`]s and pushes them through
//! [`Dispatcher::dispatch`].

use std::net::SocketAddr;
use std::sync::Arc;

use girder_core::{BoxFuture, CallContext, CallError, CallRequest, CallResult, ServiceHandler};
use girder_interceptor::{Interceptor, InterceptorEntry, Next};
use indexmap::IndexMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::config::ServerProperties;
use crate::shutdown::{CallTracker, ShutdownSignal};

/// Connection-level protocol seam.
///
/// The actual wire format (framing, codecs, streaming) belongs to an
/// external transport library. Girder hands it an accepted stream and a
/// [`Dispatcher`]; the implementation decodes calls, dispatches them, and
/// encodes the results.
pub trait WireProtocol: Send + Sync + 'static {
    /// Short protocol name for logs.
    fn name(&self) -> &'static str;

    /// Serves one accepted connection to completion.
    fn serve_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        dispatcher: Dispatcher,
    ) -> BoxFuture<'static, std::io::Result<()>>;
}

/// How the server is exposed.
pub(crate) enum Binding {
    /// No listener; calls enter through [`Server::dispatcher`] directly.
    InProcess,
    /// TCP listener delegating connection handling to a wire protocol.
    Tcp { wire: Arc<dyn WireProtocol> },
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InProcess => f.write_str("InProcess"),
            Self::Tcp { wire } => f.debug_struct("Tcp").field("wire", &wire.name()).finish(),
        }
    }
}

/// Per-call entry point into the assembled server.
///
/// Holds shared, immutable views of the service table and interceptor
/// chain, so cloning is a handful of reference-count bumps.
#[derive(Clone)]
pub struct Dispatcher {
    services: Arc<IndexMap<String, Arc<dyn ServiceHandler>>>,
    interceptors: Arc<Vec<InterceptorEntry>>,
    tracker: CallTracker,
    drain: ShutdownSignal,
    force: ShutdownSignal,
    max_concurrent_calls: Option<usize>,
}

impl Dispatcher {
    /// Dispatches one call to the named service.
    ///
    /// The call runs through every interceptor whose scope covers the
    /// service, outermost (lowest order) first, then reaches the handler.
    ///
    /// # Errors
    ///
    /// - [`CallError::ServiceNotFound`] if no service has that name.
    /// - [`CallError::Unavailable`] once the server has begun draining.
    /// - [`CallError::ResourceExhausted`] if the concurrent-call cap is hit.
    /// - [`CallError::Cancelled`] if a forced shutdown interrupts the call.
    pub async fn dispatch(
        &self,
        service: &str,
        peer: Option<SocketAddr>,
        request: CallRequest,
    ) -> CallResult {
        if self.force.is_triggered() {
            return Err(CallError::Cancelled);
        }
        // A drain lets admitted calls finish but takes no new ones.
        if self.drain.is_triggered() {
            return Err(CallError::Unavailable);
        }

        let handler = self
            .services
            .get(service)
            .ok_or_else(|| CallError::ServiceNotFound(service.to_string()))?;

        // Held for the duration of the call so a graceful stop can wait.
        let _guard = match self.max_concurrent_calls {
            Some(max) => match self.tracker.try_track(max) {
                Some(guard) => guard,
                None => {
                    tracing::warn!(service, max, "concurrent call limit reached");
                    return Err(CallError::ResourceExhausted);
                }
            },
            None => self.tracker.track(),
        };

        let mut ctx = CallContext::new(service);
        if let Some(peer) = peer {
            ctx.set_peer(peer);
        }

        let covering: Vec<Arc<dyn Interceptor>> = self
            .interceptors
            .iter()
            .filter(|entry| entry.scope().covers(service))
            .map(InterceptorEntry::interceptor)
            .collect();
        let chain = Next::chain(covering.iter(), Arc::clone(handler));

        let mut force = self.force.recv();
        tokio::select! {
            biased;
            () = &mut force => Err(CallError::Cancelled),
            result = chain.run(ctx, request) => result,
        }
    }

    /// Returns the exposed service names, in registration order.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("interceptors", &self.interceptors.len())
            .field("max_concurrent_calls", &self.max_concurrent_calls)
            .finish()
    }
}

/// Outcome of starting the server's transport.
pub(crate) struct StartedTransport {
    /// Actual bound address; `None` for in-process servers.
    pub(crate) bound_addr: Option<SocketAddr>,
    /// Receives at most one fatal transport error. The channel closing
    /// without a value means the transport ended cleanly.
    pub(crate) failures: mpsc::Receiver<std::io::Error>,
}

/// An assembled, not-yet-started server.
///
/// Produced by a server factory; driven by the lifecycle controller. The
/// server itself holds no state machine: binding and draining are the
/// lifecycle's job.
pub struct Server {
    properties: ServerProperties,
    services: Arc<IndexMap<String, Arc<dyn ServiceHandler>>>,
    interceptors: Arc<Vec<InterceptorEntry>>,
    compressors: Vec<String>,
    decompressors: Vec<String>,
    binding: Binding,
    drain: ShutdownSignal,
    force: ShutdownSignal,
    tracker: CallTracker,
}

impl Server {
    pub(crate) fn new(
        properties: ServerProperties,
        services: IndexMap<String, Arc<dyn ServiceHandler>>,
        interceptors: Vec<InterceptorEntry>,
        compressors: Vec<String>,
        decompressors: Vec<String>,
        binding: Binding,
    ) -> Self {
        Self {
            properties,
            services: Arc::new(services),
            interceptors: Arc::new(interceptors),
            compressors,
            decompressors,
            binding,
            drain: ShutdownSignal::new(),
            force: ShutdownSignal::new(),
            tracker: CallTracker::new(),
        }
    }

    /// Returns the configuration this server was assembled with.
    #[must_use]
    pub fn properties(&self) -> &ServerProperties {
        &self.properties
    }

    /// Returns the exposed service names, in registration order.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }

    /// Returns the installed compression codec names.
    #[must_use]
    pub fn compressors(&self) -> &[String] {
        &self.compressors
    }

    /// Returns the installed decompression codec names.
    #[must_use]
    pub fn decompressors(&self) -> &[String] {
        &self.decompressors
    }

    /// Creates a per-call entry point into this server.
    ///
    /// For in-process servers this is the only way calls arrive.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            services: Arc::clone(&self.services),
            interceptors: Arc::clone(&self.interceptors),
            tracker: self.tracker.clone(),
            drain: self.drain.clone(),
            force: self.force.clone(),
            max_concurrent_calls: self.properties.max_concurrent_calls(),
        }
    }

    pub(crate) fn drain_signal(&self) -> ShutdownSignal {
        self.drain.clone()
    }

    pub(crate) fn force_signal(&self) -> ShutdownSignal {
        self.force.clone()
    }

    pub(crate) fn tracker(&self) -> CallTracker {
        self.tracker.clone()
    }

    /// Binds the transport and spawns the accept loop.
    ///
    /// In-process servers have no transport; they report no bound address
    /// and an immediately-closed failure channel.
    pub(crate) async fn start_transport(&self) -> std::io::Result<StartedTransport> {
        let (failure_tx, failures) = mpsc::channel(1);

        match &self.binding {
            Binding::InProcess => {
                drop(failure_tx);
                Ok(StartedTransport {
                    bound_addr: None,
                    failures,
                })
            }
            Binding::Tcp { wire } => {
                let addr = self
                    .properties
                    .socket_addr()
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
                let listener = TcpListener::bind(addr).await?;
                let bound_addr = listener.local_addr()?;
                tracing::info!(%bound_addr, protocol = wire.name(), "transport bound");

                tokio::spawn(accept_loop(
                    listener,
                    Arc::clone(wire),
                    self.dispatcher(),
                    self.drain.clone(),
                    failure_tx,
                ));

                Ok(StartedTransport {
                    bound_addr: Some(bound_addr),
                    failures,
                })
            }
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("interceptors", &self.interceptors.len())
            .field("binding", &self.binding)
            .finish_non_exhaustive()
    }
}

/// Accepts connections until the drain signal fires or a fatal error occurs.
async fn accept_loop(
    listener: TcpListener,
    wire: Arc<dyn WireProtocol>,
    dispatcher: Dispatcher,
    drain: ShutdownSignal,
    failure_tx: mpsc::Sender<std::io::Error>,
) {
    loop {
        tokio::select! {
            () = drain.recv() => {
                tracing::info!("accept loop draining, no longer taking connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let wire = Arc::clone(&wire);
                    let dispatcher = dispatcher.clone();
                    tokio::spawn(async move {
                        if let Err(error) = wire.serve_connection(stream, peer, dispatcher).await {
                            tracing::debug!(%peer, %error, "connection ended with error");
                        }
                    });
                }
                Err(error) if is_transient_accept_error(&error) => {
                    tracing::warn!(%error, "transient accept error");
                }
                Err(error) => {
                    tracing::error!(%error, "fatal accept error, stopping transport");
                    let _ = failure_tx.send(error).await;
                    break;
                }
            }
        }
    }
}

/// Per-connection hiccups that should not take the whole listener down.
fn is_transient_accept_error(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::WouldBlock
    )
}
