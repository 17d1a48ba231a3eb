//! Server lifecycle control.
//!
//! [`ServerLifecycle`] owns an assembled [`Server`] and drives it through a
//! monotonic state machine:
//!
//! ```text
//! New -> Starting -> Running -> Stopping -> Terminated
//!           \            \
//!            \            +--> Failed (transport error)
//!             +--> Failed (bind error)
//! ```
//!
//! States never move backwards and a lifecycle is single-use: once
//! `Terminated` or `Failed`, the instance is spent. Health status follows
//! the state: services flip to `Serving` when the server reaches running,
//! and to `NotServing` before the drain begins so load balancers stop
//! routing first.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use girder_interceptor::InterceptorRegistry;
//! use girder_server::{
//!     HealthStatusManager, InProcessServerFactory, ManualServiceDiscoverer, ServerFactory,
//!     ServerLifecycle, ServerProperties,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = InProcessServerFactory::new(ServerProperties::default());
//! let server = factory.create_server(
//!     &ManualServiceDiscoverer::new(),
//!     &InterceptorRegistry::new(),
//!     &[],
//! )?;
//!
//! let lifecycle = ServerLifecycle::new(server, HealthStatusManager::new());
//! lifecycle.start().await?;
//! // ... serve traffic ...
//! lifecycle.stop(Duration::from_secs(30)).await?;
//! # Ok(())
//! # }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::health::{HealthStatusManager, ServingStatus};
use crate::server::Server;
use crate::shutdown::ShutdownSignal;

/// Phase of the server lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Assembled, never started.
    New,
    /// Binding the transport.
    Starting,
    /// Accepting and dispatching calls.
    Running,
    /// Draining in-flight calls.
    Stopping,
    /// Stopped cleanly. Terminal.
    Terminated,
    /// Died from a bind or transport error. Terminal.
    Failed,
}

impl LifecycleState {
    /// Returns `true` for the two terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated | Self::Failed)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::New => "new",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// How a graceful stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every in-flight call completed within the grace period.
    Drained,
    /// The grace period expired and the remaining calls were cancelled.
    Forced {
        /// Calls still in flight when the force fired.
        remaining: usize,
    },
}

/// Errors raised by lifecycle operations.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// `start` was called while the server was starting or running.
    #[error("server already started")]
    AlreadyStarted,

    /// The requested operation is not valid in the current state.
    #[error("invalid lifecycle transition from {from}")]
    InvalidTransition {
        /// State the lifecycle was in.
        from: LifecycleState,
    },

    /// The transport could not be bound.
    #[error("failed to bind server transport")]
    Bind(#[source] std::io::Error),

    /// The server failed while a stop was draining.
    #[error("server failed while stopping: {message}")]
    FailedWhileStopping {
        /// Message of the failure that interrupted the drain.
        message: String,
    },
}

/// State shared with the transport monitor task.
struct Shared {
    state: Mutex<LifecycleState>,
    state_tx: watch::Sender<LifecycleState>,
    health: HealthStatusManager,
    drain: ShutdownSignal,
    force: ShutdownSignal,
    failure: Mutex<Option<String>>,
}

impl Shared {
    fn transition(&self, to: LifecycleState) {
        *self.state.lock() = to;
        tracing::info!(state = %to, "lifecycle state changed");
        let _ = self.state_tx.send(to);
    }

    /// Marks the lifecycle failed, unless already terminal.
    fn fail(&self, message: String) {
        {
            let mut state = self.state.lock();
            if state.is_terminal() {
                return;
            }
            *state = LifecycleState::Failed;
        }
        tracing::error!(error = %message, "server failed");
        *self.failure.lock() = Some(message);
        self.health.set_all(ServingStatus::NotServing);
        self.drain.trigger();
        self.force.trigger();
        let _ = self.state_tx.send(LifecycleState::Failed);
    }
}

/// Drives an assembled server through start, drain, and stop.
pub struct ServerLifecycle {
    server: Server,
    shared: Arc<Shared>,
    state_rx: watch::Receiver<LifecycleState>,
    bound_addr: Mutex<Option<SocketAddr>>,
}

impl ServerLifecycle {
    /// Wraps an assembled server.
    ///
    /// Every exposed service is registered in the health manager as
    /// `Unknown` until the server actually runs.
    #[must_use]
    pub fn new(server: Server, health: HealthStatusManager) -> Self {
        for name in server.service_names() {
            health.set_status(name, ServingStatus::Unknown);
        }

        let (state_tx, state_rx) = watch::channel(LifecycleState::New);
        let shared = Arc::new(Shared {
            state: Mutex::new(LifecycleState::New),
            state_tx,
            health,
            drain: server.drain_signal(),
            force: server.force_signal(),
            failure: Mutex::new(None),
        });

        Self {
            server,
            shared,
            state_rx,
            bound_addr: Mutex::new(None),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.shared.state.lock()
    }

    /// Returns the health manager driven by this lifecycle.
    #[must_use]
    pub fn health(&self) -> &HealthStatusManager {
        &self.shared.health
    }

    /// Returns the underlying server.
    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Returns the message of the failure that killed the server, if any.
    #[must_use]
    pub fn failure(&self) -> Option<String> {
        self.shared.failure.lock().clone()
    }

    /// Returns the actual bound address once running.
    ///
    /// `None` before start and for in-process servers.
    #[must_use]
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        *self.bound_addr.lock()
    }

    /// Starts the server: binds the transport and marks services serving.
    ///
    /// # Errors
    ///
    /// - [`LifecycleError::AlreadyStarted`] when starting or running.
    /// - [`LifecycleError::InvalidTransition`] after stop or failure.
    /// - [`LifecycleError::Bind`] when the transport cannot bind; the
    ///   lifecycle moves to `Failed` and health statuses are left as they
    ///   were.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                LifecycleState::New => *state = LifecycleState::Starting,
                LifecycleState::Starting | LifecycleState::Running => {
                    return Err(LifecycleError::AlreadyStarted)
                }
                from => return Err(LifecycleError::InvalidTransition { from }),
            }
        }
        let _ = self.shared.state_tx.send(LifecycleState::Starting);
        tracing::info!("starting server");

        let transport = match self.server.start_transport().await {
            Ok(transport) => transport,
            Err(error) => {
                self.shared.transition(LifecycleState::Failed);
                *self.shared.failure.lock() = Some(error.to_string());
                return Err(LifecycleError::Bind(error));
            }
        };

        *self.bound_addr.lock() = transport.bound_addr;
        tokio::spawn(monitor_transport(transport.failures, Arc::clone(&self.shared)));

        for name in self.server.service_names() {
            self.shared.health.set_status(name, ServingStatus::Serving);
        }
        self.shared.transition(LifecycleState::Running);
        Ok(())
    }

    /// Stops the server gracefully.
    ///
    /// Marks every service `NotServing`, stops accepting new work, then
    /// waits up to `grace` for in-flight calls to finish. Calls that
    /// outlive the grace period are cancelled and counted in
    /// [`StopOutcome::Forced`].
    ///
    /// Stopping a never-started or already-terminated lifecycle is a
    /// no-op reported as [`StopOutcome::Drained`].
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] while starting,
    /// stopping, or failed, and [`LifecycleError::FailedWhileStopping`]
    /// when a transport failure interrupts the drain.
    pub async fn stop(&self, grace: Duration) -> Result<StopOutcome, LifecycleError> {
        {
            let mut state = self.shared.state.lock();
            match *state {
                LifecycleState::Running => *state = LifecycleState::Stopping,
                LifecycleState::New => {
                    *state = LifecycleState::Terminated;
                    drop(state);
                    let _ = self.shared.state_tx.send(LifecycleState::Terminated);
                    return Ok(StopOutcome::Drained);
                }
                LifecycleState::Terminated => return Ok(StopOutcome::Drained),
                from => return Err(LifecycleError::InvalidTransition { from }),
            }
        }
        let _ = self.shared.state_tx.send(LifecycleState::Stopping);
        tracing::info!(grace_secs = grace.as_secs_f64(), "stopping server");

        // Stop routing before stopping work: health first, then drain.
        self.shared.health.set_all(ServingStatus::NotServing);
        self.shared.drain.trigger();

        let tracker = self.server.tracker();
        let outcome = tokio::select! {
            biased;
            () = tracker.wait_idle() => StopOutcome::Drained,
            () = tokio::time::sleep(grace) => StopOutcome::Forced {
                remaining: tracker.active(),
            },
        };

        self.shared.force.trigger();
        match outcome {
            StopOutcome::Drained => tracing::info!("server drained cleanly"),
            StopOutcome::Forced { remaining } => {
                tracing::warn!(remaining, "grace period expired, cancelling in-flight calls");
            }
        }

        // A transport failure may have moved the state to Failed while the
        // drain was in progress. Failed is terminal, so re-check before
        // writing Terminated.
        {
            let mut state = self.shared.state.lock();
            if *state != LifecycleState::Stopping {
                drop(state);
                let message = self
                    .shared
                    .failure
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string());
                return Err(LifecycleError::FailedWhileStopping { message });
            }
            *state = LifecycleState::Terminated;
        }
        tracing::info!(state = %LifecycleState::Terminated, "lifecycle state changed");
        let _ = self.shared.state_tx.send(LifecycleState::Terminated);
        Ok(outcome)
    }

    /// Stops with the grace period from the server's configuration.
    ///
    /// # Errors
    ///
    /// Same as [`ServerLifecycle::stop`].
    pub async fn shutdown(&self) -> Result<StopOutcome, LifecycleError> {
        let grace = self.server.properties().grace_period();
        self.stop(grace).await
    }

    /// Marks the server failed.
    ///
    /// For transport integrations that detect fatal conditions outside
    /// the accept loop. No-op once terminal.
    pub fn fail(&self, error: impl Into<String>) {
        self.shared.fail(error.into());
    }

    /// Waits until the lifecycle reaches a terminal state and returns it.
    pub async fn await_termination(&self) -> LifecycleState {
        let mut rx = self.state_rx.clone();
        loop {
            let state = *rx.borrow_and_update();
            if state.is_terminal() {
                return state;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    /// Runs the server until the shutdown signal fires, then stops it
    /// with the configured grace period.
    ///
    /// # Errors
    ///
    /// Propagates start and stop errors.
    pub async fn run(&self, shutdown: ShutdownSignal) -> Result<StopOutcome, LifecycleError> {
        self.start().await?;
        shutdown.recv().await;
        self.shutdown().await
    }
}

impl std::fmt::Debug for ServerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLifecycle")
            .field("state", &self.state())
            .field("bound_addr", &self.bound_addr())
            .finish_non_exhaustive()
    }
}

/// Forwards a fatal transport error into the lifecycle.
async fn monitor_transport(mut failures: mpsc::Receiver<std::io::Error>, shared: Arc<Shared>) {
    if let Some(error) = failures.recv().await {
        shared.fail(error.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use bytes::Bytes;
    use girder_core::{CallError, CallRequest, CallResponse, FnService, ServiceDefinition, ServiceHandler};
    use girder_interceptor::InterceptorRegistry;

    use crate::config::ServerProperties;
    use crate::discover::ManualServiceDiscoverer;
    use crate::factory::{InProcessServerFactory, ServerFactory};

    fn echo_handler() -> Arc<dyn ServiceHandler> {
        Arc::new(FnService::new(|_ctx, request: CallRequest| async move {
            Ok(CallResponse::new(request.payload().clone()))
        }))
    }

    fn sleeping_handler(duration: Duration) -> Arc<dyn ServiceHandler> {
        Arc::new(FnService::new(move |_ctx, _request| async move {
            tokio::time::sleep(duration).await;
            Ok(CallResponse::new(Bytes::new()))
        }))
    }

    fn lifecycle_with(services: Vec<(&str, Arc<dyn ServiceHandler>)>) -> ServerLifecycle {
        let mut discoverer = ManualServiceDiscoverer::new();
        for (name, handler) in services {
            discoverer = discoverer.with_service(ServiceDefinition::new(name, handler));
        }
        let server = InProcessServerFactory::new(ServerProperties::default())
            .create_server(&discoverer, &InterceptorRegistry::new(), &[])
            .unwrap();
        ServerLifecycle::new(server, HealthStatusManager::new())
    }

    #[tokio::test]
    async fn start_reaches_running_and_marks_serving() {
        let lifecycle = lifecycle_with(vec![("echo", echo_handler())]);
        assert_eq!(lifecycle.state(), LifecycleState::New);
        assert_eq!(lifecycle.health().status("echo"), ServingStatus::Unknown);

        lifecycle.start().await.unwrap();

        assert_eq!(lifecycle.state(), LifecycleState::Running);
        assert_eq!(lifecycle.health().status("echo"), ServingStatus::Serving);
    }

    #[tokio::test]
    async fn double_start_is_rejected_and_state_survives() {
        let lifecycle = lifecycle_with(vec![("echo", echo_handler())]);
        lifecycle.start().await.unwrap();

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(err, LifecycleError::AlreadyStarted));
        assert_eq!(lifecycle.state(), LifecycleState::Running);
    }

    #[tokio::test]
    async fn stop_idle_server_drains_immediately() {
        let lifecycle = lifecycle_with(vec![("echo", echo_handler())]);
        lifecycle.start().await.unwrap();

        let outcome = lifecycle.stop(Duration::ZERO).await.unwrap();

        assert_eq!(outcome, StopOutcome::Drained);
        assert_eq!(lifecycle.state(), LifecycleState::Terminated);
        assert_eq!(lifecycle.health().status("echo"), ServingStatus::NotServing);
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_calls_within_grace() {
        let lifecycle = lifecycle_with(vec![("slow", sleeping_handler(Duration::from_millis(50)))]);
        lifecycle.start().await.unwrap();

        let dispatcher = lifecycle.server().dispatcher();
        let call = tokio::spawn(async move {
            dispatcher.dispatch("slow", None, CallRequest::default()).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let outcome = lifecycle.stop(Duration::from_secs(2)).await.unwrap();

        assert_eq!(outcome, StopOutcome::Drained);
        assert!(call.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn stop_forces_cancellation_after_grace_expires() {
        let lifecycle = lifecycle_with(vec![("stuck", sleeping_handler(Duration::from_secs(3600)))]);
        lifecycle.start().await.unwrap();

        let dispatcher = lifecycle.server().dispatcher();
        let call = tokio::spawn(async move {
            dispatcher.dispatch("stuck", None, CallRequest::default()).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let outcome = lifecycle.stop(Duration::from_millis(20)).await.unwrap();

        assert_eq!(outcome, StopOutcome::Forced { remaining: 1 });
        assert_eq!(lifecycle.state(), LifecycleState::Terminated);

        let result = call.await.unwrap();
        assert!(matches!(result, Err(CallError::Cancelled)));
    }

    #[tokio::test]
    async fn transport_failure_during_drain_is_not_overwritten() {
        let lifecycle = Arc::new(lifecycle_with(vec![(
            "stuck",
            sleeping_handler(Duration::from_secs(3600)),
        )]));
        lifecycle.start().await.unwrap();

        let dispatcher = lifecycle.server().dispatcher();
        let call = tokio::spawn(async move {
            dispatcher.dispatch("stuck", None, CallRequest::default()).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stopper = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.stop(Duration::from_secs(10)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(lifecycle.state(), LifecycleState::Stopping);

        lifecycle.fail("transport exploded");

        let result = tokio::time::timeout(Duration::from_secs(1), stopper)
            .await
            .expect("stop should unblock once the failure cancels the drain")
            .unwrap();
        assert!(matches!(
            result,
            Err(LifecycleError::FailedWhileStopping { .. })
        ));
        // Failed is terminal; the finishing drain must not write Terminated.
        assert_eq!(lifecycle.state(), LifecycleState::Failed);

        let cancelled = call.await.unwrap();
        assert!(matches!(cancelled, Err(CallError::Cancelled)));
    }

    #[tokio::test]
    async fn new_calls_are_rejected_while_stopping() {
        let lifecycle = Arc::new(lifecycle_with(vec![(
            "slow",
            sleeping_handler(Duration::from_millis(100)),
        )]));
        lifecycle.start().await.unwrap();

        let dispatcher = lifecycle.server().dispatcher();
        let admitted = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move { dispatcher.dispatch("slow", None, CallRequest::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let stopper = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.stop(Duration::from_secs(2)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lifecycle.state(), LifecycleState::Stopping);

        let rejected = dispatcher.dispatch("slow", None, CallRequest::default()).await;
        assert!(matches!(rejected, Err(CallError::Unavailable)));

        let outcome = tokio::time::timeout(Duration::from_secs(3), stopper)
            .await
            .expect("stop should finish draining")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, StopOutcome::Drained);
        assert!(admitted.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn tcp_server_round_trips_a_call_and_drains_on_stop() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        use crate::factory::TcpServerFactory;
        use crate::server::{Dispatcher, WireProtocol};

        // Reads the whole request, dispatches it to the echo service, and
        // writes the response payload back.
        struct FrameWire;
        impl WireProtocol for FrameWire {
            fn name(&self) -> &'static str {
                "frame"
            }
            fn serve_connection(
                &self,
                mut stream: tokio::net::TcpStream,
                peer: std::net::SocketAddr,
                dispatcher: Dispatcher,
            ) -> girder_core::BoxFuture<'static, std::io::Result<()>> {
                Box::pin(async move {
                    let mut payload = Vec::new();
                    stream.read_to_end(&mut payload).await?;
                    let response = dispatcher
                        .dispatch("echo", Some(peer), CallRequest::new("Say", payload.into()))
                        .await
                        .map_err(|error| {
                            std::io::Error::new(std::io::ErrorKind::Other, error.to_string())
                        })?;
                    stream.write_all(response.payload()).await?;
                    stream.shutdown().await?;
                    Ok(())
                })
            }
        }

        let slow_echo: Arc<dyn ServiceHandler> =
            Arc::new(FnService::new(|_ctx, request: CallRequest| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(CallResponse::new(request.payload().clone()))
            }));

        let properties = ServerProperties::builder().address("127.0.0.1:0").build();
        let discoverer = ManualServiceDiscoverer::new()
            .with_service(ServiceDefinition::new("echo", slow_echo));
        let server = TcpServerFactory::new(properties, Arc::new(FrameWire))
            .create_server(&discoverer, &InterceptorRegistry::new(), &[])
            .unwrap();
        let lifecycle = ServerLifecycle::new(server, HealthStatusManager::new());
        lifecycle.start().await.unwrap();
        let addr = lifecycle.bound_addr().expect("tcp servers report a bound address");

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client.write_all(b"over the wire").await.unwrap();
        client.shutdown().await.unwrap();

        // Stop only once the call is admitted so the drain has work to do.
        let tracker = lifecycle.server().tracker();
        for _ in 0..200 {
            if tracker.active() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(tracker.active() > 0, "call should be in flight before stop");

        let outcome = lifecycle.stop(Duration::from_secs(2)).await.unwrap();
        assert_eq!(outcome, StopOutcome::Drained);

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        assert_eq!(response, b"over the wire");
    }

    #[tokio::test]
    async fn stop_before_start_terminates_quietly() {
        let lifecycle = lifecycle_with(vec![("echo", echo_handler())]);

        let outcome = lifecycle.stop(Duration::from_secs(1)).await.unwrap();

        assert_eq!(outcome, StopOutcome::Drained);
        assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    }

    #[tokio::test]
    async fn stop_after_terminated_is_idempotent() {
        let lifecycle = lifecycle_with(vec![]);
        lifecycle.start().await.unwrap();
        lifecycle.stop(Duration::ZERO).await.unwrap();

        let outcome = lifecycle.stop(Duration::ZERO).await.unwrap();
        assert_eq!(outcome, StopOutcome::Drained);
    }

    #[tokio::test]
    async fn start_after_terminated_is_rejected() {
        let lifecycle = lifecycle_with(vec![]);
        lifecycle.start().await.unwrap();
        lifecycle.stop(Duration::ZERO).await.unwrap();

        let err = lifecycle.start().await.unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: LifecycleState::Terminated
            }
        ));
    }

    #[tokio::test]
    async fn bind_failure_moves_to_failed_and_leaves_health_alone() {
        use crate::factory::TcpServerFactory;
        use crate::server::{Dispatcher, WireProtocol};

        struct NoopWire;
        impl WireProtocol for NoopWire {
            fn name(&self) -> &'static str {
                "noop"
            }
            fn serve_connection(
                &self,
                _stream: tokio::net::TcpStream,
                _peer: std::net::SocketAddr,
                _dispatcher: Dispatcher,
            ) -> girder_core::BoxFuture<'static, std::io::Result<()>> {
                Box::pin(async { Ok(()) })
            }
        }

        // Occupy a port so the server's own bind fails.
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = occupied.local_addr().unwrap();

        let properties = ServerProperties::builder().address(addr.to_string()).build();
        let discoverer = ManualServiceDiscoverer::new()
            .with_service(ServiceDefinition::new("echo", echo_handler()));
        let server = TcpServerFactory::new(properties, Arc::new(NoopWire))
            .create_server(&discoverer, &InterceptorRegistry::new(), &[])
            .unwrap();
        let lifecycle = ServerLifecycle::new(server, HealthStatusManager::new());

        let err = lifecycle.start().await.unwrap_err();

        assert!(matches!(err, LifecycleError::Bind(_)));
        assert_eq!(lifecycle.state(), LifecycleState::Failed);
        assert_eq!(lifecycle.health().status("echo"), ServingStatus::Unknown);
        assert!(lifecycle.failure().is_some());
    }

    #[tokio::test]
    async fn await_termination_unblocks_on_stop() {
        let lifecycle = Arc::new(lifecycle_with(vec![]));
        lifecycle.start().await.unwrap();

        let waiter = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.await_termination().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        lifecycle.stop(Duration::ZERO).await.unwrap();

        let state = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("await_termination should unblock")
            .unwrap();
        assert_eq!(state, LifecycleState::Terminated);
    }

    #[tokio::test]
    async fn health_is_not_serving_by_the_time_termination_is_observed() {
        let lifecycle = Arc::new(lifecycle_with(vec![("echo", echo_handler())]));
        lifecycle.start().await.unwrap();

        let observer = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move {
                lifecycle.await_termination().await;
                lifecycle.health().status("echo")
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        lifecycle.stop(Duration::ZERO).await.unwrap();

        let observed = tokio::time::timeout(Duration::from_secs(1), observer)
            .await
            .expect("observer should unblock")
            .unwrap();
        assert_eq!(observed, ServingStatus::NotServing);
    }

    #[tokio::test]
    async fn fail_unblocks_await_termination_and_flips_health() {
        let lifecycle = Arc::new(lifecycle_with(vec![("echo", echo_handler())]));
        lifecycle.start().await.unwrap();

        let waiter = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.await_termination().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        lifecycle.fail("transport exploded");

        let state = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("await_termination should unblock")
            .unwrap();
        assert_eq!(state, LifecycleState::Failed);
        assert_eq!(lifecycle.failure().as_deref(), Some("transport exploded"));
        assert_eq!(lifecycle.health().status("echo"), ServingStatus::NotServing);
    }

    #[tokio::test]
    async fn run_serves_until_signal_then_stops() {
        let lifecycle = Arc::new(lifecycle_with(vec![("echo", echo_handler())]));
        let shutdown = ShutdownSignal::new();

        let runner = {
            let lifecycle = Arc::clone(&lifecycle);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { lifecycle.run(shutdown).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        shutdown.trigger();

        let outcome = tokio::time::timeout(Duration::from_secs(1), runner)
            .await
            .expect("run should return after the signal")
            .unwrap()
            .unwrap();
        assert_eq!(outcome, StopOutcome::Drained);
        assert_eq!(lifecycle.state(), LifecycleState::Terminated);
    }
}
