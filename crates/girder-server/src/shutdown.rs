//! Shutdown signaling and in-flight call tracking.
//!
//! [`ShutdownSignal`] is a clonable, idempotent one-shot broadcast used to
//! tell the accept loop to stop taking new work (drain) and, separately, to
//! cancel calls that outlive the grace period (force). [`CallTracker`] counts
//! the calls currently executing so a graceful stop knows when the server is
//! idle.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::broadcast;

/// A one-shot shutdown broadcast shared across tasks.
///
/// Every clone observes the same trigger. Triggering twice is a no-op.
///
/// # Example
///
/// ```
/// use girder_server::ShutdownSignal;
///
/// let signal = ShutdownSignal::new();
/// assert!(!signal.is_triggered());
///
/// signal.trigger();
/// assert!(signal.is_triggered());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl ShutdownSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Fires the signal, waking every waiter. Idempotent.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the signal has fired.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Returns a future that resolves when the signal fires.
    ///
    /// Resolves immediately if the signal already fired.
    pub fn recv(&self) -> ShutdownReceiver {
        // Subscribe before checking the flag so a trigger racing this call
        // is observed either way.
        let mut receiver = self.sender.subscribe();
        let triggered = Arc::clone(&self.triggered);
        ShutdownReceiver {
            inner: Box::pin(async move {
                if triggered.load(Ordering::SeqCst) {
                    return;
                }
                // Closed means every signal clone is gone; treat as fired.
                let _ = receiver.recv().await;
            }),
        }
    }

    /// Creates a signal wired to SIGTERM and SIGINT.
    ///
    /// # Panics
    ///
    /// Panics if the OS signal handlers cannot be registered.
    #[must_use]
    pub fn with_os_signals() -> Self {
        let signal = Self::new();
        let signal_clone = signal.clone();

        tokio::spawn(async move {
            wait_for_os_signal().await;
            signal_clone.trigger();
        });

        signal
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Future returned by [`ShutdownSignal::recv`].
pub struct ShutdownReceiver {
    inner: girder_core::BoxFuture<'static, ()>,
}

impl Future for ShutdownReceiver {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to wait for Ctrl+C");
        tracing::info!("received Ctrl+C, initiating graceful shutdown");
    }
}

/// Counts in-flight calls so a graceful stop can wait for idle.
///
/// Each dispatched call holds a [`CallGuard`]; dropping the guard decrements
/// the count and wakes [`CallTracker::wait_idle`] waiters when the count hits
/// zero.
///
/// # Example
///
/// ```
/// use girder_server::CallTracker;
///
/// let tracker = CallTracker::new();
/// let guard = tracker.track();
/// assert_eq!(tracker.active(), 1);
///
/// drop(guard);
/// assert_eq!(tracker.active(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct CallTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl CallTracker {
    /// Creates a tracker with zero active calls.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Registers one in-flight call, returning its RAII guard.
    #[must_use]
    pub fn track(&self) -> CallGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        CallGuard {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Registers one in-flight call unless `limit` calls are already active.
    ///
    /// Admission is atomic: the count is incremented first and rolled back
    /// on rejection, so two racing callers can never both slip past the
    /// limit.
    #[must_use]
    pub fn try_track(&self, limit: usize) -> Option<CallGuard> {
        if self.active.fetch_add(1, Ordering::SeqCst) >= limit {
            if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.notify.notify_waiters();
            }
            return None;
        }
        Some(CallGuard {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        })
    }

    /// Returns the number of calls currently executing.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Waits until no calls are executing.
    ///
    /// Completes immediately when already idle.
    pub async fn wait_idle(&self) {
        while self.active.load(Ordering::SeqCst) > 0 {
            self.notify.notified().await;
        }
    }
}

impl Default for CallTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one in-flight call.
#[derive(Debug)]
pub struct CallGuard {
    active: Arc<AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        let prev = self.active.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 {
            self.notify.notify_waiters();
        }
    }
}
