//! Cooperative shutdown signalling between the daemon and its workers.

use tokio::sync::watch;

/// The sending half of a shutdown signal.
///
/// Dropping the sender releases every waiting listener, the same as
/// signalling it.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

/// A listener on a [`Shutdown`] signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Creates a shutdown signal and a listener on it.
    pub fn new() -> (Self, ShutdownListener) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, ShutdownListener { rx })
    }

    /// Signals shutdown to every listener.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

impl ShutdownListener {
    /// Returns true if shutdown has been signalled.
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once shutdown is signalled (or the sender is gone).
    ///
    /// Keeps completing immediately on subsequent calls.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}
