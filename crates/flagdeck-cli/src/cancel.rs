//! Cancellation signal threaded through middleware, handlers and the pipeline.

use tokio::sync::watch;
use tracing::{debug, warn};

/// Owning side of the cancellation signal.
#[derive(Debug)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

/// Observing side of the cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl CancellationSource {
    /// Create a source that has not been triggered.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Signal observed by the rest of the invocation.
    #[must_use]
    pub fn signal(&self) -> Cancellation {
        Cancellation {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Trigger cancellation when the process receives an interrupt.
    ///
    /// The listener task lives for the rest of the runtime.
    pub fn cancel_on_ctrl_c(self) -> Cancellation {
        let signal = self.signal();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    debug!("interrupt received, cancelling invocation");
                    self.cancel();
                }
                Err(err) => warn!(error = %err, "failed to listen for interrupt"),
            }
        });
        signal
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    /// Signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        CancellationSource::new().signal()
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested.
    ///
    /// Stays pending forever when the source is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
