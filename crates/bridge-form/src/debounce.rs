use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Quiet period applied to amount-input validation.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Timer-reset primitive: of a burst of calls, only the last one runs.
///
/// Each [`call`](Debouncer::call) cancels the timer still pending, if any. A
/// call whose timer already fired is not interrupted; its result simply lands
/// before the newer one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `routine` after the quiet period.
    ///
    /// The routine is only polled if no other call arrived in the meantime.
    /// A superseded call stops its timer and its handle resolves to `None`
    /// right away. Must be called from within a tokio runtime.
    pub fn call<F>(&self, routine: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let previous = match self.pending.lock() {
            Ok(mut pending) => pending.replace(cancel_tx),
            Err(poisoned) => poisoned.into_inner().replace(cancel_tx),
        };
        if let Some(previous) = previous {
            // the receiver is gone once its timer fired
            let _ = previous.send(());
        }
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel_rx => {
                    tracing::trace!("debounced call superseded");
                    return None;
                }
            }
            Some(routine.await)
        })
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}
