//! Shutdown coordination for the gateway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::lifecycle::signals;

/// Broadcasts a single stop notice to the gateway server and anything else listening.
///
/// Cloning yields another handle to the same notice.
#[derive(Clone)]
pub struct Shutdown {
    notify: broadcast::Sender<()>,
    fired: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self {
            notify,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A receiver that resolves once the notice is sent.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.notify.subscribe()
    }

    /// Send the notice. Only the first call has any effect.
    pub fn trigger(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = self.notify.send(()).unwrap_or(0);
        tracing::info!(listeners, "Shutdown triggered");
    }

    pub fn is_triggered(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Trigger on Ctrl+C or SIGTERM, from a background task.
    pub fn trigger_on_signal(&self) {
        let handle = self.clone();
        tokio::spawn(async move {
            signals::wait_for_termination().await;
            handle.trigger();
        });
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
