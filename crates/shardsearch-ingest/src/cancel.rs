use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;

/// Cooperative stop signal shared by every stage of a pipeline run.
///
/// Cancelling drops the only sender of an internal channel, so the token's
/// receiver becomes ready and any `select!` waiting on it wakes up.
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// Why a blocking handoff did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    /// The other side of the channel is gone.
    Disconnected,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self { inner: Arc::new(Inner { cancelled: AtomicBool::new(false), trigger: Mutex::new(Some(trigger)), signal }) }
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.trigger.lock().take();
    }

    pub fn is_cancelled(&self) -> bool { self.inner.cancelled.load(Ordering::SeqCst) }

    /// Ready (disconnected) once the token is cancelled.
    pub fn signal(&self) -> &Receiver<()> { &self.inner.signal }

    /// Blocking send that gives up on cancellation.
    pub fn send<T>(&self, tx: &Sender<T>, value: T) -> Result<(), Interrupted> {
        if self.is_cancelled() { return Err(Interrupted::Cancelled); }
        select! {
            send(tx, value) -> res => res.map_err(|_| Interrupted::Disconnected),
            recv(self.signal()) -> _ => Err(Interrupted::Cancelled),
        }
    }

    /// Blocking receive that gives up on cancellation.
    pub fn recv<T>(&self, rx: &Receiver<T>) -> Result<T, Interrupted> {
        if self.is_cancelled() { return Err(Interrupted::Cancelled); }
        select! {
            recv(rx) -> msg => msg.map_err(|_| Interrupted::Disconnected),
            recv(self.signal()) -> _ => Err(Interrupted::Cancelled),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken").field("cancelled", &self.is_cancelled()).finish()
    }
}
