use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Disconnect signal shared between a relay session and the client body it feeds.
///
/// The body side calls [`cancel`](Self::cancel) when it is dropped; the session
/// side calls [`mark_finished`](Self::mark_finished) once it reaches a terminal
/// state so that the drop that follows a normal end is not reported as a
/// disconnect.
#[derive(Clone)]
pub struct StreamCancelHandle {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
    finished: Arc<AtomicBool>,
}

impl StreamCancelHandle {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record that the session ended on its own (completed or failed).
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Signal that the client went away. No-op once the session has finished.
    pub fn cancel(&self) {
        if !self.is_finished() {
            self.sender.send_replace(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolve once [`cancel`](Self::cancel) has been called.
    ///
    /// Safe to use as a `select!` branch: it never resolves spuriously.
    pub async fn cancelled(&self) {
        let mut rx = self.receiver.clone();
        // The sender lives as long as any handle, so wait_for only errs if every
        // handle is gone, which cannot happen while `self` is borrowed.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for StreamCancelHandle {
    fn default() -> Self {
        Self::new()
    }
}
