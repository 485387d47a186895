//! Cancellation signal shared by a session's model call, every in-flight
//! tool's context, and its permission/question waits. Built on
//! `tokio::sync::watch` rather than a one-shot channel because a single
//! abort must be observable by many concurrent waiters.

use tokio::sync::watch;

#[derive(Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal is raised. Safe to call after the signal
    /// is already raised — it returns immediately.
    pub async fn aborted(&mut self) {
        let _ = self.rx.wait_for(|aborted| *aborted).await;
    }
}

pub struct AbortController {
    tx: watch::Sender<bool>,
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        AbortController { tx }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal { rx: self.tx.subscribe() }
    }

    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}
