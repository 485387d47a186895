//! In-process publish/subscribe event bus.
//!
//! Synchronous handlers (registered via [`Bus::subscribe`] /
//! [`Bus::subscribe_all`]) are invoked directly from [`Bus::publish`] — a
//! handler that blocks blocks the publisher, matching the simple
//! same-thread dispatch that keeps ordering predictable for tests. A
//! bounded `tokio::sync::broadcast` channel runs alongside for consumers
//! that want to `.await` events (the SSE edge): a slow subscriber there
//! misses older events (it lags) rather than ever blocking the publisher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

type SyncHandler<E> = Box<dyn Fn(&E) + Send + Sync>;
type Predicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

struct Registration<E> {
    id: u64,
    predicate: Option<Predicate<E>>,
    handler: SyncHandler<E>,
}

struct Inner<E> {
    registrations: Mutex<Vec<Registration<E>>>,
    next_id: AtomicU64,
    broadcast_tx: broadcast::Sender<E>,
}

/// A typed, in-process event bus. `E` is expected to be a closed enum of
/// event definitions, following the tagged-union convention used
/// throughout this codebase.
pub struct Bus<E> {
    inner: Arc<Inner<E>>,
}

impl<E> Clone for Bus<E> {
    fn clone(&self) -> Self {
        Bus { inner: self.inner.clone() }
    }
}

impl<E> Default for Bus<E>
where
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Bus<E>
where
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BROADCAST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (broadcast_tx, _rx) = broadcast::channel(capacity);
        Bus {
            inner: Arc::new(Inner {
                registrations: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                broadcast_tx,
            }),
        }
    }

    /// Publish an event. Every subscribed handler whose predicate matches
    /// (or that registered via `subscribe_all`) is invoked synchronously,
    /// in registration order. Best-effort: handlers subscribed after this
    /// call returns will not see this event.
    pub fn publish(&self, event: E) {
        let registrations = self.inner.registrations.lock().expect("bus mutex poisoned");
        for reg in registrations.iter() {
            if reg.predicate.as_ref().map_or(true, |p| p(&event)) {
                (reg.handler)(&event);
            }
        }
        drop(registrations);
        // Best-effort: no receivers, or a lagging receiver, are not errors.
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Subscribe to events matching `predicate`. Returns a handle whose
    /// `unsubscribe` removes the handler.
    pub fn subscribe<P, H>(&self, predicate: P, handler: H) -> Subscription<E>
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
        H: Fn(&E) + Send + Sync + 'static,
    {
        self.register(Some(Box::new(predicate)), Box::new(handler))
    }

    /// Subscribe to every event published on this bus.
    pub fn subscribe_all<H>(&self, handler: H) -> Subscription<E>
    where
        H: Fn(&E) + Send + Sync + 'static,
    {
        self.register(None, Box::new(handler))
    }

    fn register(&self, predicate: Option<Predicate<E>>, handler: SyncHandler<E>) -> Subscription<E> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let mut registrations = self.inner.registrations.lock().expect("bus mutex poisoned");
        registrations.push(Registration { id, predicate, handler });
        Subscription { id, inner: self.inner.clone() }
    }

    /// An async receiver for consumers that want to `.await` events rather
    /// than register a synchronous handler (e.g. the SSE edge).
    pub fn subscribe_channel(&self) -> broadcast::Receiver<E> {
        self.inner.broadcast_tx.subscribe()
    }
}

/// A live subscription. Call [`Subscription::unsubscribe`] to stop
/// receiving events; dropping it without calling that leaves the handler
/// registered (explicit over implicit, since handlers are often meant to
/// live for the process lifetime).
pub struct Subscription<E> {
    id: u64,
    inner: Arc<Inner<E>>,
}

impl<E> Subscription<E> {
    pub fn unsubscribe(self) {
        let mut registrations = self.inner.registrations.lock().expect("bus mutex poisoned");
        registrations.retain(|r| r.id != self.id);
    }
}
