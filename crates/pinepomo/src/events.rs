//! Timer event fan-out
//!
//! A typed publish/subscribe registry. The emitter never decides when an
//! event fires; whoever drives the state machine publishes after each
//! state-changing action. Listener failures are contained: an `Err` or a
//! panic is logged and delivery moves on to the next listener.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use anyhow::Result;
use chrono::Utc;

use crate::session::{TimerEvent, TimerEventType, TimerSession};

/// Callback invoked for each published event
pub type Listener = Arc<dyn Fn(&TimerEvent) -> Result<()> + Send + Sync>;

type Registry = HashMap<TimerEventType, Vec<Listener>>;

/// Typed event emitter for timer transitions
#[derive(Clone, Default)]
pub struct TimerEventEmitter {
    listeners: Arc<Mutex<Registry>>,
}

impl TimerEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind`.
    ///
    /// Registering the same `Arc` twice for one kind has no further effect.
    pub fn subscribe(&self, kind: TimerEventType, listener: Listener) -> Subscription {
        {
            let mut registry = lock(&self.listeners);
            let entries = registry.entry(kind).or_default();
            if !entries.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                entries.push(listener.clone());
            }
        }

        Subscription {
            registry: Arc::downgrade(&self.listeners),
            kind,
            listener,
        }
    }

    /// Convenience wrapper around [`subscribe`](Self::subscribe) for plain closures
    pub fn on<F>(&self, kind: TimerEventType, f: F) -> Subscription
    where
        F: Fn(&TimerEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.subscribe(kind, Arc::new(f))
    }

    /// Remove `listener` from `kind`. Unknown listeners are ignored.
    pub fn unsubscribe(&self, kind: TimerEventType, listener: &Listener) {
        remove(&self.listeners, kind, listener);
    }

    /// Deliver an event to every listener of `kind`, in registration order.
    ///
    /// Listeners added during delivery wait for the next event. Listeners
    /// removed during delivery are skipped if they have not run yet.
    pub fn publish(&self, kind: TimerEventType, session: &TimerSession, remaining_seconds: u32) {
        // Snapshot so listeners can (un)subscribe without deadlocking
        let listeners: Vec<Listener> = match lock(&self.listeners).get(&kind) {
            Some(entries) if !entries.is_empty() => entries.clone(),
            _ => return,
        };

        let event = TimerEvent {
            kind,
            session: session.clone(),
            remaining_seconds,
            timestamp: Utc::now(),
        };

        for listener in listeners {
            if !self.is_registered(kind, &listener) {
                continue;
            }
            match panic::catch_unwind(AssertUnwindSafe(|| listener(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(event = kind.as_str(), error = %e, "timer event listener failed");
                }
                Err(payload) => {
                    tracing::error!(
                        event = kind.as_str(),
                        panic = %panic_message(payload.as_ref()),
                        "timer event listener panicked"
                    );
                }
            }
        }
    }

    /// Drop every subscription
    pub fn clear(&self) {
        lock(&self.listeners).clear();
    }

    pub fn listener_count(&self, kind: TimerEventType) -> usize {
        lock(&self.listeners).get(&kind).map_or(0, Vec::len)
    }

    fn is_registered(&self, kind: TimerEventType, listener: &Listener) -> bool {
        lock(&self.listeners)
            .get(&kind)
            .is_some_and(|entries| entries.iter().any(|l| Arc::ptr_eq(l, listener)))
    }
}

/// Handle returned by [`TimerEventEmitter::subscribe`]
///
/// Holds only a weak reference; dropping it does not unsubscribe.
pub struct Subscription {
    registry: Weak<Mutex<Registry>>,
    kind: TimerEventType,
    listener: Listener,
}

impl Subscription {
    pub fn kind(&self) -> TimerEventType {
        self.kind
    }

    /// Remove exactly this registration
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            remove(&registry, self.kind, &self.listener);
        }
    }
}

fn remove(registry: &Mutex<Registry>, kind: TimerEventType, listener: &Listener) {
    if let Some(entries) = lock(registry).get_mut(&kind) {
        entries.retain(|l| !Arc::ptr_eq(l, listener));
    }
}

// Listeners run outside the lock, so a poisoned registry only means a
// panic elsewhere while holding it; the map itself is still consistent.
fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
