//! Event dispatch by name.
//!
//! Handlers run on the reader task, in registration order, while the
//! registry lock is held: they must be quick and must not register or remove
//! handlers themselves. Nothing is buffered for late subscribers.

use super::types::Event;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, trace};

type EventCallback = Box<dyn FnMut(&Event) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    once: bool,
    callback: EventCallback,
}

#[derive(Default)]
pub struct EventDispatcher {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `callback` on every occurrence of `event_name`.
    pub fn on<F>(&self, event_name: &str, callback: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.register(event_name, false, Box::new(callback))
    }

    /// Invoke `callback` on the next occurrence of `event_name` only.
    pub fn once<F>(&self, event_name: &str, callback: F) -> SubscriptionId
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.register(event_name, true, Box::new(callback))
    }

    /// Returns false if the subscription already fired (one-shot) or was removed.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        for subscriptions in handlers.values_mut() {
            if let Some(pos) = subscriptions.iter().position(|s| s.id == id) {
                subscriptions.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn handler_count(&self, event_name: &str) -> usize {
        self.lock().get(event_name).map_or(0, Vec::len)
    }

    /// Arm a waiter for the next occurrence of any of `event_names`.
    ///
    /// Arm before taking the action that triggers the event; awaiting comes after.
    pub fn arm(self: &Arc<Self>, event_names: &[&str]) -> EventWaiter {
        let (tx, rx) = oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let ids = event_names
            .iter()
            .map(|name| {
                let tx = tx.clone();
                self.once(name, move |event| {
                    let sender = tx.lock().ok().and_then(|mut slot| slot.take());
                    if let Some(sender) = sender {
                        let _ = sender.send(event.clone());
                    }
                })
            })
            .collect();

        EventWaiter {
            names: event_names.iter().map(|n| n.to_string()).collect(),
            ids,
            rx,
            dispatcher: self.clone(),
        }
    }

    pub fn dispatch(&self, event: &Event) {
        let mut handlers = self.lock();
        let Some(subscriptions) = handlers.get_mut(&event.event) else {
            trace!(event = %event.event, "No handlers registered");
            return;
        };

        debug!(
            event = %event.event,
            handlers = subscriptions.len(),
            "Dispatching event"
        );

        for subscription in subscriptions.iter_mut() {
            (subscription.callback)(event);
        }
        subscriptions.retain(|s| !s.once);

        if subscriptions.is_empty() {
            handlers.remove(&event.event);
        }
    }

    fn register(&self, event_name: &str, once: bool, callback: EventCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(event_name.to_string())
            .or_default()
            .push(Subscription { id, once, callback });
        id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Subscription>>> {
        self.handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A one-shot signal armed on one or more event names. Dropping it removes
/// whatever registrations have not fired.
pub struct EventWaiter {
    names: Vec<String>,
    ids: Vec<SubscriptionId>,
    rx: oneshot::Receiver<Event>,
    dispatcher: Arc<EventDispatcher>,
}

impl EventWaiter {
    /// Wait for the event; the first of the armed names to fire wins.
    pub async fn wait(mut self, timeout: Duration) -> Result<Event> {
        match tokio::time::timeout(timeout, &mut self.rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_)) => Err(Error::Internal(format!(
                "Waiter for '{}' was dropped",
                self.names.join("' or '")
            ))),
            Err(_) => Err(Error::Timeout {
                command: self.names.join("' or '"),
                after: timeout,
            }),
        }
    }
}

impl Drop for EventWaiter {
    fn drop(&mut self) {
        for id in &self.ids {
            self.dispatcher.off(*id);
        }
    }
}

/// Body helper for event payloads.
pub fn body_field<'a>(event: &'a Event, field: &str) -> Option<&'a Value> {
    event.body.as_ref().and_then(|b| b.get(field))
}
