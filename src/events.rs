//! Async publish/subscribe bus used inside a tree and forwarded to by the
//! forest's middlewares (spec §4.4).
//!
//! `emit` never blocks the caller on handler work: dispatch is spawned onto
//! the Tokio runtime, handlers for a single event fire in subscription order,
//! and a handler that returns an error is isolated — it is reported as a
//! `handler_error` meta-event rather than aborting dispatch to its peers.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use log::warn;
use tokio::sync::Mutex;

/// Type-erased event payload. Handlers downcast with [`Payload::downcast_ref`].
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload(..)")
    }
}

pub type HandlerResult = Result<(), anyhow::Error>;
type HandlerFn = Arc<dyn Fn(Payload) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Opaque handle returned by [`EventBus::on`]; pass to [`EventBus::off`] to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Subscriber {
    id: Subscription,
    handler: HandlerFn,
}

#[derive(Default)]
struct Inner {
    subscribers: HashMap<String, Vec<Subscriber>>,
}

/// Cloning an `EventBus` shares the same subscriber table — every clone is a
/// handle onto one logical bus, mirroring how `Blackboard` shares storage.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<Inner>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Registers `handler` for `event_name`. Handlers registered before an
    /// `emit` call are invoked at least once for that emission.
    pub async fn on<F>(&self, event_name: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Payload) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static,
    {
        let id = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut inner = self.inner.lock().await;
        inner
            .subscribers
            .entry(event_name.into())
            .or_default()
            .push(Subscriber {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Removes a subscription. Unsubscribing an already-removed handle is a no-op.
    pub async fn off(&self, subscription: Subscription) {
        let mut inner = self.inner.lock().await;
        for subs in inner.subscribers.values_mut() {
            subs.retain(|s| s.id != subscription);
        }
    }

    /// Dispatches `payload` to every subscriber of `event_name`, in
    /// subscription order, without blocking the caller.
    pub fn emit(&self, event_name: impl Into<String>, payload: Payload) {
        let event_name = event_name.into();
        let inner = Arc::clone(&self.inner);
        let bus = self.clone();
        tokio::spawn(async move {
            let handlers: Vec<HandlerFn> = {
                let guard = inner.lock().await;
                match guard.subscribers.get(&event_name) {
                    Some(subs) => subs.iter().map(|s| Arc::clone(&s.handler)).collect(),
                    None => return,
                }
            };

            for handler in handlers {
                if let Err(err) = handler(payload.clone()).await {
                    warn!("event handler for '{event_name}' failed: {err}");
                    if event_name != "handler_error" {
                        bus.emit(
                            "handler_error",
                            Payload::new(format!("{event_name}: {err}")),
                        );
                    }
                }
            }
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus")
    }
}
