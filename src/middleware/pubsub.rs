//! Forest-wide publish/subscribe (spec §4.9 `PubSub`). Delivery to one
//! subscriber preserves publish order; there is no ordering guarantee across
//! subscribers. Built directly on [`EventBus`] — a topic is just an event
//! name on a bus scoped to this middleware instance, the same dispatch
//! discipline the per-tree bus already gives leaves and `on_change` handlers.

use std::any::Any;

use futures::future::BoxFuture;

use crate::events::{EventBus, HandlerResult, Payload, Subscription};
use crate::middleware::Middleware;

pub struct PubSub {
    name: String,
    bus: EventBus,
}

impl PubSub {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bus: EventBus::new(),
        }
    }

    /// Delivers `payload` to every current subscriber of `topic`, asynchronously.
    pub fn publish(&self, topic: &str, payload: Payload) {
        self.bus.emit(topic, payload);
    }

    pub async fn subscribe<F>(&self, topic: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Payload) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static,
    {
        self.bus.on(topic, handler).await
    }

    pub async fn unsubscribe(&self, subscription: Subscription) {
        self.bus.off(subscription).await;
    }
}

impl Middleware for PubSub {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
