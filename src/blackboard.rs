//! Shared, concurrency-safe keyed store nodes read and write (spec §4.3).
//!
//! Storage follows the teacher crate's type-erased `Any` idiom
//! (`behaviortree-rs/src/blackboard.rs`), simplified to a flat map: this
//! spec's blackboard has no subtree/port-remapping hierarchy, only the
//! per-tree (or per-forest, for the shared middleware variant) store
//! described in spec §3/§4.3.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::events::{EventBus, HandlerResult, Payload, Subscription};

type Entry = Box<dyn Any + Send + Sync>;

struct Inner {
    storage: HashMap<String, Entry>,
}

/// Cloning a `Blackboard` shares the same underlying storage and change bus —
/// every clone is a handle onto one logical store.
#[derive(Clone)]
pub struct Blackboard {
    inner: Arc<RwLock<Inner>>,
    events: EventBus,
}

/// Payload delivered to `on_change` handlers and to the `blackboard.changed` event.
#[derive(Debug, Clone)]
pub struct Change {
    pub key: String,
    pub old: Option<Arc<dyn DebugDisplay>>,
    /// `None` means the key was removed rather than overwritten (the
    /// "removed" sentinel middleware watchers observe — spec §4.9 `StateWatch`).
    pub new: Option<Arc<dyn DebugDisplay>>,
}

/// Minimal object-safe bound so changed values can be reported in events
/// without requiring every blackboard value to implement `Display`.
pub trait DebugDisplay: fmt::Debug + Send + Sync {}
impl<T: fmt::Debug + Send + Sync> DebugDisplay for T {}

impl Blackboard {
    /// Creates a fresh, empty blackboard with its own private event bus used
    /// purely for `on_change` dispatch (it is distinct from — but may be
    /// bridged to — a tree's own `EventBus`; see `tree::BehaviorTree::new`).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                storage: HashMap::new(),
            })),
            events: EventBus::new(),
        }
    }

    /// Creates a blackboard that publishes `on_change` notifications on `events`
    /// instead of a private bus — used so a tree's leaves and its `on_change`
    /// subscribers share one dispatch queue (spec §4.3: "invoked on the event
    /// bus, not inline").
    pub fn with_event_bus(events: EventBus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                storage: HashMap::new(),
            })),
            events,
        }
    }

    pub async fn get<T: Any + Clone + Send + Sync>(&self, key: &str) -> Option<T> {
        let inner = self.inner.read().await;
        inner.storage.get(key).and_then(|v| v.downcast_ref::<T>()).cloned()
    }

    pub async fn has(&self, key: &str) -> bool {
        self.inner.read().await.storage.contains_key(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.inner.read().await.storage.keys().cloned().collect()
    }

    /// Writes `value` at `key`, replacing whatever was there. Readers never
    /// observe a partially-written value since the write happens under the
    /// same lock as any concurrent read.
    pub async fn set<T: Any + Clone + fmt::Debug + Send + Sync>(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let new_dbg: Arc<dyn DebugDisplay> = Arc::new(value.clone());
        let old_dbg = {
            let mut inner = self.inner.write().await;
            let old = inner
                .storage
                .insert(key.clone(), Box::new(value))
                .and_then(|old| old.downcast_ref::<T>().cloned())
                .map(|v| Arc::new(v) as Arc<dyn DebugDisplay>);
            old
        };

        let change = Change {
            key: key.clone(),
            old: old_dbg,
            new: Some(new_dbg),
        };
        self.events.emit(format!("blackboard.changed::{key}"), Payload::new(change.clone()));
        self.events.emit("blackboard.changed", Payload::new(change));
    }

    /// Removes the entry at `key`, if any, emitting a change whose `new` is
    /// `None` — the sentinel `StateWatch` watchers see when a watched key
    /// disappears mid-dispatch (spec §4.9).
    pub async fn remove(&self, key: &str) -> bool {
        let key_owned = key.to_string();
        let old_dbg = {
            let mut inner = self.inner.write().await;
            inner.storage.remove(key)
        };
        let Some(_old) = old_dbg else {
            return false;
        };

        let change = Change {
            key: key_owned.clone(),
            old: None,
            new: None,
        };
        self.events
            .emit(format!("blackboard.changed::{key_owned}"), Payload::new(change.clone()));
        self.events.emit("blackboard.changed", Payload::new(change));
        true
    }

    /// Subscribes `handler` to changes of `key`. Fires after the write has
    /// completed, dispatched through the owning event bus (never inline).
    pub async fn on_change<F>(&self, key: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(Payload) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static,
    {
        self.events
            .on(format!("blackboard.changed::{}", key.into()), handler)
            .await
    }

    pub async fn off(&self, subscription: Subscription) {
        self.events.off(subscription).await;
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

impl Default for Blackboard {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blackboard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn get_after_set_returns_last_writer() {
        let bb = Blackboard::new();
        bb.set("door_open", true).await;
        assert_eq!(bb.get::<bool>("door_open").await, Some(true));

        bb.set("door_open", false).await;
        assert_eq!(bb.get::<bool>("door_open").await, Some(false));
    }

    #[tokio::test]
    async fn has_keys_remove() {
        let bb = Blackboard::new();
        assert!(!bb.has("x").await);
        bb.set("x", 1u32).await;
        assert!(bb.has("x").await);
        assert_eq!(bb.keys().await, vec!["x".to_string()]);
        assert!(bb.remove("x").await);
        assert!(!bb.has("x").await);
    }

    #[tokio::test]
    async fn on_change_fires_after_write() {
        let bb = Blackboard::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        bb.on_change("count", move |_payload| {
            let seen = Arc::clone(&seen_clone);
            Box::pin(async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .await;

        bb.set("count", 1u32).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn type_mismatch_returns_none() {
        let bb = Blackboard::new();
        bb.set("x", 1u32).await;
        assert_eq!(bb.get::<String>("x").await, None);
    }
}
