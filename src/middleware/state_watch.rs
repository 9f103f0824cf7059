//! Cross-tree blackboard observation (spec §4.9 `StateWatch`). A tree's own
//! writes flow through its local [`Blackboard`]; this middleware lets other
//! trees `watch(tree_name, key, handler)` without a direct reference to that
//! tree. Key removal mid-dispatch delivers the sentinel `new: None` rather
//! than silently dropping the notification.

use std::any::Any;
use std::collections::HashMap;

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::blackboard::{Blackboard, Change};
use crate::error::{BtError, BtResult};
use crate::events::{HandlerResult, Payload, Subscription};
use crate::forest::ForestNode;
use crate::middleware::Middleware;

/// What a `watch` handler receives: the originating tree/key plus the
/// before/after values rendered to their debug text (the blackboard is
/// type-erased, so this is the only representation every value type shares).
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub tree_name: String,
    pub key: String,
    pub old: Option<String>,
    /// `None` means the key was removed.
    pub new: Option<String>,
}

pub struct StateWatch {
    name: String,
    boards: RwLock<HashMap<String, Blackboard>>,
    watchers: RwLock<HashMap<(String, String), Vec<Subscription>>>,
}

impl StateWatch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            boards: RwLock::new(HashMap::new()),
            watchers: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes `handler` to changes of `key` on `tree_name`'s blackboard.
    /// Fails with [`BtError::UnknownDependency`] if no forest node named
    /// `tree_name` has been added yet (watching is only meaningful for trees
    /// already wired into the forest).
    pub async fn watch<F>(&self, tree_name: &str, key: &str, handler: F) -> BtResult<Subscription>
    where
        F: Fn(WatchEvent) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static,
    {
        let board = self
            .boards
            .read()
            .await
            .get(tree_name)
            .cloned()
            .ok_or_else(|| BtError::UnknownDependency(tree_name.to_string()))?;

        let tree_name_owned = tree_name.to_string();
        let key_owned = key.to_string();
        let handler = std::sync::Arc::new(handler);
        let subscription = board
            .on_change(key, move |payload: Payload| {
                let tree_name = tree_name_owned.clone();
                let key = key_owned.clone();
                let event = payload.downcast_ref::<Change>().map(|change| WatchEvent {
                    tree_name,
                    key,
                    old: change.old.as_ref().map(|v| format!("{v:?}")),
                    new: change.new.as_ref().map(|v| format!("{v:?}")),
                });
                let handler = std::sync::Arc::clone(&handler);
                Box::pin(async move {
                    match event {
                        Some(event) => handler(event).await,
                        None => Ok(()),
                    }
                })
            })
            .await;

        self.watchers
            .write()
            .await
            .entry((tree_name.to_string(), key.to_string()))
            .or_default()
            .push(subscription);
        Ok(subscription)
    }

    pub async fn unwatch(&self, tree_name: &str, key: &str, subscription: Subscription) {
        if let Some(board) = self.boards.read().await.get(tree_name).cloned() {
            board.off(subscription).await;
        }
        if let Some(subs) = self
            .watchers
            .write()
            .await
            .get_mut(&(tree_name.to_string(), key.to_string()))
        {
            subs.retain(|s| *s != subscription);
        }
    }
}

impl Middleware for StateWatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_node_added<'a>(&'a self, node: &'a ForestNode) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let board = node.blackboard().await;
            self.boards.write().await.insert(node.name().to_string(), board);
        })
    }

    fn on_node_removed<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.boards.write().await.remove(name);
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestRole;
    use crate::node::{Node, NodeConfig};
    use crate::tree::BehaviorTree;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex as TokioMutex;

    fn leaf() -> Node {
        Node::action(
            "noop",
            NodeConfig::new(),
            Arc::new(|_bb| Box::pin(async { Ok(crate::status::Status::Success) })),
        )
    }

    #[tokio::test]
    async fn watch_observes_change_and_removal() {
        let mut tree = BehaviorTree::new("R1");
        tree.load_from_node(leaf()).unwrap();
        let board = tree.blackboard().clone();
        let node = ForestNode::new("R1", ForestRole::Worker, Arc::new(TokioMutex::new(tree)));

        let watch = StateWatch::new("watch");
        watch.on_node_added(&node).await;

        let seen = Arc::new(TokioMutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        watch
            .watch("R1", "door_open", move |event| {
                let seen = Arc::clone(&seen_clone);
                Box::pin(async move {
                    seen.lock().await.push(event.new);
                    Ok(())
                })
            })
            .await
            .unwrap();

        board.set("door_open", true).await;
        board.remove("door_open").await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_some());
        assert!(seen[1].is_none());
    }

    #[tokio::test]
    async fn watch_unknown_tree_fails() {
        let watch = StateWatch::new("watch");
        let count = Arc::new(AtomicUsize::new(0));
        let err = watch
            .watch("ghost", "k", move |_| {
                let count = Arc::clone(&count);
                Box::pin(async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BtError::UnknownDependency(name) if name == "ghost"));
    }
}
