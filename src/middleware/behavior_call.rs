//! Cross-tree sub-tree invocation (spec §4.9 `BehaviorCall`). Ticks a named
//! behavior registered against `(tree_name, behavior_name)` with a blackboard
//! overlay applied for the duration of the call and popped afterward. Calls
//! may recurse (A calls B calls A) but are bounded by a configurable depth
//! limit.
//!
//! Depth is threaded through the call arguments rather than held in shared
//! state: a forest ticks trees within the same dependency layer concurrently
//! (spec §5), so a process-wide counter would conflate unrelated concurrent
//! calls with actual recursion.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{BtError, BtResult};
use crate::middleware::Middleware;
use crate::status::Status;
use crate::tree::BehaviorTree;

/// Blackboard key a call's depth is overlaid under, alongside its `args`, so
/// an action closure inside the invoked tree can read its own ambient depth
/// and pass it on as `caller_depth` if it makes a further nested call.
const DEPTH_KEY: &str = "__behavior_call_depth";

pub struct BehaviorCall {
    name: String,
    max_depth: u32,
    behaviors: Mutex<HashMap<(String, String), Arc<Mutex<BehaviorTree>>>>,
}

impl BehaviorCall {
    pub fn new(name: impl Into<String>, max_depth: u32) -> Self {
        Self {
            name: name.into(),
            max_depth,
            behaviors: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `tree` as the invocable target for `(tree_name, behavior_name)`.
    pub async fn register(&self, tree_name: impl Into<String>, behavior_name: impl Into<String>, tree: Arc<Mutex<BehaviorTree>>) {
        self.behaviors
            .lock()
            .await
            .insert((tree_name.into(), behavior_name.into()), tree);
    }

    /// Ticks the registered behavior once with `args` overlaid onto its
    /// blackboard beforehand and removed again once the tick returns,
    /// regardless of outcome. `caller_depth` is the depth of the call chain
    /// this call is part of (0 for a call made directly by a forest node).
    pub async fn call(&self, caller_depth: u32, tree_name: &str, behavior_name: &str, args: HashMap<String, String>) -> BtResult<Status> {
        if caller_depth >= self.max_depth {
            return Err(BtError::CallDepthExceeded);
        }

        let target = self
            .behaviors
            .lock()
            .await
            .get(&(tree_name.to_string(), behavior_name.to_string()))
            .cloned()
            .ok_or_else(|| BtError::NoService(format!("{tree_name}::{behavior_name}")))?;

        self.invoke(&target, &args, caller_depth + 1).await
    }

    async fn invoke(&self, target: &Arc<Mutex<BehaviorTree>>, args: &HashMap<String, String>, depth: u32) -> BtResult<Status> {
        let mut tree = target.lock().await;
        let board = tree.blackboard().clone();
        for (key, value) in args {
            board.set(key.clone(), value.clone()).await;
        }
        board.set(DEPTH_KEY, depth).await;

        let result = tree.tick().await;

        for key in args.keys() {
            board.remove(key).await;
        }
        board.remove(DEPTH_KEY).await;

        result
    }
}

impl Middleware for BehaviorCall {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeConfig};
    use std::sync::Arc;

    fn echoes_key() -> Node {
        Node::action(
            "echo",
            NodeConfig::new(),
            Arc::new(|bb| {
                Box::pin(async move {
                    Ok(if bb.get::<String>("greeting").await.as_deref() == Some("hi") {
                        Status::Success
                    } else {
                        Status::Failure
                    })
                })
            }),
        )
    }

    #[tokio::test]
    async fn call_applies_and_removes_overlay() {
        let call = BehaviorCall::new("calls", 8);
        let mut tree = BehaviorTree::new("B");
        tree.load_from_node(echoes_key()).unwrap();
        let tree = Arc::new(Mutex::new(tree));
        call.register("A", "greet", Arc::clone(&tree)).await;

        let mut args = HashMap::new();
        args.insert("greeting".to_string(), "hi".to_string());
        let status = call.call(0, "A", "greet", args).await.unwrap();
        assert_eq!(status, Status::Success);

        let board = tree.lock().await.blackboard().clone();
        assert_eq!(board.get::<String>("greeting").await, None);
    }

    #[tokio::test]
    async fn call_unregistered_behavior_fails() {
        let call = BehaviorCall::new("calls", 8);
        let err = call.call(0, "A", "ghost", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, BtError::NoService(_)));
    }

    #[tokio::test]
    async fn depth_limit_is_enforced() {
        let call = BehaviorCall::new("calls", 1);
        let mut tree = BehaviorTree::new("B");
        tree.load_from_node(echoes_key()).unwrap();
        call.register("A", "greet", Arc::new(Mutex::new(tree))).await;

        let err = call.call(1, "A", "greet", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, BtError::CallDepthExceeded));
    }

    #[tokio::test]
    async fn concurrent_unrelated_calls_do_not_share_depth() {
        let call = BehaviorCall::new("calls", 1);

        let mut tree_a = BehaviorTree::new("A");
        tree_a.load_from_node(echoes_key()).unwrap();
        call.register("A", "greet", Arc::new(Mutex::new(tree_a))).await;

        let mut tree_b = BehaviorTree::new("B");
        tree_b.load_from_node(echoes_key()).unwrap();
        call.register("B", "greet", Arc::new(Mutex::new(tree_b))).await;

        let (a, b) = tokio::join!(
            call.call(0, "A", "greet", HashMap::new()),
            call.call(0, "B", "greet", HashMap::new()),
        );
        assert!(a.is_ok(), "sibling call must not trip the depth limit: {a:?}");
        assert!(b.is_ok(), "sibling call must not trip the depth limit: {b:?}");
    }
}
