//! FIFO task queue routed by capability (spec §4.9 `TaskBoard`). Tasks are
//! offered, in submission order, to forest nodes whose capability set is a
//! superset of what the task requires; the first such node (by node
//! registration order) claims it. Tasks with no claimant expire once their
//! optional TTL elapses.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::events::{EventBus, Payload};
use crate::forest::ForestNode;
use crate::middleware::Middleware;
use crate::status::Status;

#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub payload: String,
    pub required_capabilities: HashSet<String>,
    deadline: Option<Instant>,
}

struct NodeEntry {
    name: String,
    capabilities: HashSet<String>,
}

struct Inner {
    pending: Vec<Task>,
    nodes: Vec<NodeEntry>,
    next_id: u64,
}

pub struct TaskBoard {
    name: String,
    inner: Mutex<Inner>,
    events: EventBus,
}

impl TaskBoard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                pending: Vec::new(),
                nodes: Vec::new(),
                next_id: 1,
            }),
            events: EventBus::new(),
        }
    }

    /// Appends a task to the FIFO, tagged with the capabilities a claimant
    /// must have. `ttl` bounds how long it may sit unclaimed before it
    /// expires (emitting `task.expired`); `None` means it never expires.
    pub async fn submit(&self, payload: impl Into<String>, required_capabilities: HashSet<String>, ttl: Option<Duration>) -> u64 {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.pending.push(Task {
            id,
            payload: payload.into(),
            required_capabilities,
            deadline: ttl.map(|d| Instant::now() + d),
        });
        id
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Offers every still-pending task to registered nodes in FIFO order,
    /// claiming each to the first capability-matching node and expiring any
    /// task whose TTL has elapsed. Called once per forest tick round.
    async fn run_matching_round(&self) {
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let mut remaining = Vec::with_capacity(inner.pending.len());

        for task in std::mem::take(&mut inner.pending) {
            if task.deadline.is_some_and(|d| now >= d) {
                self.events.emit("task.expired", Payload::new(task.id));
                continue;
            }

            let claimant = inner
                .nodes
                .iter()
                .find(|node| node.capabilities.is_superset(&task.required_capabilities))
                .map(|node| node.name.clone());

            match claimant {
                Some(tree_name) => {
                    self.events
                        .emit("task.claimed", Payload::new((task.id, tree_name)));
                }
                None => remaining.push(task),
            }
        }

        inner.pending = remaining;
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

impl Middleware for TaskBoard {
    fn name(&self) -> &str {
        &self.name
    }

    fn after_tick<'a>(&'a self, _round: u64, _results: &'a HashMap<String, Status>) -> BoxFuture<'a, ()> {
        Box::pin(self.run_matching_round())
    }

    fn on_node_added<'a>(&'a self, node: &'a ForestNode) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;
            inner.nodes.push(NodeEntry {
                name: node.name().to_string(),
                capabilities: node.capabilities().clone(),
            });
        })
    }

    fn on_node_removed<'a>(&'a self, name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.inner.lock().await.nodes.retain(|n| n.name != name);
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

    async fn node(name: &str, caps: &[&str]) -> ForestNode {
        let mut tree = BehaviorTree::new(name);
        tree.load_from_node(leaf()).unwrap();
        ForestNode::new(name, ForestRole::Worker, Arc::new(TokioMutex::new(tree)))
            .with_capabilities(caps.iter().map(|s| s.to_string()).collect())
    }

    #[tokio::test]
    async fn matching_node_claims_task() {
        let board = TaskBoard::new("tasks");
        board.on_node_added(&node("W1", &["lift"]).await).await;

        let claims = Arc::new(TokioMutex::new(Vec::new()));
        let claims_clone = Arc::clone(&claims);
        board
            .events()
            .on("task.claimed", move |payload| {
                let claims = Arc::clone(&claims_clone);
                Box::pin(async move {
                    if let Some((id, name)) = payload.downcast_ref::<(u64, String)>() {
                        claims.lock().await.push((*id, name.clone()));
                    }
                    Ok(())
                })
            })
            .await;

        board.submit("lift the box", ["lift".to_string()].into(), None).await;
        board.run_matching_round().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(*claims.lock().await, vec![(1, "W1".to_string())]);
        assert_eq!(board.pending_count().await, 0);
    }

    #[tokio::test]
    async fn unclaimable_task_expires_after_ttl() {
        let board = TaskBoard::new("tasks");
        board
            .submit("no one can do this", ["warp".to_string()].into(), Some(Duration::from_millis(5)))
            .await;

        tokio::time::sleep(Duration::from_millis(15)).await;
        board.run_matching_round().await;

        assert_eq!(board.pending_count().await, 0);
    }

    #[tokio::test]
    async fn task_without_capability_match_stays_pending() {
        let board = TaskBoard::new("tasks");
        board.on_node_added(&node("W1", &["lift"]).await).await;
        board.submit("needs warp", ["warp".to_string()].into(), None).await;
        board.run_matching_round().await;
        assert_eq!(board.pending_count().await, 1);
    }
}
