//! Owns a root node, its blackboard, and its event bus; orchestrates ticks
//! (spec §4.5).

use log::debug;
use tokio::sync::Mutex;

use crate::blackboard::Blackboard;
use crate::error::BtResult;
use crate::events::{EventBus, Payload};
use crate::node::{CancellationToken, Node, TickCtx};
use crate::status::Status;
use crate::xml;

/// A single behavior tree: root node plus the blackboard/event bus it shares
/// with every node under it. Constructed empty, then populated exactly once
/// via [`BehaviorTree::load_from_node`] or [`BehaviorTree::load_from_xml`].
pub struct BehaviorTree {
    name: String,
    root: Option<Node>,
    blackboard: Blackboard,
    events: EventBus,
    cancellation: CancellationToken,
    tick_count: u64,
    last_status: Option<Status>,
    tick_lock: Mutex<()>,
}

impl BehaviorTree {
    pub fn new(name: impl Into<String>) -> Self {
        let events = EventBus::new();
        let blackboard = Blackboard::with_event_bus(events.clone());
        Self {
            name: name.into(),
            root: None,
            blackboard,
            events,
            cancellation: CancellationToken::new(),
            tick_count: 0,
            last_status: None,
            tick_lock: Mutex::new(()),
        }
    }

    /// Takes ownership of `root` after validating it (no cycles are
    /// representable in this node type since children are owned outright;
    /// arity and non-empty names are checked by [`Node::validate`]).
    pub fn load_from_node(&mut self, root: Node) -> BtResult<()> {
        root.validate()?;
        self.root = Some(root);
        self.tick_count = 0;
        self.last_status = None;
        Ok(())
    }

    pub fn load_from_xml(&mut self, source: &str, registry: &crate::registry::NodeRegistry) -> BtResult<()> {
        let root = xml::load_tree(source, registry)?;
        self.load_from_node(root)
    }

    /// Advances the root one step. At most one tick runs at a time per tree;
    /// a second caller awaits the first rather than racing it.
    pub async fn tick(&mut self) -> BtResult<Status> {
        let _guard = self.tick_lock.lock().await;
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| crate::error::BtError::InvalidTree("tree has no root loaded".into()))?;

        self.tick_count += 1;
        let round = self.tick_count;
        self.events
            .emit("tree.tick.start", Payload::new((self.name.clone(), round)));

        let ctx = TickCtx {
            blackboard: self.blackboard.clone(),
            events: self.events.clone(),
            cancellation: self.cancellation.clone(),
            path: self.name.clone(),
        };
        let status = root.tick(&ctx).await;
        debug!("tree '{}' round {round} -> {status}", self.name);

        self.last_status = Some(status);
        self.events
            .emit("tree.tick.end", Payload::new((self.name.clone(), round, status)));
        Ok(status)
    }

    /// Resets every node's running state. The blackboard is left untouched —
    /// callers who want a clean slate clear it explicitly.
    pub fn reset(&mut self) {
        if let Some(root) = self.root.as_mut() {
            root.reset();
        }
        self.last_status = None;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn last_status(&self) -> Option<Status> {
        self.last_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeConfig, NodeKind};
    use std::sync::Arc;

    fn always_success() -> Node {
        Node::action(
            "always_success",
            NodeConfig::new(),
            Arc::new(|_bb| Box::pin(async { Ok(Status::Success) })),
        )
    }

    #[tokio::test]
    async fn tick_without_root_fails() {
        let mut tree = BehaviorTree::new("empty");
        assert!(tree.tick().await.is_err());
    }

    #[tokio::test]
    async fn tick_increments_counter_and_returns_status() {
        let mut tree = BehaviorTree::new("t");
        tree.load_from_node(always_success()).unwrap();
        assert_eq!(tree.tick().await.unwrap(), Status::Success);
        assert_eq!(tree.tick_count(), 1);
        assert_eq!(tree.tick().await.unwrap(), Status::Success);
        assert_eq!(tree.tick_count(), 2);
    }

    #[tokio::test]
    async fn reset_clears_last_status_but_not_blackboard() {
        let mut tree = BehaviorTree::new("t");
        tree.load_from_node(always_success()).unwrap();
        tree.blackboard().set("k", 1u32).await;
        tree.tick().await.unwrap();
        tree.reset();
        assert_eq!(tree.last_status(), None);
        assert_eq!(tree.blackboard().get::<u32>("k").await, Some(1));
    }

    #[test]
    fn load_from_node_rejects_invalid_tree() {
        let mut tree = BehaviorTree::new("t");
        let bad = Node::new("", NodeKind::Composite(crate::node::CompositeKind::Sequence), NodeConfig::new());
        assert!(tree.load_from_node(bad).is_err());
    }
}
