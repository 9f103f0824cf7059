//! The polymorphic node hierarchy (spec §3/§4.1/§4.2), re-expressed as a
//! tagged `NodeKind` variant per the spec's own design note (§9): Rust's sum
//! types make the class-per-node-kind approach the teacher's derive macros
//! exist to fake unnecessary here.

mod action;
mod builtin;
mod composite;
mod decorator;

pub use action::{ActionFn, ConditionFn};
pub use builtin::CompareOp;
pub use composite::CompositeKind;
pub use decorator::DecoratorKind;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;

use crate::blackboard::Blackboard;
use crate::error::BtResult;
use crate::events::{EventBus, Payload};
use crate::status::{Policy, Status};

/// Kind-specific, string-keyed configuration, frozen after construction
/// (spec §3). Populated either programmatically or from XML attributes.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    params: HashMap<String, String>,
}

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.params.get(key).and_then(|v| v.parse().ok())
    }

    pub fn from_attrs(attrs: HashMap<String, String>) -> Self {
        Self { params: attrs }
    }
}

/// Cooperative cancellation signal shared by every node in a tree (spec §5).
/// Reaching a suspension point while cancelled must yield `Running`, not an error.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ambient context threaded through every tick (spec §4.1): blackboard and
/// event bus references, the cancellation signal, and the node's tree path
/// (used to label `node.status.changed` events).
#[derive(Clone)]
pub struct TickCtx {
    pub blackboard: Blackboard,
    pub events: EventBus,
    pub cancellation: CancellationToken,
    pub path: String,
}

impl TickCtx {
    pub fn child(&self, segment: &str) -> TickCtx {
        TickCtx {
            blackboard: self.blackboard.clone(),
            events: self.events.clone(),
            cancellation: self.cancellation.clone(),
            path: format!("{}/{}", self.path, segment),
        }
    }
}

/// Discriminator for the node's behavior (spec §3 `kind`).
pub enum NodeKind {
    Action(ActionFn),
    Condition(ConditionFn),
    Decorator(DecoratorKind),
    Composite(CompositeKind),
    Log,
    Wait,
    SetBlackboard,
    CheckBlackboard,
    Compare(CompareOp),
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NodeKind::Action(_) => "Action",
            NodeKind::Condition(_) => "Condition",
            NodeKind::Decorator(d) => return write!(f, "Decorator({d:?})"),
            NodeKind::Composite(c) => return write!(f, "Composite({c:?})"),
            NodeKind::Log => "Log",
            NodeKind::Wait => "Wait",
            NodeKind::SetBlackboard => "SetBlackboard",
            NodeKind::CheckBlackboard => "CheckBlackboard",
            NodeKind::Compare(_) => "Compare",
        };
        write!(f, "{text}")
    }
}

/// The central entity (spec §3). Owns its children exclusively; the tree
/// owns the root. `running_child_index` / decorator counters / `wait_deadline`
/// hold whatever resume state a suspended composite or decorator needs, so
/// `reset()` is a single cheap field wipe rather than a live coroutine handle
/// (spec §9, "Coroutines → explicit state machines").
pub struct Node {
    pub name: String,
    pub(crate) kind: NodeKind,
    pub(crate) children: Vec<Node>,
    pub(crate) status: Status,
    pub(crate) config: NodeConfig,

    /// Sequence/Selector resume point.
    pub(crate) running_child_index: usize,
    /// Parallel's per-child completed status this round; `None` entries are
    /// still pending or running and get re-ticked.
    pub(crate) parallel_done: Vec<Option<Status>>,

    /// Repeater/UntilSuccess/UntilFailure counters.
    pub(crate) attempt_count: u32,
    /// RunOnce latch.
    pub(crate) run_once_result: Option<Status>,
    /// Wait's absolute deadline, re-checked on each re-entry.
    pub(crate) wait_deadline: Option<Instant>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind, config: NodeConfig) -> Self {
        Self {
            name: name.into(),
            kind,
            children: Vec::new(),
            status: Status::Failure,
            config,
            running_child_index: 0,
            parallel_done: Vec::new(),
            attempt_count: 0,
            run_once_result: None,
            wait_deadline: None,
        }
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    pub fn action(name: impl Into<String>, config: NodeConfig, f: ActionFn) -> Self {
        Self::new(name, NodeKind::Action(f), config)
    }

    pub fn condition(name: impl Into<String>, config: NodeConfig, f: ConditionFn) -> Self {
        Self::new(name, NodeKind::Condition(f), config)
    }

    pub fn sequence(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self::new(name, NodeKind::Composite(CompositeKind::Sequence), NodeConfig::new())
            .with_children(children)
    }

    pub fn selector(name: impl Into<String>, children: Vec<Node>) -> Self {
        Self::new(name, NodeKind::Composite(CompositeKind::Selector), NodeConfig::new())
            .with_children(children)
    }

    pub fn parallel(name: impl Into<String>, policy: Policy, children: Vec<Node>) -> Self {
        Self::new(name, NodeKind::Composite(CompositeKind::Parallel(policy)), NodeConfig::new())
            .with_children(children)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn running_child_index(&self) -> usize {
        self.running_child_index
    }

    /// Resets this node (and, recursively, its children) to the post-construction
    /// state: `status = Failure`, resume indices zeroed, counters cleared.
    /// Any child left `Running` is halted first (spec §9 supplemental: resetting
    /// a suspended subtree must not leak its in-flight state).
    pub fn reset(&mut self) {
        self.status = Status::Failure;
        self.running_child_index = 0;
        self.parallel_done.clear();
        self.attempt_count = 0;
        self.run_once_result = None;
        self.wait_deadline = None;
        for child in &mut self.children {
            child.reset();
        }
    }

    /// Validates arity: decorators need exactly one child, composites/leaves
    /// have no arity restriction beyond what the spec allows (spec §3 invariants).
    pub fn validate(&self) -> BtResult<()> {
        use crate::error::BtError;

        if self.name.trim().is_empty() {
            return Err(BtError::InvalidTree("node name must not be empty".into()));
        }

        if matches!(self.kind, NodeKind::Decorator(_)) && self.children.len() != 1 {
            return Err(BtError::InvalidTree(format!(
                "decorator '{}' must have exactly 1 child, found {}",
                self.name,
                self.children.len()
            )));
        }

        if matches!(
            self.kind,
            NodeKind::Action(_)
                | NodeKind::Condition(_)
                | NodeKind::Log
                | NodeKind::Wait
                | NodeKind::SetBlackboard
                | NodeKind::CheckBlackboard
                | NodeKind::Compare(_)
        ) && !self.children.is_empty()
        {
            return Err(BtError::InvalidTree(format!(
                "leaf node '{}' must have no children",
                self.name
            )));
        }

        for child in &self.children {
            child.validate()?;
        }

        Ok(())
    }

    /// Ticks this node. A tick never returns anything but `Success`, `Failure`,
    /// or `Running` — leaf errors are absorbed into `Failure` plus an `error`
    /// event (spec §4.1/§7).
    pub fn tick<'a>(&'a mut self, ctx: &'a TickCtx) -> BoxFuture<'a, Status> {
        Box::pin(async move {
            if ctx.cancellation.is_cancelled() {
                return Status::Running;
            }

            let old = self.status;
            let new = match &self.kind {
                NodeKind::Action(_) => self.tick_action(ctx).await,
                NodeKind::Condition(_) => self.tick_condition(ctx).await,
                NodeKind::Log => self.tick_log(ctx).await,
                NodeKind::Wait => self.tick_wait(ctx).await,
                NodeKind::SetBlackboard => self.tick_set_blackboard(ctx).await,
                NodeKind::CheckBlackboard => self.tick_check_blackboard(ctx).await,
                NodeKind::Compare(_) => self.tick_compare(ctx).await,
                NodeKind::Decorator(_) => self.tick_decorator(ctx).await,
                NodeKind::Composite(_) => self.tick_composite(ctx).await,
            };

            self.status = new;
            if old != new {
                ctx.events.emit(
                    "node.status.changed",
                    Payload::new((ctx.path.clone(), old, new)),
                );
            }
            new
        })
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("children", &self.children.len())
            .finish()
    }
}

pub(crate) fn duration_from_secs_str(s: &str) -> Option<Duration> {
    s.parse::<f64>().ok().map(Duration::from_secs_f64)
}
