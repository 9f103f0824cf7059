//! Async behavior-tree execution engine with multi-tree forest coordination.
//!
//! A [`tree::BehaviorTree`] owns a root [`node::Node`], a [`blackboard::Blackboard`],
//! and an [`events::EventBus`]; ticking the root propagates down the node
//! graph and the three leaf statuses (`Success`/`Failure`/`Running`)
//! aggregate back up according to each composite's policy. A [`forest::Forest`]
//! ticks several such trees concurrently, wiring them together with typed
//! [`middleware`] channels (pub/sub, request/response, a shared blackboard,
//! state watching, a task board, and cross-tree behavior calls).
//!
//! Trees are built either programmatically ([`node::Node`] constructors) or
//! declaratively from XML via [`xml::load_tree`]/[`xml::load_forest`], with
//! user node types supplied through a [`registry::NodeRegistry`].

pub mod blackboard;
pub mod error;
pub mod events;
pub mod forest;
pub mod middleware;
pub mod node;
pub mod registry;
pub mod status;
pub mod tree;
pub mod xml;

pub use blackboard::Blackboard;
pub use error::{BtError, BtResult};
pub use events::{EventBus, Payload, Subscription};
pub use forest::{Forest, ForestNode, ForestRole, RunState};
pub use node::{Node, NodeConfig, TickCtx};
pub use registry::{NodeFactory, NodeMetadata, NodeRegistry};
pub use status::{Policy, Status};
pub use tree::BehaviorTree;
