//! Typed inter-tree communication primitives attached to a [`crate::forest::Forest`]
//! (spec §4.9). The source models each channel as a class with ad-hoc methods;
//! spec §9 ("Middlewares as variants") asks for a closed set of typed channels
//! instead, each implementing one shared lifecycle plus its own statically
//! known operations — the forest holds them as `dyn Middleware` trait objects
//! keyed by name, and callers request a concrete variant by downcasting.

mod behavior_call;
mod pubsub;
mod reqresp;
mod shared_blackboard;
mod state_watch;
mod task_board;

pub use behavior_call::BehaviorCall;
pub use pubsub::PubSub;
pub use reqresp::ReqResp;
pub use shared_blackboard::SharedBlackboard;
pub use state_watch::StateWatch;
pub use task_board::TaskBoard;

use std::any::Any;
use std::collections::HashMap;

use futures::future::BoxFuture;

use crate::error::BtResult;
use crate::forest::ForestNode;
use crate::status::Status;

/// Shared lifecycle every middleware variant implements (spec §4.9): started
/// in forest-registration order, stopped in reverse, and notified around
/// every forest tick round.
pub trait Middleware: Send + Sync + Any {
    fn name(&self) -> &str;

    fn start(&self) -> BoxFuture<'_, BtResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn stop(&self) -> BoxFuture<'_, BtResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn before_tick(&self, _round: u64) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn after_tick<'a>(&'a self, _round: u64, _results: &'a HashMap<String, Status>) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    /// Called once per [`crate::forest::Forest::add_node`] so variants that
    /// route by forest-node identity (`TaskBoard`, `StateWatch`,
    /// `BehaviorCall`) can index the new node without the forest knowing
    /// which concrete variants care.
    fn on_node_added<'a>(&'a self, _node: &'a ForestNode) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    fn on_node_removed<'a>(&'a self, _name: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }

    fn as_any(&self) -> &dyn Any;
}

/// Downcasts a registered middleware to one of the six concrete variants,
/// failing at request time on a name/variant mismatch (spec §9).
pub fn downcast<T: Middleware + 'static>(mw: &dyn Middleware) -> Option<&T> {
    mw.as_any().downcast_ref::<T>()
}
