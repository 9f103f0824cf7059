//! `Action` and `Condition` leaves (spec §4.2). User behavior is a boxed
//! async closure — the registry's `create()` wraps whatever the caller
//! provides in one of these two function types.

use futures::future::BoxFuture;

use super::{Node, NodeKind, TickCtx};
use crate::blackboard::Blackboard;
use crate::events::Payload;
use crate::status::Status;

pub type ActionFn = std::sync::Arc<
    dyn Fn(Blackboard) -> BoxFuture<'static, Result<Status, anyhow::Error>> + Send + Sync,
>;
pub type ConditionFn = std::sync::Arc<
    dyn Fn(Blackboard) -> BoxFuture<'static, Result<bool, anyhow::Error>> + Send + Sync,
>;

impl Node {
    pub(super) async fn tick_action(&mut self, ctx: &TickCtx) -> Status {
        let NodeKind::Action(f) = &self.kind else {
            unreachable!("tick_action called on non-Action node")
        };

        match f(ctx.blackboard.clone()).await {
            Ok(status) => status,
            Err(err) => {
                ctx.events.emit(
                    "error",
                    Payload::new((ctx.path.clone(), "action_error".to_string(), err.to_string())),
                );
                Status::Failure
            }
        }
    }

    /// `Condition` never returns `Running`: true maps to `Success`, false to
    /// `Failure`, and an evaluation error is absorbed into `Failure` plus an
    /// `error` event, same as `Action` (spec §4.2).
    pub(super) async fn tick_condition(&mut self, ctx: &TickCtx) -> Status {
        let NodeKind::Condition(f) = &self.kind else {
            unreachable!("tick_condition called on non-Condition node")
        };

        match f(ctx.blackboard.clone()).await {
            Ok(true) => Status::Success,
            Ok(false) => Status::Failure,
            Err(err) => {
                ctx.events.emit(
                    "error",
                    Payload::new((ctx.path.clone(), "condition_error".to_string(), err.to_string())),
                );
                Status::Failure
            }
        }
    }
}
