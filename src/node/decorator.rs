//! Single-child decorators (spec §4.1): `Inverter`, `Repeater`, `UntilSuccess`,
//! `UntilFailure`, `ForceSuccess`, `ForceFailure`, `RunOnce`.

use super::{Node, NodeKind, TickCtx};
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoratorKind {
    Inverter,
    /// Re-runs the child `count` times (or forever if `None`), succeeding once
    /// the count is exhausted; a child `Failure` aborts the whole decorator.
    Repeater { count: Option<u32> },
    /// Re-runs the child until it succeeds (or `max_attempts` is exhausted,
    /// whichever comes first); a child `Failure` before that just retries.
    UntilSuccess { max_attempts: Option<u32> },
    /// Mirror image of `UntilSuccess`: retries until the child fails.
    UntilFailure { max_attempts: Option<u32> },
    ForceSuccess,
    ForceFailure,
    /// Ticks the child exactly once across the node's lifetime; every
    /// subsequent tick replays the latched result without re-entering the child.
    RunOnce,
}

impl Node {
    pub(super) async fn tick_decorator(&mut self, ctx: &TickCtx) -> Status {
        let NodeKind::Decorator(kind) = self.kind else {
            unreachable!("tick_decorator called on non-Decorator node")
        };

        match kind {
            DecoratorKind::Inverter => self.tick_inverter(ctx).await,
            DecoratorKind::Repeater { count } => self.tick_repeater(ctx, count).await,
            DecoratorKind::UntilSuccess { max_attempts } => {
                self.tick_until(ctx, max_attempts, Status::Success).await
            }
            DecoratorKind::UntilFailure { max_attempts } => {
                self.tick_until(ctx, max_attempts, Status::Failure).await
            }
            DecoratorKind::ForceSuccess => self.tick_force(ctx, Status::Success).await,
            DecoratorKind::ForceFailure => self.tick_force(ctx, Status::Failure).await,
            DecoratorKind::RunOnce => self.tick_run_once(ctx).await,
        }
    }

    async fn child_tick(&mut self, ctx: &TickCtx) -> Status {
        let child_ctx = ctx.child("0");
        self.children[0].tick(&child_ctx).await
    }

    async fn tick_inverter(&mut self, ctx: &TickCtx) -> Status {
        match self.child_tick(ctx).await {
            Status::Success => Status::Failure,
            Status::Failure => Status::Success,
            Status::Running => Status::Running,
        }
    }

    async fn tick_force(&mut self, ctx: &TickCtx, forced: Status) -> Status {
        match self.child_tick(ctx).await {
            Status::Running => Status::Running,
            _ => forced,
        }
    }

    /// Re-ticks the child within this same call (spec §4.1: "re-ticks in the
    /// same tick until counter reaches `count`"), rather than returning
    /// `Running` to the caller after every single child success.
    async fn tick_repeater(&mut self, ctx: &TickCtx, count: Option<u32>) -> Status {
        if count == Some(0) {
            return Status::Success;
        }

        loop {
            match self.child_tick(ctx).await {
                Status::Running => return Status::Running,
                Status::Failure => {
                    self.attempt_count = 0;
                    self.children[0].reset();
                    return Status::Failure;
                }
                Status::Success => {
                    self.attempt_count += 1;
                    self.children[0].reset();
                    if count.is_some_and(|n| self.attempt_count >= n) {
                        self.attempt_count = 0;
                        return Status::Success;
                    }
                }
            }
        }
    }

    /// Shared engine for `UntilSuccess`/`UntilFailure`: retries the child,
    /// within this same call, until it reports `target` or until
    /// `max_attempts` is exhausted, in which case the decorator gives up and
    /// reports the opposite of `target`.
    async fn tick_until(&mut self, ctx: &TickCtx, max_attempts: Option<u32>, target: Status) -> Status {
        let opposite = if target == Status::Success {
            Status::Failure
        } else {
            Status::Success
        };

        loop {
            match self.child_tick(ctx).await {
                Status::Running => return Status::Running,
                status if status == target => {
                    self.attempt_count = 0;
                    self.children[0].reset();
                    return target;
                }
                _ => {
                    self.attempt_count += 1;
                    self.children[0].reset();
                    if max_attempts.is_some_and(|n| self.attempt_count >= n) {
                        self.attempt_count = 0;
                        return opposite;
                    }
                }
            }
        }
    }

    async fn tick_run_once(&mut self, ctx: &TickCtx) -> Status {
        if let Some(result) = self.run_once_result {
            return result;
        }

        match self.child_tick(ctx).await {
            Status::Running => Status::Running,
            status => {
                self.run_once_result = Some(status);
                status
            }
        }
    }
}
