//! `Sequence`, `Selector`, and `Parallel` composites (spec §4.1).

use futures::future::join_all;

use super::{Node, NodeKind, TickCtx};
use crate::status::{Policy, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeKind {
    Sequence,
    Selector,
    Parallel(Policy),
}

impl Node {
    pub(super) async fn tick_composite(&mut self, ctx: &TickCtx) -> Status {
        let NodeKind::Composite(kind) = &self.kind else {
            unreachable!("tick_composite called on non-Composite node")
        };

        match *kind {
            CompositeKind::Sequence => self.tick_sequence(ctx, true).await,
            CompositeKind::Selector => self.tick_sequence(ctx, false).await,
            CompositeKind::Parallel(policy) => self.tick_parallel(ctx, policy).await,
        }
    }

    /// Shared Sequence/Selector engine. `succeed_through` is `true` for
    /// Sequence (advances on `Success`, short-circuits on `Failure`) and
    /// `false` for Selector (advances on `Failure`, short-circuits on `Success`).
    /// An empty composite resolves immediately: Sequence to `Success`,
    /// Selector to `Failure`.
    async fn tick_sequence(&mut self, ctx: &TickCtx, succeed_through: bool) -> Status {
        if self.children.is_empty() {
            return if succeed_through {
                Status::Success
            } else {
                Status::Failure
            };
        }

        let advance_on = if succeed_through {
            Status::Success
        } else {
            Status::Failure
        };
        let short_circuit_on = if succeed_through {
            Status::Failure
        } else {
            Status::Success
        };

        while self.running_child_index < self.children.len() {
            let index = self.running_child_index;
            let child_ctx = ctx.child(&index.to_string());
            let child = &mut self.children[index];
            let status = child.tick(&child_ctx).await;

            if status == Status::Running {
                return Status::Running;
            }

            if status == short_circuit_on {
                self.running_child_index = 0;
                return short_circuit_on;
            }

            debug_assert_eq!(status, advance_on);
            self.running_child_index += 1;
        }

        self.running_child_index = 0;
        advance_on
    }

    /// Fans every not-yet-finished child out concurrently each tick (this is
    /// the one composite that genuinely parallelizes within a single tree;
    /// everything else ticks one linear task). `RequireOne` resolves to
    /// `Success` as soon as any child succeeds; `RequireAll` resolves to
    /// `Failure` as soon as any child fails. Children still `Running` when a
    /// decision is reached are reset so they don't leak state into the next
    /// tick of a fresh round.
    async fn tick_parallel(&mut self, ctx: &TickCtx, policy: Policy) -> Status {
        if self.children.is_empty() {
            return match policy {
                Policy::RequireOne => Status::Failure,
                Policy::RequireAll => Status::Success,
            };
        }

        if self.parallel_done.len() != self.children.len() {
            self.parallel_done = vec![None; self.children.len()];
        }

        // One `iter_mut()` pass hands out disjoint `&mut Node` borrows for every
        // still-pending child; indexing `self.children[i]` per future instead
        // would try to hold N overlapping mutable borrows of the same `Vec`.
        let done = &self.parallel_done;
        let pending: Vec<(usize, &mut Node)> = self
            .children
            .iter_mut()
            .enumerate()
            .zip(done.iter())
            .filter(|(_, status)| status.is_none())
            .map(|((i, child), _)| (i, child))
            .collect();

        let futures = pending.into_iter().map(|(i, child)| {
            let child_ctx = ctx.child(&i.to_string());
            async move { (i, child.tick(&child_ctx).await) }
        });
        let results = join_all(futures).await;

        for (i, status) in results {
            if status != Status::Running {
                self.parallel_done[i] = Some(status);
            }
        }

        let required = match policy {
            Policy::RequireOne => 1,
            Policy::RequireAll => self.children.len(),
        };

        let successes = self.parallel_done.iter().filter(|s| **s == Some(Status::Success)).count();
        let failures = self.parallel_done.iter().filter(|s| **s == Some(Status::Failure)).count();

        let decision = match policy {
            Policy::RequireOne if successes >= required => Some(Status::Success),
            Policy::RequireAll if failures >= 1 => Some(Status::Failure),
            Policy::RequireAll if successes >= required => Some(Status::Success),
            Policy::RequireOne if failures == self.children.len() => Some(Status::Failure),
            _ => None,
        };

        match decision {
            Some(status) => {
                for child in &mut self.children {
                    child.reset();
                }
                self.parallel_done.clear();
                status
            }
            None => Status::Running,
        }
    }
}
