//! Built-in leaves that need no user code: `Log`, `Wait`, `SetBlackboard`,
//! `CheckBlackboard`, `Compare` (spec §4.2).

use std::time::Instant;

use tokio::time::Duration;

use super::{duration_from_secs_str, Node, NodeKind, TickCtx};
use crate::blackboard::Blackboard;
use crate::events::Payload;
use crate::status::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "==" | "eq" => Self::Eq,
            "!=" | "ne" => Self::Ne,
            "<" | "lt" => Self::Lt,
            "<=" | "le" => Self::Le,
            ">" | "gt" => Self::Gt,
            ">=" | "ge" => Self::Ge,
            _ => return None,
        })
    }

    fn eval(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
            Self::Lt => ordering == Less,
            Self::Le => ordering != Greater,
            Self::Gt => ordering == Greater,
            Self::Ge => ordering != Less,
        }
    }
}

/// Resolves `"{key}"` as a blackboard lookup (rendered to its `Debug` text,
/// since the blackboard is type-erased) and anything else as a literal.
async fn resolve(blackboard: &Blackboard, token: &str) -> Option<String> {
    if let Some(key) = token.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        read_as_string(blackboard, key).await
    } else {
        Some(token.to_string())
    }
}

async fn read_as_string(blackboard: &Blackboard, key: &str) -> Option<String> {
    if let Some(v) = blackboard.get::<String>(key).await {
        return Some(v);
    }
    if let Some(v) = blackboard.get::<bool>(key).await {
        return Some(v.to_string());
    }
    if let Some(v) = blackboard.get::<i64>(key).await {
        return Some(v.to_string());
    }
    if let Some(v) = blackboard.get::<f64>(key).await {
        return Some(v.to_string());
    }
    None
}

fn compare_values(left: &str, right: &str) -> std::cmp::Ordering {
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r).unwrap_or(std::cmp::Ordering::Equal),
        _ => left.cmp(right),
    }
}

impl Node {
    pub(super) async fn tick_log(&mut self, ctx: &TickCtx) -> Status {
        let message = self.config.get("message").unwrap_or("").to_string();
        ctx.events
            .emit("log", Payload::new(("message".to_string(), message)));
        Status::Success
    }

    /// Suspends for the configured duration, returning `Running` until the
    /// deadline (stored on the node, re-checked each re-entry) has passed.
    pub(super) async fn tick_wait(&mut self, ctx: &TickCtx) -> Status {
        let duration = self
            .config
            .get("duration")
            .and_then(duration_from_secs_str)
            .unwrap_or(Duration::ZERO);

        let deadline = *self.wait_deadline.get_or_insert_with(|| Instant::now() + duration);

        if duration.is_zero() {
            self.wait_deadline = None;
            return Status::Success;
        }

        if ctx.cancellation.is_cancelled() {
            return Status::Running;
        }

        if Instant::now() >= deadline {
            self.wait_deadline = None;
            Status::Success
        } else {
            Status::Running
        }
    }

    pub(super) async fn tick_set_blackboard(&mut self, ctx: &TickCtx) -> Status {
        let key = match self.config.get("key") {
            Some(k) => k.to_string(),
            None => return Status::Failure,
        };
        let value = self.config.get("value").unwrap_or("").to_string();
        ctx.blackboard.set(key, value).await;
        Status::Success
    }

    pub(super) async fn tick_check_blackboard(&mut self, ctx: &TickCtx) -> Status {
        let key = match self.config.get("key") {
            Some(k) => k,
            None => return Status::Failure,
        };
        let expected = self.config.get("expected_value").unwrap_or("");

        match read_as_string(&ctx.blackboard, key).await {
            Some(actual) if actual == expected => Status::Success,
            _ => Status::Failure,
        }
    }

    pub(super) async fn tick_compare(&mut self, ctx: &TickCtx) -> Status {
        let NodeKind::Compare(op) = &self.kind else {
            unreachable!("tick_compare called on non-Compare node")
        };

        let left = self.config.get("left").unwrap_or("").to_string();
        let right = self.config.get("right").unwrap_or("").to_string();

        let (left, right) = match (
            resolve(&ctx.blackboard, &left).await,
            resolve(&ctx.blackboard, &right).await,
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => return Status::Failure,
        };

        if op.eval(compare_values(&left, &right)) {
            Status::Success
        } else {
            Status::Failure
        }
    }
}
