//! Closed status/policy enums shared by every node and middleware.

use std::fmt;

/// Outcome of a single node tick. `Running` is the only status that must be
/// remembered across ticks (see [`crate::node::Node::running_child_index`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Failure,
    Running,
}

impl Status {
    pub fn is_completed(self) -> bool {
        matches!(self, Status::Success | Status::Failure)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Status::Success => "SUCCESS",
            Status::Failure => "FAILURE",
            Status::Running => "RUNNING",
        };
        write!(f, "{text}")
    }
}

/// Aggregation policy for a `Parallel` composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Succeeds as soon as one child succeeds; fails only once all children fail.
    RequireOne,
    /// Succeeds only once all children succeed; fails as soon as one child fails.
    RequireAll,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Policy::RequireOne => "REQUIRE_ONE",
            Policy::RequireAll => "REQUIRE_ALL",
        };
        write!(f, "{text}")
    }
}
