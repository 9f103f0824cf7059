//! A second blackboard visible to every tree in the forest (spec §4.9
//! `SharedBlackboard`). Same semantics as the per-tree [`crate::blackboard::Blackboard`]
//! (§4.3) — writes are totally ordered because there is exactly one
//! `Blackboard` instance, and its `RwLock` is the serialization point.

use std::any::Any;

use crate::blackboard::Blackboard;
use crate::middleware::Middleware;

pub struct SharedBlackboard {
    name: String,
    board: Blackboard,
}

impl SharedBlackboard {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            board: Blackboard::new(),
        }
    }

    pub fn board(&self) -> &Blackboard {
        &self.board
    }
}

impl Middleware for SharedBlackboard {
    fn name(&self) -> &str {
        &self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn visible_to_every_caller_sharing_the_middleware() {
        let shared = SharedBlackboard::new("shared");
        shared.board().set("mode", "patrol".to_string()).await;
        assert_eq!(shared.board().get::<String>("mode").await, Some("patrol".to_string()));
    }
}
