//! Runs the door-decision scenario from the engine's testable-properties
//! walkthrough: `Selector[Sequence[CheckBlackboard(door_open==true), Log,
//! Wait(0)]]` against a blackboard where the door is already open.
//!
//! Run with `RUST_LOG=debug cargo run --example door_decision`.

use behaviortree_forest::node::{CompositeKind, NodeKind};
use behaviortree_forest::{BehaviorTree, Node, NodeConfig, Status};

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let root = Node::new(
        "root",
        NodeKind::Composite(CompositeKind::Selector),
        NodeConfig::new(),
    )
    .with_children(vec![Node::new(
        "approach",
        NodeKind::Composite(CompositeKind::Sequence),
        NodeConfig::new(),
    )
    .with_children(vec![
        Node::new(
            "door_is_open",
            NodeKind::CheckBlackboard,
            NodeConfig::new().with("key", "door_open").with("expected_value", "true"),
        ),
        Node::new("announce", NodeKind::Log, NodeConfig::new().with("message", "closing")),
        Node::new("settle", NodeKind::Wait, NodeConfig::new().with("duration", "0")),
    ])]);

    let mut tree = BehaviorTree::new("door");
    tree.load_from_node(root).expect("valid tree");

    tree.blackboard().set("door_open", "true".to_string()).await;
    tree.events()
        .on("log", |payload| {
            Box::pin(async move {
                if let Some((_, message)) = payload.downcast_ref::<(String, String)>() {
                    println!("log: {message}");
                }
                Ok(())
            })
        })
        .await;

    let status = tree.tick().await.expect("tick succeeds");
    assert_eq!(status, Status::Success);
    println!("door scenario finished: {status}");
}
