//! Runs the forest pub/sub scenario from the engine's testable-properties
//! walkthrough: three trees ticked together, one of which publishes an
//! `alert` the other two have subscribed to.
//!
//! Run with `RUST_LOG=debug cargo run --example forest_pubsub`.

use std::sync::{Arc, Mutex as StdMutex};

use behaviortree_forest::forest::{Forest, ForestNode, ForestRole};
use behaviortree_forest::middleware::PubSub;
use behaviortree_forest::{BehaviorTree, Node, NodeConfig, Status};
use tokio::sync::Mutex;

fn noop_tree(name: &str) -> BehaviorTree {
    let mut tree = BehaviorTree::new(name);
    tree.load_from_node(Node::action(
        "noop",
        NodeConfig::new(),
        Arc::new(|_bb| Box::pin(async { Ok(Status::Success) })),
    ))
    .expect("valid tree");
    tree
}

#[tokio::main]
async fn main() {
    pretty_env_logger::init();

    let pubsub = Arc::new(PubSub::new("alerts"));
    let received = Arc::new(StdMutex::new(Vec::new()));

    for name in ["R1", "R3"] {
        let received = Arc::clone(&received);
        pubsub
            .subscribe("alert", move |payload| {
                let received = Arc::clone(&received);
                let name = name.to_string();
                Box::pin(async move {
                    if let Some(message) = payload.downcast_ref::<String>() {
                        received.lock().unwrap().push((name, message.clone()));
                    }
                    Ok(())
                })
            })
            .await;
    }

    let mut forest = Forest::new("patrol");
    forest
        .add_node(ForestNode::new("R1", ForestRole::Worker, Arc::new(Mutex::new(noop_tree("R1")))))
        .await
        .unwrap();
    forest
        .add_node(ForestNode::new("R2", ForestRole::Worker, Arc::new(Mutex::new(noop_tree("R2")))))
        .await
        .unwrap();
    forest
        .add_node(ForestNode::new("R3", ForestRole::Worker, Arc::new(Mutex::new(noop_tree("R3")))))
        .await
        .unwrap();
    forest.start().await.unwrap();

    pubsub.publish("alert", behaviortree_forest::Payload::new("intruder".to_string()));
    let statuses = forest.tick().await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    println!("tick results: {statuses:?}");
    println!("subscribers observed: {:?}", received.lock().unwrap());

    forest.stop().await.unwrap();
}
