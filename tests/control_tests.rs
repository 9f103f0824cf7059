//! Integration coverage for the composite/decorator control nodes against
//! the engine's own testable-properties scenarios (sequence RUNNING resume,
//! selector fallback, parallel aggregation).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use behaviortree_forest::node::{CompositeKind, DecoratorKind, NodeKind};
use behaviortree_forest::{BehaviorTree, Node, NodeConfig, Policy, Status};

fn action_returning(results: Vec<Status>) -> Node {
    let index = Arc::new(AtomicU32::new(0));
    Node::action(
        "scripted",
        NodeConfig::new(),
        Arc::new(move |_bb| {
            let index = Arc::clone(&index);
            let results = results.clone();
            Box::pin(async move {
                let i = index.fetch_add(1, Ordering::SeqCst) as usize;
                Ok(*results.get(i.min(results.len() - 1)).unwrap())
            })
        }),
    )
}

fn always(status: Status) -> Node {
    action_returning(vec![status])
}

#[tokio::test]
async fn sequence_resumes_at_running_child() {
    let calls = Arc::new(AtomicU32::new(0));
    let counted_calls = Arc::clone(&calls);

    let root = Node::sequence(
        "root",
        vec![
            always(Status::Success),
            action_returning(vec![Status::Running, Status::Success]),
            Node::action(
                "third",
                NodeConfig::new(),
                Arc::new(move |_bb| {
                    let counted_calls = Arc::clone(&counted_calls);
                    Box::pin(async move {
                        counted_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(Status::Success)
                    })
                }),
            ),
        ],
    );

    let mut tree = BehaviorTree::new("seq");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Running);
    assert_eq!(tree.tick().await.unwrap(), Status::Success);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "third action ticked exactly once");
}

#[tokio::test]
async fn selector_falls_back_to_first_success() {
    let evaluations = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&evaluations);

    let condition = Node::condition(
        "false_condition",
        NodeConfig::new(),
        Arc::new(move |_bb| {
            let counted = Arc::clone(&counted);
            Box::pin(async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            })
        }),
    );

    let root = Node::selector("root", vec![condition, always(Status::Success)]);

    let mut tree = BehaviorTree::new("sel");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Success);
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn parallel_require_all_resolves_failure_once_a_child_fails() {
    let root = Node::parallel(
        "root",
        Policy::RequireAll,
        vec![always(Status::Success), action_returning(vec![Status::Running, Status::Failure])],
    );

    let mut tree = BehaviorTree::new("par");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Running);
    assert_eq!(tree.tick().await.unwrap(), Status::Failure);
}

#[tokio::test]
async fn empty_composites_follow_boundary_rules() {
    let mut sequence_tree = BehaviorTree::new("empty-seq");
    sequence_tree.load_from_node(Node::sequence("root", vec![])).unwrap();
    assert_eq!(sequence_tree.tick().await.unwrap(), Status::Success);

    let mut selector_tree = BehaviorTree::new("empty-sel");
    selector_tree.load_from_node(Node::selector("root", vec![])).unwrap();
    assert_eq!(selector_tree.tick().await.unwrap(), Status::Failure);

    let mut parallel_one = BehaviorTree::new("empty-par-one");
    parallel_one
        .load_from_node(Node::parallel("root", Policy::RequireOne, vec![]))
        .unwrap();
    assert_eq!(parallel_one.tick().await.unwrap(), Status::Failure);

    let mut parallel_all = BehaviorTree::new("empty-par-all");
    parallel_all
        .load_from_node(Node::parallel("root", Policy::RequireAll, vec![]))
        .unwrap();
    assert_eq!(parallel_all.tick().await.unwrap(), Status::Success);
}

#[tokio::test]
async fn repeater_re_ticks_the_child_within_the_same_tick() {
    let ticked = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&ticked);
    let child = Node::action(
        "child",
        NodeConfig::new(),
        Arc::new(move |_bb| {
            let counted = Arc::clone(&counted);
            Box::pin(async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(Status::Success)
            })
        }),
    );

    let root = Node::new("repeat", NodeKind::Decorator(DecoratorKind::Repeater { count: Some(3) }), NodeConfig::new())
        .with_children(vec![child]);

    let mut tree = BehaviorTree::new("rep3");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Success);
    assert_eq!(ticked.load(Ordering::SeqCst), 3, "all three attempts happen in one tick() call");
}

#[tokio::test]
async fn repeater_stops_re_ticking_once_the_child_runs() {
    let root = Node::new("repeat", NodeKind::Decorator(DecoratorKind::Repeater { count: Some(3) }), NodeConfig::new())
        .with_children(vec![action_returning(vec![Status::Success, Status::Running, Status::Success])]);

    let mut tree = BehaviorTree::new("rep-running");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Running);
    assert_eq!(tree.tick().await.unwrap(), Status::Success);
}

#[tokio::test]
async fn until_success_re_ticks_within_the_same_tick_and_gives_up_after_max_attempts() {
    let root = Node::new(
        "until",
        NodeKind::Decorator(DecoratorKind::UntilSuccess { max_attempts: Some(2) }),
        NodeConfig::new(),
    )
    .with_children(vec![always(Status::Failure)]);

    let mut tree = BehaviorTree::new("until");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Failure, "opposite status reported once attempts are exhausted");
}

#[tokio::test]
async fn repeater_zero_never_ticks_child() {
    let ticked = Arc::new(AtomicU32::new(0));
    let counted = Arc::clone(&ticked);
    let child = Node::action(
        "child",
        NodeConfig::new(),
        Arc::new(move |_bb| {
            let counted = Arc::clone(&counted);
            Box::pin(async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(Status::Success)
            })
        }),
    );

    let root = Node::new("repeat", NodeKind::Decorator(DecoratorKind::Repeater { count: Some(0) }), NodeConfig::new())
        .with_children(vec![child]);

    let mut tree = BehaviorTree::new("rep");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Success);
    assert_eq!(ticked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn inverter_flips_terminal_status_but_not_running() {
    let root = Node::new("inv", NodeKind::Decorator(DecoratorKind::Inverter), NodeConfig::new())
        .with_children(vec![action_returning(vec![Status::Running, Status::Success])]);

    let mut tree = BehaviorTree::new("inv");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Running);
    assert_eq!(tree.tick().await.unwrap(), Status::Failure);
}

#[tokio::test]
async fn reset_zeroes_running_index_and_status() {
    let root = Node::sequence("root", vec![action_returning(vec![Status::Running, Status::Success]), always(Status::Success)]);
    let mut tree = BehaviorTree::new("reset");
    tree.load_from_node(root).unwrap();

    assert_eq!(tree.tick().await.unwrap(), Status::Running);
    tree.reset();
    assert_eq!(tree.last_status(), None);
}
