//! A set of behavior trees ticked concurrently, wired together by typed
//! middleware channels (spec §3 `Forest`/`ForestNode`, §4.8).

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{debug, info, warn};
use tokio::sync::{Mutex, Notify};

use crate::error::{BtError, BtResult};
use crate::middleware::Middleware;
use crate::status::Status;
use crate::tree::BehaviorTree;

/// Advisory role (spec §3 `ForestNode.node_type`). Affects only the default
/// middleware wiring a caller chooses to set up — the engine does not key
/// any behavior off it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForestRole {
    Master,
    Worker,
    Monitor,
    Coordinator,
}

/// One tree wired into a [`Forest`]: its identity, advisory role, the
/// capabilities `TaskBoard`/`BehaviorCall` route by, and the other forest
/// nodes that must complete a tick round before this one starts.
///
/// The tree itself is `Arc<Mutex<..>>` rather than owned outright because
/// middleware variants (`StateWatch`, `BehaviorCall`) need their own handle
/// to it independent of the forest's own tick loop.
pub struct ForestNode {
    name: String,
    role: ForestRole,
    capabilities: HashSet<String>,
    dependencies: Vec<String>,
    tree: Arc<Mutex<BehaviorTree>>,
}

impl ForestNode {
    pub fn new(name: impl Into<String>, role: ForestRole, tree: Arc<Mutex<BehaviorTree>>) -> Self {
        Self {
            name: name.into(),
            role,
            capabilities: HashSet::new(),
            dependencies: Vec::new(),
            tree,
        }
    }

    pub fn with_capabilities(mut self, capabilities: HashSet<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ForestRole {
        self.role
    }

    pub fn capabilities(&self) -> &HashSet<String> {
        &self.capabilities
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn tree(&self) -> &Arc<Mutex<BehaviorTree>> {
        &self.tree
    }

    /// Convenience accessor middlewares use to bridge onto this node's
    /// blackboard without holding the tree lock for the whole forest tick.
    pub async fn blackboard(&self) -> crate::blackboard::Blackboard {
        self.tree.lock().await.blackboard().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Stopped,
}

/// A set of trees ticked together (spec §3/§4.8). Dependencies partition
/// each round into a topological layering; trees within one layer tick
/// concurrently, layers run in order.
pub struct Forest {
    name: String,
    nodes: HashMap<String, ForestNode>,
    middlewares: Vec<(String, Arc<dyn Middleware>)>,
    state: RunState,
    round: u64,
    stop_signal: Arc<Notify>,
}

impl Forest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            middlewares: Vec::new(),
            state: RunState::Idle,
            round: 0,
            stop_signal: Arc::new(Notify::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Registers a tree under the forest. Names must be unique; disallowed
    /// while the forest is `Running` (spec §4.8).
    pub async fn add_node(&mut self, node: ForestNode) -> BtResult<()> {
        if self.state == RunState::Running {
            return Err(BtError::InvalidForestState(self.state));
        }
        if self.nodes.contains_key(&node.name) {
            return Err(BtError::InvalidTree(format!(
                "forest node name '{}' already registered",
                node.name
            )));
        }

        for (_, middleware) in &self.middlewares {
            middleware.on_node_added(&node).await;
        }
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    pub async fn remove_node(&mut self, name: &str) -> BtResult<()> {
        if self.state == RunState::Running {
            return Err(BtError::InvalidForestState(self.state));
        }
        if self.nodes.remove(name).is_none() {
            return Err(BtError::UnknownNodeType(name.to_string()));
        }
        for (_, middleware) in &self.middlewares {
            middleware.on_node_removed(name).await;
        }
        Ok(())
    }

    pub fn add_middleware(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        self.middlewares.push((name.into(), middleware));
    }

    pub async fn remove_middleware(&mut self, name: &str) -> BtResult<()> {
        let index = self
            .middlewares
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| BtError::InvalidTree(format!("no middleware named '{name}'")))?;
        let (_, middleware) = self.middlewares.remove(index);
        middleware.stop().await
    }

    /// Starts every middleware in registration order. If one fails partway,
    /// already-started middlewares are stopped in reverse order and the
    /// forest stays `Idle` (spec §4.8).
    pub async fn start(&mut self) -> BtResult<()> {
        if self.state != RunState::Idle {
            return Err(BtError::InvalidForestState(self.state));
        }

        for (index, (name, middleware)) in self.middlewares.iter().enumerate() {
            if let Err(err) = middleware.start().await {
                warn!("forest '{}' middleware '{name}' failed to start: {err}", self.name);
                for (rollback_name, rollback) in self.middlewares[..index].iter().rev() {
                    if let Err(stop_err) = rollback.stop().await {
                        warn!(
                            "forest '{}' rollback stop of middleware '{rollback_name}' failed: {stop_err}",
                            self.name
                        );
                    }
                }
                return Err(err);
            }
        }

        self.state = RunState::Running;
        info!("forest '{}' started with {} node(s)", self.name, self.nodes.len());
        Ok(())
    }

    /// Idempotent: calling `stop()` on an already-stopped forest is a no-op.
    /// Cancels every in-progress tick, stops middlewares in reverse
    /// registration order, and transitions to `Stopped`.
    pub async fn stop(&mut self) -> BtResult<()> {
        if self.state == RunState::Stopped {
            return Ok(());
        }

        if self.state == RunState::Running {
            for node in self.nodes.values() {
                node.tree.lock().await.cancellation().cancel();
            }
            for (name, middleware) in self.middlewares.iter().rev() {
                if let Err(err) = middleware.stop().await {
                    warn!("forest '{}' middleware '{name}' failed to stop: {err}", self.name);
                }
            }
        }

        self.state = RunState::Stopped;
        self.stop_signal.notify_waiters();
        info!("forest '{}' stopped", self.name);
        Ok(())
    }

    /// Partitions nodes into dependency layers via Kahn's algorithm. Returns
    /// one `Vec<String>` per layer, in the order layers must run.
    fn dependency_layers(&self) -> BtResult<Vec<Vec<String>>> {
        let mut indegree: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for node in self.nodes.values() {
            indegree.entry(node.name.as_str()).or_insert(0);
            for dep in &node.dependencies {
                if !self.nodes.contains_key(dep) {
                    return Err(BtError::UnknownDependency(dep.clone()));
                }
                *indegree.entry(node.name.as_str()).or_insert(0) += 1;
                dependents.entry(dep.as_str()).or_default().push(node.name.as_str());
            }
        }

        let mut layers = Vec::new();
        let mut frontier: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&name, _)| name)
            .collect();
        let mut remaining = indegree.clone();
        let mut visited = 0usize;

        while !frontier.is_empty() {
            let layer: Vec<String> = frontier.iter().map(|s| s.to_string()).collect();
            visited += layer.len();
            let mut next_frontier = VecDeque::new();

            for &name in &frontier {
                for &dependent in dependents.get(name).unwrap_or(&Vec::new()) {
                    let degree = remaining.get_mut(dependent).expect("dependent tracked in indegree");
                    *degree -= 1;
                    if *degree == 0 {
                        next_frontier.push_back(dependent);
                    }
                }
            }

            layers.push(layer);
            frontier = next_frontier;
        }

        if visited != self.nodes.len() {
            let cyclic: Vec<String> = remaining
                .iter()
                .filter(|(_, &deg)| deg > 0)
                .map(|(&name, _)| name.to_string())
                .collect();
            return Err(BtError::CyclicDependency(cyclic));
        }

        Ok(layers)
    }

    /// Runs one round over every tree (spec §4.8): dependency layers tick in
    /// order, trees within a layer tick concurrently. Calls every
    /// middleware's `before_tick`/`after_tick` once for the whole round.
    pub async fn tick(&mut self) -> BtResult<HashMap<String, Status>> {
        if self.state != RunState::Running {
            return Err(BtError::InvalidForestState(self.state));
        }

        let layers = self.dependency_layers()?;
        self.round += 1;
        let round = self.round;

        for (_, middleware) in &self.middlewares {
            middleware.before_tick(round).await;
        }

        let mut results = HashMap::with_capacity(self.nodes.len());
        for layer in layers {
            let futures = layer.iter().map(|name| {
                let tree = Arc::clone(&self.nodes[name].tree);
                let name = name.clone();
                async move {
                    let status = tree.lock().await.tick().await;
                    (name, status)
                }
            });

            for (name, status) in join_all(futures).await {
                match status {
                    Ok(status) => {
                        results.insert(name, status);
                    }
                    Err(err) => {
                        debug!("forest '{}' tree '{name}' tick failed: {err}", self.name);
                        results.insert(name, Status::Failure);
                    }
                }
            }
        }

        for (_, middleware) in &self.middlewares {
            middleware.after_tick(round, &results).await;
        }

        Ok(results)
    }

    /// Ticks repeatedly at `interval` until [`Forest::stop`] is called.
    /// Drift is compensated per tick — `tokio::time::interval` schedules the
    /// next fire at `start + n * interval`, not `now + interval`, so a slow
    /// round does not push every later tick back by the same amount.
    pub async fn run(&mut self, interval: Duration) -> BtResult<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Burst);
        let stop_signal = Arc::clone(&self.stop_signal);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.state != RunState::Running {
                        break;
                    }
                    self.tick().await?;
                }
                _ = stop_signal.notified() => break,
            }
        }

        Ok(())
    }
}

impl fmt::Debug for Forest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forest")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeConfig};
    use std::sync::Arc;
    use tokio::sync::Mutex as TokioMutex;

    fn success_node(name: &str) -> ForestNode {
        let mut tree = BehaviorTree::new(name);
        tree.load_from_node(Node::action(
            "noop",
            NodeConfig::new(),
            Arc::new(|_bb| Box::pin(async { Ok(Status::Success) })),
        ))
        .unwrap();
        ForestNode::new(name, ForestRole::Worker, Arc::new(TokioMutex::new(tree)))
    }

    #[tokio::test]
    async fn tick_requires_running_state() {
        let mut forest = Forest::new("f");
        forest.add_node(success_node("A")).await.unwrap();
        assert!(matches!(
            forest.tick().await.unwrap_err(),
            BtError::InvalidForestState(RunState::Idle)
        ));
    }

    #[tokio::test]
    async fn tick_ticks_every_node() {
        let mut forest = Forest::new("f");
        forest.add_node(success_node("A")).await.unwrap();
        forest.add_node(success_node("B")).await.unwrap();
        forest.start().await.unwrap();

        let results = forest.tick().await.unwrap();
        assert_eq!(results.get("A"), Some(&Status::Success));
        assert_eq!(results.get("B"), Some(&Status::Success));
    }

    #[tokio::test]
    async fn dependency_order_is_respected() {
        let mut forest = Forest::new("f");
        forest.add_node(success_node("A")).await.unwrap();
        forest
            .add_node(success_node("B").with_dependencies(vec!["A".to_string()]))
            .await
            .unwrap();
        forest
            .add_node(success_node("C").with_dependencies(vec!["A".to_string()]))
            .await
            .unwrap();
        forest.start().await.unwrap();

        let layers = forest.dependency_layers().unwrap();
        assert_eq!(layers[0], vec!["A".to_string()]);
        assert_eq!(layers[1].len(), 2);

        let results = forest.tick().await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn unknown_dependency_fails() {
        let mut forest = Forest::new("f");
        forest
            .add_node(success_node("A").with_dependencies(vec!["ghost".to_string()]))
            .await
            .unwrap();
        forest.start().await.unwrap();
        assert!(matches!(
            forest.tick().await.unwrap_err(),
            BtError::UnknownDependency(name) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn cyclic_dependency_fails() {
        let mut forest = Forest::new("f");
        forest
            .add_node(success_node("A").with_dependencies(vec!["B".to_string()]))
            .await
            .unwrap();
        forest
            .add_node(success_node("B").with_dependencies(vec!["A".to_string()]))
            .await
            .unwrap();
        forest.start().await.unwrap();
        assert!(matches!(forest.tick().await.unwrap_err(), BtError::CyclicDependency(_)));
    }

    #[tokio::test]
    async fn mutation_disallowed_while_running() {
        let mut forest = Forest::new("f");
        forest.start().await.unwrap();
        assert!(matches!(
            forest.add_node(success_node("A")).await.unwrap_err(),
            BtError::InvalidForestState(RunState::Running)
        ));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let mut forest = Forest::new("f");
        forest.start().await.unwrap();
        forest.stop().await.unwrap();
        forest.stop().await.unwrap();
        assert_eq!(forest.state(), RunState::Stopped);
    }

    #[tokio::test]
    async fn remove_unknown_node_fails_with_unknown_node_type() {
        let mut forest = Forest::new("f");
        assert!(matches!(
            forest.remove_node("ghost").await.unwrap_err(),
            BtError::UnknownNodeType(name) if name == "ghost"
        ));
    }
}
