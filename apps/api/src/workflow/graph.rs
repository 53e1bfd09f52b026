//! State-graph engine: named nodes, static and conditional edges, sequential execution.
//!
//! A graph is assembled with [`StateGraph`], validated by [`StateGraph::compile`]
//! and run with [`CompiledGraph::invoke`]. Each node reads the current state and
//! returns a partial update which the state folds in via [`GraphState::apply`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::workflow::checkpoint::MemorySaver;

/// Virtual terminal node.
pub const END: &str = "__end__";

/// Matches LangGraph's default recursion limit.
pub const DEFAULT_RECURSION_LIMIT: usize = 25;

pub trait GraphState: Clone + Send + Sync + 'static {
    type Update: Send;

    fn apply(&mut self, update: Self::Update);
}

#[async_trait]
pub trait Node<S: GraphState>: Send + Sync {
    async fn run(&self, state: &S) -> anyhow::Result<S::Update>;
}

/// Picks the next node name (or [`END`]) from the state after a node ran.
pub type RouteFn<S> = Box<dyn Fn(&S) -> String + Send + Sync>;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Node '{from}' routed to unknown node '{to}'")]
    UnknownRoute { from: String, to: String },

    #[error("Recursion limit of {0} steps reached without hitting END")]
    RecursionLimit(usize),

    #[error("Node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: anyhow::Error,
    },
}

enum Transition<S> {
    Edge(String),
    Conditional(RouteFn<S>),
}

pub struct StateGraph<S: GraphState> {
    nodes: Vec<(String, Arc<dyn Node<S>>)>,
    transitions: Vec<(String, Transition<S>)>,
    entry: Option<String>,
    recursion_limit: usize,
}

impl<S: GraphState> StateGraph<S> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            transitions: Vec::new(),
            entry: None,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }

    pub fn add_node(mut self, name: &str, node: impl Node<S> + 'static) -> Self {
        self.nodes.push((name.to_string(), Arc::new(node)));
        self
    }

    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        self.transitions
            .push((from.to_string(), Transition::Edge(to.to_string())));
        self
    }

    pub fn add_conditional_edges<F>(mut self, from: &str, route: F) -> Self
    where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        self.transitions
            .push((from.to_string(), Transition::Conditional(Box::new(route))));
        self
    }

    pub fn set_entry_point(mut self, name: &str) -> Self {
        self.entry = Some(name.to_string());
        self
    }

    /// Validates the structure and freezes the graph.
    pub fn compile(
        self,
        checkpointer: Option<Arc<MemorySaver<S>>>,
    ) -> Result<CompiledGraph<S>, WorkflowError> {
        let mut nodes = HashMap::new();
        for (name, node) in self.nodes {
            if name == END {
                return Err(WorkflowError::InvalidGraph(format!(
                    "'{END}' is reserved and cannot be a node name"
                )));
            }
            if nodes.insert(name.clone(), node).is_some() {
                return Err(WorkflowError::InvalidGraph(format!(
                    "duplicate node '{name}'"
                )));
            }
        }

        let entry = self
            .entry
            .ok_or_else(|| WorkflowError::InvalidGraph("no entry point set".to_string()))?;
        if !nodes.contains_key(&entry) {
            return Err(WorkflowError::InvalidGraph(format!(
                "entry point '{entry}' is not a node"
            )));
        }

        let mut transitions = HashMap::new();
        for (from, transition) in self.transitions {
            if !nodes.contains_key(&from) {
                return Err(WorkflowError::InvalidGraph(format!(
                    "edge from unknown node '{from}'"
                )));
            }
            if let Transition::Edge(to) = &transition {
                if to != END && !nodes.contains_key(to) {
                    return Err(WorkflowError::InvalidGraph(format!(
                        "edge '{from}' -> '{to}' targets an unknown node"
                    )));
                }
            }
            if transitions.insert(from.clone(), transition).is_some() {
                return Err(WorkflowError::InvalidGraph(format!(
                    "node '{from}' has more than one outgoing edge"
                )));
            }
        }

        if let Some(dangling) = nodes.keys().find(|n| !transitions.contains_key(*n)) {
            return Err(WorkflowError::InvalidGraph(format!(
                "node '{dangling}' has no outgoing edge"
            )));
        }

        Ok(CompiledGraph {
            entry,
            nodes,
            transitions,
            checkpointer,
            recursion_limit: self.recursion_limit,
        })
    }
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CompiledGraph<S: GraphState> {
    entry: String,
    nodes: HashMap<String, Arc<dyn Node<S>>>,
    transitions: HashMap<String, Transition<S>>,
    checkpointer: Option<Arc<MemorySaver<S>>>,
    recursion_limit: usize,
}

impl<S: GraphState> CompiledGraph<S> {
    /// Runs the graph from the entry point until a node routes to [`END`].
    /// The state is checkpointed under `thread_id` after every node.
    pub async fn invoke(&self, initial: S, thread_id: &str) -> Result<S, WorkflowError> {
        let mut state = initial;
        let mut current = self.entry.clone();

        for step in 1..=self.recursion_limit {
            let node = self.nodes.get(&current).ok_or_else(|| WorkflowError::UnknownRoute {
                from: "<entry>".to_string(),
                to: current.clone(),
            })?;

            info!(thread_id, step, node = %current, "Running workflow node");
            let update = node
                .run(&state)
                .await
                .map_err(|source| WorkflowError::Node {
                    node: current.clone(),
                    source,
                })?;
            state.apply(update);

            if let Some(saver) = &self.checkpointer {
                saver.put(thread_id, step, &current, state.clone()).await;
            }

            let next = match self.transitions.get(&current) {
                Some(Transition::Edge(to)) => to.clone(),
                Some(Transition::Conditional(route)) => route(&state),
                None => END.to_string(),
            };
            debug!(from = %current, to = %next, "Workflow transition");

            if next == END {
                return Ok(state);
            }
            if !self.nodes.contains_key(&next) {
                return Err(WorkflowError::UnknownRoute {
                    from: current,
                    to: next,
                });
            }
            current = next;
        }

        Err(WorkflowError::RecursionLimit(self.recursion_limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Trace {
        visited: Vec<String>,
        counter: u32,
    }

    struct TraceUpdate {
        visited: String,
        increment: u32,
    }

    impl GraphState for Trace {
        type Update = TraceUpdate;

        fn apply(&mut self, update: TraceUpdate) {
            self.visited.push(update.visited);
            self.counter += update.increment;
        }
    }

    struct Visit(&'static str);

    #[async_trait]
    impl Node<Trace> for Visit {
        async fn run(&self, _state: &Trace) -> anyhow::Result<TraceUpdate> {
            Ok(TraceUpdate {
                visited: self.0.to_string(),
                increment: 1,
            })
        }
    }

    struct Fails;

    #[async_trait]
    impl Node<Trace> for Fails {
        async fn run(&self, _state: &Trace) -> anyhow::Result<TraceUpdate> {
            anyhow::bail!("boom")
        }
    }

    #[tokio::test]
    async fn test_linear_graph_runs_in_order() {
        let graph = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .add_node("b", Visit("b"))
            .set_entry_point("a")
            .add_edge("a", "b")
            .add_edge("b", END)
            .compile(None)
            .unwrap();

        let out = graph.invoke(Trace::default(), "t").await.unwrap();
        assert_eq!(out.visited, vec!["a", "b"]);
        assert_eq!(out.counter, 2);
    }

    #[tokio::test]
    async fn test_conditional_edge_routes_on_state() {
        let graph = StateGraph::<Trace>::new()
            .add_node("start", Visit("start"))
            .add_node("yes", Visit("yes"))
            .add_node("no", Visit("no"))
            .set_entry_point("start")
            .add_conditional_edges("start", |s: &Trace| {
                (if s.counter > 5 { "yes" } else { "no" }).to_string()
            })
            .add_edge("yes", END)
            .add_edge("no", END)
            .compile(None)
            .unwrap();

        let low = graph.invoke(Trace::default(), "t").await.unwrap();
        assert_eq!(low.visited, vec!["start", "no"]);

        let high = Trace {
            counter: 10,
            ..Trace::default()
        };
        let out = graph.invoke(high, "t").await.unwrap();
        assert_eq!(out.visited, vec!["start", "yes"]);
    }

    #[tokio::test]
    async fn test_route_to_unknown_node_is_an_error() {
        let graph = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .set_entry_point("a")
            .add_conditional_edges("a", |_: &Trace| "ghost".to_string())
            .compile(None)
            .unwrap();

        let err = graph.invoke(Trace::default(), "t").await.unwrap_err();
        assert!(matches!(err, WorkflowError::UnknownRoute { ref to, .. } if to == "ghost"));
    }

    #[tokio::test]
    async fn test_cycle_hits_recursion_limit() {
        let graph = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .add_node("b", Visit("b"))
            .set_entry_point("a")
            .add_edge("a", "b")
            .add_edge("b", "a")
            .compile(None)
            .unwrap();

        let err = graph.invoke(Trace::default(), "t").await.unwrap_err();
        assert!(matches!(err, WorkflowError::RecursionLimit(DEFAULT_RECURSION_LIMIT)));
    }

    #[tokio::test]
    async fn test_node_failure_names_the_node() {
        let graph = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .add_node("bad", Fails)
            .set_entry_point("a")
            .add_edge("a", "bad")
            .add_edge("bad", END)
            .compile(None)
            .unwrap();

        let err = graph.invoke(Trace::default(), "t").await.unwrap_err();
        assert!(matches!(err, WorkflowError::Node { ref node, .. } if node == "bad"));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_every_step_is_checkpointed() {
        let saver = Arc::new(MemorySaver::new());
        let graph = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .add_node("b", Visit("b"))
            .set_entry_point("a")
            .add_edge("a", "b")
            .add_edge("b", END)
            .compile(Some(Arc::clone(&saver)))
            .unwrap();

        graph.invoke(Trace::default(), "thread-7").await.unwrap();
        let history = saver.history("thread-7").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].node, "a");
        assert_eq!(history[1].step, 2);
        assert_eq!(history[1].state.visited, vec!["a", "b"]);
    }

    #[test]
    fn test_compile_requires_entry_point() {
        let result = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .add_edge("a", END)
            .compile(None);
        assert!(matches!(result, Err(WorkflowError::InvalidGraph(_))));
    }

    #[test]
    fn test_compile_rejects_edge_to_unknown_node() {
        let result = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .set_entry_point("a")
            .add_edge("a", "missing")
            .compile(None);
        assert!(matches!(result, Err(WorkflowError::InvalidGraph(ref m)) if m.contains("missing")));
    }

    #[test]
    fn test_compile_rejects_node_without_outgoing_edge() {
        let result = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .add_node("b", Visit("b"))
            .set_entry_point("a")
            .add_edge("a", END)
            .compile(None);
        assert!(matches!(result, Err(WorkflowError::InvalidGraph(ref m)) if m.contains("'b'")));
    }

    #[test]
    fn test_compile_rejects_duplicate_nodes_and_edges() {
        let dup_node = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .add_node("a", Visit("a"))
            .set_entry_point("a")
            .add_edge("a", END)
            .compile(None);
        assert!(dup_node.is_err());

        let dup_edge = StateGraph::<Trace>::new()
            .add_node("a", Visit("a"))
            .set_entry_point("a")
            .add_edge("a", END)
            .add_conditional_edges("a", |_: &Trace| END.to_string())
            .compile(None);
        assert!(dup_edge.is_err());
    }
}
