use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::ops::Range;

/// Identifier of an agent, equal to its node index in the graph.
pub type AgentId = usize;

/// Undirected simple graph over the agents.
///
/// Nodes are never removed, so node indices coincide with agent ids.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    inner: UnGraph<(), (), usize>,
}

impl Graph {
    /// Create a graph with `n_nodes` nodes and no edges.
    pub fn new(n_nodes: usize) -> Self {
        let mut inner = UnGraph::with_capacity(n_nodes, 0);
        for _ in 0..n_nodes {
            inner.add_node(());
        }
        Self {
            name: format!("empty_graph({n_nodes})"),
            inner,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn n_nodes(&self) -> usize {
        self.inner.node_count()
    }

    pub fn nodes(&self) -> Range<AgentId> {
        0..self.inner.node_count()
    }

    pub fn neighbors(&self, node: AgentId) -> impl Iterator<Item = AgentId> + '_ {
        self.inner.neighbors(NodeIndex::new(node)).map(|n| n.index())
    }

    pub fn degree(&self, node: AgentId) -> usize {
        self.inner.edges(NodeIndex::new(node)).count()
    }

    pub fn has_edge(&self, u: AgentId, v: AgentId) -> bool {
        self.inner.contains_edge(NodeIndex::new(u), NodeIndex::new(v))
    }

    /// Add the edge `{u, v}`.
    ///
    /// Returns `false` without modifying the graph if the edge already
    /// exists or would be a self-loop.
    pub fn add_edge(&mut self, u: AgentId, v: AgentId) -> bool {
        if u == v || self.has_edge(u, v) {
            return false;
        }
        self.inner.add_edge(NodeIndex::new(u), NodeIndex::new(v), ());
        true
    }

    /// Remove the edge `{u, v}`, returning whether it was present.
    pub fn remove_edge(&mut self, u: AgentId, v: AgentId) -> bool {
        match self.inner.find_edge(NodeIndex::new(u), NodeIndex::new(v)) {
            Some(edge) => self.inner.remove_edge(edge).is_some(),
            None => false,
        }
    }

    /// All edges as sorted `(u, v)` pairs with `u < v`.
    pub fn edges(&self) -> Vec<(AgentId, AgentId)> {
        let mut edges: Vec<_> = self
            .inner
            .edge_references()
            .map(|edge| {
                let (a, b) = (edge.source().index(), edge.target().index());
                (a.min(b), a.max(b))
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    pub fn n_edges(&self) -> usize {
        self.inner.edge_count()
    }
}
