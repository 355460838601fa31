use crate::config::TopologyConfig;
use crate::graph::{AgentId, Graph};
use anyhow::{Result, bail};
use rand::prelude::*;
use rand_distr::Bernoulli;

/// Graph construction policy.
///
/// Given a node count, produces the edge set the network is simulated on.
pub trait Topology {
    fn build<R: Rng + ?Sized>(&self, n_nodes: usize, rng: &mut R) -> Result<Graph>;
}

/// Uniform random graph: every pair of nodes is joined with probability `p`.
pub struct ErdosRenyi {
    pub p: f64,
}

impl Topology for ErdosRenyi {
    fn build<R: Rng + ?Sized>(&self, n_nodes: usize, rng: &mut R) -> Result<Graph> {
        let edge_dist = Bernoulli::new(self.p)?;

        let mut graph = Graph::new(n_nodes);
        graph.set_name(format!("erdos_renyi({n_nodes},{})", self.p));
        for u in 0..n_nodes {
            for v in (u + 1)..n_nodes {
                if edge_dist.sample(rng) {
                    graph.add_edge(u, v);
                }
            }
        }
        Ok(graph)
    }
}

/// Watts-Strogatz small world graph.
///
/// Starts from a ring lattice joining each node to its `k / 2` successors
/// and rewires each lattice edge with probability `p`.
pub struct SmallWorld {
    pub k: usize,
    pub p: f64,
}

impl Topology for SmallWorld {
    fn build<R: Rng + ?Sized>(&self, n_nodes: usize, rng: &mut R) -> Result<Graph> {
        if self.k >= n_nodes.max(1) {
            bail!("k must be smaller than the number of nodes");
        }
        let rewire_dist = Bernoulli::new(self.p)?;

        let mut graph = Graph::new(n_nodes);
        graph.set_name(format!("small_world({n_nodes},{},{})", self.k, self.p));
        let half_k = self.k / 2;
        for j in 1..=half_k {
            for u in 0..n_nodes {
                graph.add_edge(u, (u + j) % n_nodes);
            }
        }

        for j in 1..=half_k {
            for u in 0..n_nodes {
                if !rewire_dist.sample(rng) {
                    continue;
                }
                // Node already joined to every other node.
                if graph.degree(u) >= n_nodes - 1 {
                    continue;
                }
                let mut w = rng.random_range(0..n_nodes);
                while w == u || graph.has_edge(u, w) {
                    w = rng.random_range(0..n_nodes);
                }
                graph.remove_edge(u, (u + j) % n_nodes);
                graph.add_edge(u, w);
            }
        }
        Ok(graph)
    }
}

/// Scale-free graph grown by preferential attachment.
///
/// The first `m_0` nodes form a clique; every later node attaches to
/// about `m` existing nodes chosen proportionally to their degree.
pub struct ScaleFree {
    pub m_0: usize,
    pub m: usize,
}

impl Topology for ScaleFree {
    fn build<R: Rng + ?Sized>(&self, n_nodes: usize, rng: &mut R) -> Result<Graph> {
        if self.m_0 == 0 || self.m_0 > n_nodes {
            bail!("number of baseline nodes must be in the range 1..={n_nodes}");
        }

        let mut graph = Graph::new(n_nodes);
        graph.set_name(format!("scale_free({n_nodes},{},{})", self.m_0, self.m));
        for u in 0..self.m_0 {
            for v in (u + 1)..self.m_0 {
                graph.add_edge(u, v);
            }
        }

        for node in self.m_0..n_nodes {
            preferentially_attach(&mut graph, node, self.m, rng);
        }
        Ok(graph)
    }
}

/// Attach `node` to the nodes `0..=node` with probability proportional
/// to their current degree, returning the number of edges added.
///
/// Candidates are shuffled and their attachment probabilities
/// `m * degree / (2 * n_edges)` laid end to end on the real line. A single
/// uniform draw `r` selects the candidate whose interval contains
/// `r + n_selected`, so consecutive picks fall in consecutive unit
/// intervals. The number of edges added is `m` only in expectation.
pub fn preferentially_attach<R: Rng + ?Sized>(
    graph: &mut Graph,
    node: AgentId,
    m: usize,
    rng: &mut R,
) -> usize {
    let mut candidates: Vec<_> = (0..=node).collect();
    candidates.shuffle(rng);

    let degree_sum = 2 * graph.n_edges();
    if degree_sum == 0 {
        return 0;
    }

    let rand: f64 = rng.random();
    let mut p_sum = 0.0;
    let mut targets = Vec::with_capacity(m);
    for candidate in candidates {
        let p_edge = m as f64 * graph.degree(candidate) as f64 / degree_sum as f64;
        let low = p_sum;
        let high = p_sum + p_edge;
        let test = rand + targets.len() as f64;
        if test > low && test <= high {
            targets.push(candidate);
        }
        p_sum = high;
    }

    targets
        .into_iter()
        .filter(|&target| graph.add_edge(node, target))
        .count()
}

impl Topology for TopologyConfig {
    fn build<R: Rng + ?Sized>(&self, n_nodes: usize, rng: &mut R) -> Result<Graph> {
        match *self {
            TopologyConfig::ErdosRenyi { p } => ErdosRenyi { p }.build(n_nodes, rng),
            TopologyConfig::SmallWorld { k, p } => SmallWorld { k, p }.build(n_nodes, rng),
            TopologyConfig::ScaleFree { m_0, m } => ScaleFree { m_0, m }.build(n_nodes, rng),
        }
    }
}
