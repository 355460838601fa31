//! Simulation output types.

use crate::graph::AgentId;
use serde::{Deserialize, Serialize};

/// Per-agent observables at a saved tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRow {
    pub time: usize,
    pub agent_id: AgentId,
    pub num_stray_dogs: usize,
    pub normal_attitude: f64,
    pub p_acquire: f64,
    pub p_release: f64,
    pub norm_education_level: f64,
}

/// Rendering attributes of a node.
///
/// `color` follows the normalized education level and `opacity` the
/// number of strays at the node, both capped at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeVisual {
    pub color: f64,
    pub opacity: f64,
}

/// Population totals of the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub n_dogs: usize,
    pub n_owned: usize,
    pub n_strays: usize,
    pub n_sterilized: usize,
    /// Dogs that gave birth during the last reproduction phase.
    pub n_births: usize,
    /// Households with at least one stray at their node.
    pub n_exposed: usize,
    pub dog_education: f64,
}

/// Record of the simulation at a single saved tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Tick at which the record was taken, before that tick is performed.
    pub tick: usize,

    pub summary: Summary,

    pub agent_rows: Vec<AgentRow>,

    pub node_visuals: Vec<NodeVisual>,
}

/// Graph layout data for external renderers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphLayout {
    pub name: String,
    pub n_nodes: usize,
    pub edges: Vec<(AgentId, AgentId)>,
}
