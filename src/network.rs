//! Network of households, their dogs, and the strays roaming between them.
//!
//! A tick is performed in a fixed order: every agent is updated in place
//! (later agents see the already-updated state of earlier ones), then every
//! dog attempts to reproduce, then every stray moves to a random neighbor,
//! and finally the global education campaign drifts.

use crate::agent::{Agent, Household};
use crate::config::Config;
use crate::dog::{Dog, DogId};
use crate::factory::AgentFactory;
use crate::graph::{AgentId, Graph};
use crate::stray::StrayIndex;
use crate::topology::Topology;
use crate::types::{AgentRow, NodeVisual, Summary};
use anyhow::{Context, Result, bail};
use rand::prelude::*;

/// Number of strays at a node that renders it fully opaque.
pub const MAX_STRAY: usize = 10;

#[derive(Debug, Clone)]
pub struct Network {
    time_span: usize,
    graph: Graph,
    agents: Vec<Agent>,
    dogs: Vec<Dog>,
    strays: StrayIndex,
    dog_education: f64,
}

impl Network {
    /// Populate `graph` with one agent per household, in node order.
    ///
    /// Each agent acquires its initial dogs as it is created.
    pub fn new<R: Rng + ?Sized>(
        graph: Graph,
        households: &[Household],
        time_span: usize,
        rng: &mut R,
    ) -> Result<Self> {
        if households.len() != graph.n_nodes() {
            bail!(
                "number of households ({}) must match number of nodes ({})",
                households.len(),
                graph.n_nodes()
            );
        }

        let n_agents = graph.n_nodes();
        let mut network = Self {
            time_span,
            graph,
            agents: Vec::with_capacity(n_agents),
            dogs: Vec::new(),
            strays: StrayIndex::new(n_agents),
            dog_education: 0.0,
        };

        for (id, household) in households.iter().enumerate() {
            network.agents.push(Agent::new(id, household));
            for _ in 0..household.num_dogs {
                network.new_dog(id, rng);
            }
        }

        Ok(network)
    }

    /// Build the graph and sample the agents described by `cfg`.
    pub fn generate<R: Rng + ?Sized>(cfg: &Config, rng: &mut R) -> Result<Self> {
        let n_agents = cfg.network.n_agents;
        let graph = cfg
            .network
            .topology
            .build(n_agents, rng)
            .context("failed to build graph")?;
        log::info!("built {} with {} edges", graph.name(), graph.n_edges());

        let factory = AgentFactory::new(&cfg.init).context("failed to construct factory")?;
        let households: Vec<_> = (0..n_agents).map(|_| factory.sample(rng)).collect();

        let network = Self::new(graph, &households, cfg.model.time_span, rng)?;
        let agents = network.agents();
        log::info!(
            "sampled {n_agents} households: mean income {:.0}, mean residents {:.2}, {} with children, {} dogs",
            agents.iter().map(|a| a.income() as f64).sum::<f64>() / n_agents as f64,
            agents.iter().map(|a| a.num_residents() as f64).sum::<f64>() / n_agents as f64,
            agents.iter().filter(|a| a.has_children()).count(),
            network.dogs().len()
        );
        Ok(network)
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id]
    }

    pub fn dogs(&self) -> &[Dog] {
        &self.dogs
    }

    /// Perform one tick.
    pub fn time_step<R: Rng + ?Sized>(&mut self, tick: usize, rng: &mut R) -> Result<()> {
        for id in self.graph.nodes() {
            self.update_agent(id, rng)
                .with_context(|| format!("failed to update agent {id}"))?;
        }

        self.reproduce_dogs(rng)
            .context("failed to reproduce dogs")?;

        // Moving strays rewrites the buckets, so iterate over a snapshot.
        let strays = self.strays.strays().to_vec();
        for dog in strays {
            self.spread_stray(dog, rng)
                .with_context(|| format!("failed to spread stray {dog}"))?;
        }

        self.update_education(tick);

        Ok(())
    }

    /// Run the behavioral pipeline of one agent.
    pub fn update_agent<R: Rng + ?Sized>(&mut self, id: AgentId, rng: &mut R) -> Result<()> {
        let mean_attitude = self.mean_attitude(id);
        let agent = &mut self.agents[id];
        agent.update_attitude(mean_attitude);
        agent.update_prob_acquire();
        agent.update_prob_release();

        let mean_education = self.mean_education(id);
        let dog_education = self.dog_education;
        let agent = &mut self.agents[id];
        agent.update_education(mean_education, dog_education);
        agent.update_prob_sterilization();

        if trial(rng, self.agents[id].p_acquire()) {
            self.new_dog(id, rng);
        }

        // Dogs acquired above are also subject to the trials.
        let p_sterilization = self.agents[id].p_sterilization();
        let p_release = self.agents[id].p_release();
        let owned = self.agents[id].dogs().to_vec();
        for dog in owned {
            if trial(rng, p_sterilization) {
                self.dogs[dog].sterilize();
            }
            if trial(rng, p_release) {
                self.release_dog(id, dog)?;
            }
        }

        self.update_stray(id);

        Ok(())
    }

    /// Give a new dog to `owner`.
    pub fn new_dog<R: Rng + ?Sized>(&mut self, owner: AgentId, rng: &mut R) -> DogId {
        let el_factor = self.agents[owner].norm_education_level();
        let dog = Dog::new(Some(owner), owner, el_factor, rng);

        let id = self.dogs.len();
        self.dogs.push(dog);
        self.agents[owner].add_dog(id);
        id
    }

    /// Turn a dog owned by `owner` into a stray at the owner's location.
    pub fn release_dog(&mut self, owner: AgentId, dog: DogId) -> Result<()> {
        if self.dogs[dog].owner() != Some(owner) {
            bail!("agent {owner} cannot release dog {dog} it does not own");
        }
        self.agents[owner].remove_dog(dog)?;
        self.dogs[dog].set_owner(None);
        self.add_stray(owner, dog)
    }

    /// Register an unowned dog as stray at `loc`.
    pub fn add_stray(&mut self, loc: AgentId, dog: DogId) -> Result<()> {
        if let Some(owner) = self.dogs[dog].owner() {
            bail!("dog {dog} is owned by agent {owner} and cannot be a stray");
        }
        self.strays.add(loc, dog)?;
        self.dogs[dog].set_loc(loc);
        Ok(())
    }

    /// Strays currently at `loc`.
    pub fn get_stray(&self, loc: AgentId) -> &[DogId] {
        self.strays.at(loc)
    }

    /// Move a stray to a uniformly chosen neighbor of its location.
    ///
    /// Returns `false` if the location has no neighbors and the stray stays.
    pub fn spread_stray<R: Rng + ?Sized>(&mut self, dog: DogId, rng: &mut R) -> Result<bool> {
        let from = self
            .strays
            .location_of(dog)
            .with_context(|| format!("dog {dog} is not a stray"))?;
        let Some(to) = self.graph.neighbors(from).choose(rng) else {
            return Ok(false);
        };
        self.strays.relocate(dog, to)?;
        self.dogs[dog].set_loc(to);
        Ok(true)
    }

    /// Refresh the stray counters of an agent from the stray index.
    pub fn update_stray(&mut self, id: AgentId) {
        let num_stray_dogs = self.get_stray(id).len();
        self.agents[id].update_stray(num_stray_dogs);
    }

    /// Let every dog attempt to reproduce, puppies born during the phase included.
    fn reproduce_dogs<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let mut id = 0;
        while id < self.dogs.len() {
            let owner = self.dogs[id].owner();
            let el_factor = match owner {
                Some(owner) => self.agents[owner].norm_education_level(),
                None => 1.0,
            };
            if self.dogs[id].reproduce(el_factor, rng) {
                match owner {
                    Some(owner) => {
                        self.new_dog(owner, rng);
                    }
                    None => {
                        let loc = self.dogs[id].loc();
                        let puppy = self.dogs.len();
                        self.dogs.push(Dog::new(None, loc, 1.0, rng));
                        self.add_stray(loc, puppy)?;
                    }
                }
            }
            id += 1;
        }
        Ok(())
    }

    /// Education campaign: grows linearly from the midpoint of the run onwards.
    pub fn update_education(&mut self, tick: usize) {
        let time_span = self.time_span as f64;
        if (tick as f64) < time_span / 2.0 {
            return;
        }
        self.dog_education += 2.0 / time_span;
    }

    /// Mean raw attitude of the neighbors of `id`.
    ///
    /// NaN for an isolated agent.
    pub fn mean_attitude(&self, id: AgentId) -> f64 {
        self.neighbor_mean(id, Agent::attitude)
    }

    /// Mean raw education level of the neighbors of `id`.
    ///
    /// NaN for an isolated agent.
    pub fn mean_education(&self, id: AgentId) -> f64 {
        self.neighbor_mean(id, Agent::education_level)
    }

    fn neighbor_mean(&self, id: AgentId, value: fn(&Agent) -> f64) -> f64 {
        let (n_neighbors, sum) = self
            .graph
            .neighbors(id)
            .fold((0usize, 0.0), |(n, sum), v| (n + 1, sum + value(&self.agents[v])));
        sum / n_neighbors as f64
    }

    pub fn agent_rows(&self, time: usize) -> Vec<AgentRow> {
        self.agents
            .iter()
            .map(|agent| AgentRow {
                time,
                agent_id: agent.id(),
                num_stray_dogs: agent.num_stray_dogs(),
                normal_attitude: agent.normal_attitude(),
                p_acquire: agent.p_acquire(),
                p_release: agent.p_release(),
                norm_education_level: agent.norm_education_level(),
            })
            .collect()
    }

    pub fn node_visuals(&self) -> Vec<NodeVisual> {
        self.graph
            .nodes()
            .map(|id| NodeVisual {
                color: self.agent(id).norm_education_level().min(1.0),
                opacity: (self.strays.at(id).len() as f64 / MAX_STRAY as f64).min(1.0),
            })
            .collect()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            n_dogs: self.dogs.len(),
            n_owned: self.dogs.iter().filter(|dog| !dog.is_stray()).count(),
            n_strays: self.strays.len(),
            n_sterilized: self.dogs.iter().filter(|dog| dog.is_sterilized()).count(),
            n_births: self
                .dogs
                .iter()
                .filter(|dog| dog.last_birth() == Some(0))
                .count(),
            n_exposed: self.agents.iter().filter(|a| a.has_stray_dog()).count(),
            dog_education: self.dog_education,
        }
    }

    /// Check ownership exclusivity and stray index consistency.
    pub fn check_invariants(&self) -> Result<()> {
        self.strays
            .check_consistency()
            .context("inconsistent stray index")?;

        let mut n_owners = vec![0usize; self.dogs.len()];
        for agent in &self.agents {
            for &dog in agent.dogs() {
                n_owners[dog] += 1;
                if self.dogs[dog].owner() != Some(agent.id()) {
                    bail!("dog {dog} is listed by agent {} but owned elsewhere", agent.id());
                }
            }
        }

        for (id, dog) in self.dogs.iter().enumerate() {
            if n_owners[id] > 1 {
                bail!("dog {id} is listed by {} agents", n_owners[id]);
            }
            if dog.is_stray() != self.strays.contains(id) {
                bail!("dog {id} is stray iff it is in the stray index");
            }
            if dog.is_stray() && self.strays.location_of(id) != Some(dog.loc()) {
                bail!("stray {id} is located at {} outside the index", dog.loc());
            }
            if !dog.is_stray() && n_owners[id] == 0 {
                bail!("dog {id} has an owner that does not list it");
            }
        }
        Ok(())
    }
}

/// Bernoulli trial comparing one uniform draw against `p`.
///
/// A NaN probability never succeeds.
fn trial<R: Rng + ?Sized>(rng: &mut R, p: f64) -> bool {
    rng.random::<f64>() < p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::denormalize;
    use crate::config::{InitConfig, ModelConfig, NetworkConfig, OutputConfig, TopologyConfig};
    use rand_chacha::ChaCha12Rng;

    fn household(attitude: f64, education_level: f64) -> Household {
        Household {
            income: 50000,
            num_residents: 2,
            num_dogs: 0,
            attitude,
            education_level,
        }
    }

    fn path_graph(n_nodes: usize) -> Graph {
        let mut graph = Graph::new(n_nodes);
        for u in 1..n_nodes {
            graph.add_edge(u - 1, u);
        }
        graph
    }

    fn config(topology: TopologyConfig) -> Config {
        Config {
            model: ModelConfig {
                time_span: 40,
                seed: Some(0),
            },
            network: NetworkConfig {
                n_agents: 30,
                topology,
            },
            init: InitConfig::default(),
            output: OutputConfig::default(),
        }
    }

    #[test]
    fn acquisition_follows_attitude() {
        let mut rng = ChaCha12Rng::seed_from_u64(30);
        // Agent 0 is certain to acquire, agent 1 has a vanishing chance;
        // negligible education keeps the neighbor influence at zero.
        let households = [household(100.0, -100.0), household(-100.0, -100.0)];
        let mut network = Network::new(path_graph(2), &households, 10, &mut rng).unwrap();

        network.update_agent(0, &mut rng).unwrap();
        network.update_agent(1, &mut rng).unwrap();

        assert_eq!(network.agent(0).p_acquire(), 1.0);
        assert_eq!(network.dogs().len(), 1);
        // The new dog is subject to an immediate release trial.
        let dog = &network.dogs()[0];
        assert_eq!(dog.loc(), 0);
        assert_eq!(network.agent(0).num_dogs() + network.get_stray(0).len(), 1);
        assert_eq!(network.agent(1).num_dogs(), 0);
        network.check_invariants().unwrap();
    }

    #[test]
    fn acquisition_within_full_tick() {
        let mut rng = ChaCha12Rng::seed_from_u64(39);
        // Low but finite education keeps puppy chains short.
        let low_education = denormalize(0.01);
        let households = [
            household(100.0, low_education),
            household(-100.0, low_education),
        ];
        let mut network = Network::new(path_graph(2), &households, 10, &mut rng).unwrap();

        network.time_step(0, &mut rng).unwrap();
        network.check_invariants().unwrap();

        assert_eq!(network.agent(0).p_acquire(), 1.0);
        assert_eq!(network.agent(1).num_dogs(), 0);
        // Released dogs and their puppies may roam, but every dog is either
        // owned by agent 0 or a stray.
        let n_strays = network.summary().n_strays;
        assert!(network.dogs().len() >= 1);
        assert_eq!(network.agent(0).num_dogs() + n_strays, network.dogs().len());
    }

    #[test]
    fn puppies_reproduce_in_their_birth_phase() {
        let mut found_chain = false;
        for seed in 0..20 {
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            let mut owner = household(5.0, denormalize(0.01));
            owner.num_dogs = 1;
            let mut network = Network::new(Graph::new(1), &[owner], 10, &mut rng).unwrap();

            network.reproduce_dogs(&mut rng).unwrap();
            network.check_invariants().unwrap();

            // A single parent can give birth once per phase, so any third
            // dog was born to a puppy of this phase.
            if network.dogs().len() > 2 {
                assert_eq!(network.dogs()[1].last_birth(), Some(0));
                found_chain = true;
            }
            assert_eq!(network.agent(0).num_dogs(), network.dogs().len());
            // Every dog but the youngest gave birth.
            assert_eq!(network.summary().n_births, network.dogs().len() - 1);
        }
        assert!(found_chain);
    }

    #[test]
    fn stray_moves_to_only_neighbor() {
        let mut rng = ChaCha12Rng::seed_from_u64(31);
        let households = [household(5.0, 5.0), household(5.0, 5.0)];
        let mut network = Network::new(path_graph(2), &households, 10, &mut rng).unwrap();

        let dog = network.new_dog(0, &mut rng);
        network.release_dog(0, dog).unwrap();
        assert_eq!(network.get_stray(0), &[dog]);

        assert!(network.spread_stray(dog, &mut rng).unwrap());
        assert_eq!(network.get_stray(1), &[dog]);
        assert!(network.get_stray(0).is_empty());
        assert_eq!(network.dogs()[dog].loc(), 1);
        network.check_invariants().unwrap();
    }

    #[test]
    fn isolated_stray_stays_put() {
        let mut rng = ChaCha12Rng::seed_from_u64(32);
        let households = [household(5.0, 5.0), household(5.0, 5.0)];
        let mut network = Network::new(Graph::new(2), &households, 10, &mut rng).unwrap();

        let dog = network.new_dog(1, &mut rng);
        network.release_dog(1, dog).unwrap();

        assert!(!network.spread_stray(dog, &mut rng).unwrap());
        assert_eq!(network.get_stray(1), &[dog]);
    }

    #[test]
    fn contract_violations_are_errors() {
        let mut rng = ChaCha12Rng::seed_from_u64(33);
        let households = [household(5.0, 5.0), household(5.0, 5.0)];
        let mut network = Network::new(path_graph(2), &households, 10, &mut rng).unwrap();

        let dog = network.new_dog(0, &mut rng);
        assert!(network.release_dog(1, dog).is_err());
        assert!(network.add_stray(1, dog).is_err());

        network.release_dog(0, dog).unwrap();
        assert!(network.release_dog(0, dog).is_err());
        assert!(network.add_stray(1, dog).is_err());
        network.check_invariants().unwrap();
    }

    #[test]
    fn isolated_agent_has_nan_mean_field() {
        let mut rng = ChaCha12Rng::seed_from_u64(34);
        let households = [household(5.0, 5.0), household(7.0, 3.0), household(9.0, 1.0)];
        let mut graph = Graph::new(3);
        graph.add_edge(1, 2);
        let network = Network::new(graph, &households, 10, &mut rng).unwrap();

        assert!(network.mean_attitude(0).is_nan());
        assert!(network.mean_education(0).is_nan());
        assert_eq!(network.mean_attitude(1), 9.0);
        assert_eq!(network.mean_education(2), 3.0);
    }

    #[test]
    fn later_agents_see_updated_neighbors() {
        let mut rng = ChaCha12Rng::seed_from_u64(35);
        let households = [household(5.0, 5.0), household(5.0, 5.0)];
        let mut network = Network::new(path_graph(2), &households, 10, &mut rng).unwrap();

        network.update_agent(0, &mut rng).unwrap();
        let attitude_0 = network.agent(0).attitude();
        assert_eq!(attitude_0, 7.5);
        assert_eq!(network.mean_attitude(1), attitude_0);
    }

    #[test]
    fn education_drift_ratchets_after_midpoint() {
        let mut rng = ChaCha12Rng::seed_from_u64(36);
        let households = [household(5.0, 5.0)];
        let mut network = Network::new(Graph::new(1), &households, 10, &mut rng).unwrap();

        let mut prev = network.dog_education;
        for tick in 0..10 {
            network.update_education(tick);
            let curr = network.dog_education;
            if tick < 5 {
                assert_eq!(curr, prev);
            } else {
                assert!((curr - prev - 0.2).abs() < 1e-12);
            }
            prev = curr;
        }
        assert!((network.dog_education - 1.0).abs() < 1e-12);
    }

    #[test]
    fn stray_refresh_is_idempotent() {
        let mut rng = ChaCha12Rng::seed_from_u64(37);
        let households = [household(5.0, 5.0), household(5.0, 5.0)];
        let mut network = Network::new(path_graph(2), &households, 10, &mut rng).unwrap();
        let dog = network.new_dog(0, &mut rng);
        network.release_dog(0, dog).unwrap();

        network.update_stray(0);
        let first = (network.agent(0).num_stray_dogs(), network.agent(0).has_stray_dog());
        network.update_stray(0);
        let second = (network.agent(0).num_stray_dogs(), network.agent(0).has_stray_dog());
        assert_eq!(first, (1, true));
        assert_eq!(first, second);
        assert_eq!(network.summary().n_exposed, 1);
    }

    #[test]
    fn invariants_hold_over_many_ticks() {
        for (seed, topology) in [
            TopologyConfig::ErdosRenyi { p: 0.2 },
            TopologyConfig::SmallWorld { k: 4, p: 0.1 },
            TopologyConfig::ScaleFree { m_0: 4, m: 2 },
        ]
        .into_iter()
        .enumerate()
        {
            let cfg = config(topology);
            let mut rng = ChaCha12Rng::seed_from_u64(seed as u64);
            let mut network = Network::generate(&cfg, &mut rng).unwrap();

            let mut sterilized: Vec<usize> = Vec::new();
            let mut prev_education = network.dog_education;
            for tick in 0..cfg.model.time_span {
                network.time_step(tick, &mut rng).unwrap();
                network.check_invariants().unwrap();

                for &id in &sterilized {
                    assert!(network.dogs()[id].is_sterilized());
                }
                sterilized = (0..network.dogs().len())
                    .filter(|&id| network.dogs()[id].is_sterilized())
                    .collect();

                assert!(network.dog_education >= prev_education);
                prev_education = network.dog_education;
            }
        }
    }

    #[test]
    fn visuals_are_capped() {
        let mut rng = ChaCha12Rng::seed_from_u64(38);
        let households = [household(5.0, 5.0), household(5.0, 5.0)];
        let mut network = Network::new(path_graph(2), &households, 10, &mut rng).unwrap();
        for _ in 0..(MAX_STRAY + 2) {
            let dog = network.new_dog(0, &mut rng);
            network.release_dog(0, dog).unwrap();
        }

        let visuals = network.node_visuals();
        assert_eq!(visuals[0].opacity, 1.0);
        assert_eq!(visuals[1].opacity, 0.0);
        assert_eq!(visuals[0].color, 0.5);

        let summary = network.summary();
        assert_eq!(summary.n_strays, MAX_STRAY + 2);
        assert_eq!(summary.n_owned, 0);
    }
}
