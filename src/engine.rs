use crate::config::Config;
use crate::network::Network;
use crate::types::{GraphLayout, Record};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, network, and random number generator,
/// and provides methods to initialize and run a simulation.
pub struct Engine {
    cfg: Config,
    network: Network,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a freshly sampled network.
    ///
    /// With a configured seed, run `run_idx` is seeded with `seed + run_idx`.
    pub fn generate_initial_condition(cfg: Config, run_idx: usize) -> Result<Self> {
        let mut rng = match cfg.model.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed.wrapping_add(run_idx as u64)),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let network = Network::generate(&cfg, &mut rng).context("failed to generate network")?;

        Ok(Self { cfg, network, rng })
    }

    /// Perform the simulation and save the resulting records to a binary file.
    ///
    /// A record is saved before every tick that is a multiple of `steps_per_save`.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let time_span = self.cfg.model.time_span;
        let steps_per_save = self.cfg.output.steps_per_save;
        let saves_per_run = self.cfg.saves_per_run();

        for tick in 0..time_span {
            if tick % steps_per_save == 0 {
                let record = self.record(tick);
                encode::write(&mut writer, &record).context("failed to serialize record")?;

                let progress = 100.0 * (tick / steps_per_save + 1) as f64 / saves_per_run as f64;
                log::info!("completed {progress:06.2}%");
            }

            self.network
                .time_step(tick, &mut self.rng)
                .with_context(|| format!("failed to perform tick {tick}"))?;
            if cfg!(debug_assertions) {
                self.network
                    .check_invariants()
                    .with_context(|| format!("invariants violated after tick {tick}"))?;
            }

            if log::log_enabled!(log::Level::Debug) {
                let summary = self.network.summary();
                log::debug!(
                    "tick {tick}: {} dogs, {} births, {} strays, dog education {:.4}",
                    summary.n_dogs,
                    summary.n_births,
                    summary.n_strays,
                    summary.dog_education
                );
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save the graph edges for layout by an external renderer.
    pub fn save_graph<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let graph = self.network.graph();
        let layout = GraphLayout {
            name: graph.name().to_string(),
            n_nodes: graph.n_nodes(),
            edges: graph.edges(),
        };
        serde_json::to_writer_pretty(writer, &layout).context("failed to serialize graph")?;
        Ok(())
    }

    fn record(&self, tick: usize) -> Record {
        Record {
            tick,
            summary: self.network.summary(),
            agent_rows: self.network.agent_rows(tick),
            node_visuals: self.network.node_visuals(),
        }
    }
}
