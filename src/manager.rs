use crate::analysis::{Analyzer, write_results_csv, write_visuals};
use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Manages the runs of a simulation directory.
///
/// The directory holds `config.toml` and one `run-NNNN` directory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Simulate a new run from a freshly generated network.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut engine = Engine::generate_initial_condition(self.cfg.clone(), run_idx)
            .context("failed to generate initial condition")?;

        engine
            .save_graph(self.graph_file(run_idx))
            .context("failed to save graph")?;

        engine
            .perform_simulation(self.trajectory_file(run_idx))
            .context("failed to perform simulation")?;

        Ok(())
    }

    /// Write per-run results and the cross-run summary.
    pub fn analyze_sim(&self) -> Result<()> {
        let mut analyzer = Analyzer::new(self.cfg.clone());

        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let records = analyzer
                .read_trajectory(self.trajectory_file(run_idx))
                .context("failed to read trajectory")?;

            write_results_csv(self.results_file(run_idx), &records)
                .context("failed to write results")?;
            write_visuals(self.visual_file(run_idx), &records)
                .context("failed to write visuals")?;

            analyzer
                .add_run(&records)
                .with_context(|| format!("failed to add run {run_idx}"))?;
            log::info!("analyzed {:?}", self.run_dir(run_idx));
        }

        analyzer
            .save_results(self.summary_file())
            .context("failed to save summary")?;

        Ok(())
    }

    /// Remove analysis outputs, keeping the trajectories.
    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        let mut files: Vec<_> = (0..n_runs)
            .flat_map(|run_idx| [self.results_file(run_idx), self.visual_file(run_idx)])
            .collect();
        files.push(self.summary_file());

        for file in files {
            if file.exists() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn graph_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("graph.json")
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.msgpack")
    }

    fn results_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("results.csv")
    }

    fn visual_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("visual.json")
    }

    fn summary_file(&self) -> PathBuf {
        self.sim_dir.join("summary.json")
    }
}
