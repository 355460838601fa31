use crate::config::Config;
use crate::stats::{Accumulator, finite_mean};
use crate::types::Record;
use anyhow::{Context, Result, bail};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Observable accumulated across runs, one accumulator per saved tick.
pub trait Obs {
    fn update(&mut self, i_save: usize, record: &Record) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Scalar observable extracted from each record.
pub struct TickObs {
    name: &'static str,
    value: fn(&Record) -> f64,
    acc_vec: Vec<Accumulator>,
}

impl TickObs {
    pub fn new(cfg: &Config, name: &'static str, value: fn(&Record) -> f64) -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(cfg.saves_per_run(), Accumulator::new);
        Self {
            name,
            value,
            acc_vec,
        }
    }
}

impl Obs for TickObs {
    fn update(&mut self, i_save: usize, record: &Record) -> Result<()> {
        let acc = self
            .acc_vec
            .get_mut(i_save)
            .with_context(|| format!("save index {i_save} out of range"))?;
        acc.add((self.value)(record));
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.acc_vec.iter().map(|acc| acc.report()).collect();
        serde_json::json!({ self.name: reports })
    }
}

fn n_strays(record: &Record) -> f64 {
    record.summary.n_strays as f64
}

fn n_dogs(record: &Record) -> f64 {
    record.summary.n_dogs as f64
}

fn n_births(record: &Record) -> f64 {
    record.summary.n_births as f64
}

fn avg_attitude(record: &Record) -> f64 {
    finite_mean(record.agent_rows.iter().map(|row| row.normal_attitude))
}

fn avg_education(record: &Record) -> f64 {
    finite_mean(record.agent_rows.iter().map(|row| row.norm_education_level))
}

/// Accumulates saved records of every run into a cross-run summary.
pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        obs_ptr_vec.push(Box::new(TickObs::new(&cfg, "n_strays", n_strays)));
        obs_ptr_vec.push(Box::new(TickObs::new(&cfg, "n_dogs", n_dogs)));
        obs_ptr_vec.push(Box::new(TickObs::new(&cfg, "n_births", n_births)));
        obs_ptr_vec.push(Box::new(TickObs::new(&cfg, "avg_attitude", avg_attitude)));
        obs_ptr_vec.push(Box::new(TickObs::new(&cfg, "avg_education", avg_education)));
        Self { cfg, obs_ptr_vec }
    }

    /// Read every record of a trajectory file.
    pub fn read_trajectory<P: AsRef<Path>>(&self, file: P) -> Result<Vec<Record>> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let saves_per_run = self.cfg.saves_per_run();
        let mut records = Vec::with_capacity(saves_per_run);
        for _ in 0..saves_per_run {
            let record = decode::from_read(&mut reader).context("failed to read record")?;
            records.push(record);
        }
        Ok(records)
    }

    pub fn add_run(&mut self, records: &[Record]) -> Result<()> {
        if records.len() != self.cfg.saves_per_run() {
            bail!(
                "run must have {} records, but has {}",
                self.cfg.saves_per_run(),
                records.len()
            );
        }
        for (i_save, record) in records.iter().enumerate() {
            for obs in &mut self.obs_ptr_vec {
                obs.update(i_save, record)
                    .context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let ticks: Vec<_> = (0..self.cfg.saves_per_run())
            .map(|i_save| i_save * self.cfg.output.steps_per_save)
            .collect();
        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        let summary = serde_json::json!({ "ticks": ticks, "observables": reports });
        serde_json::to_writer_pretty(writer, &summary)?;
        Ok(())
    }
}

/// Write the per-agent rows of every record as CSV.
pub fn write_results_csv<P: AsRef<Path>>(file: P, records: &[Record]) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let mut writer = BufWriter::new(file);

    writeln!(
        writer,
        "time,agentID,stray_dogs,attitude,prob_acquire,prob_release,norm_education_level"
    )?;
    for row in records.iter().flat_map(|record| &record.agent_rows) {
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            row.time,
            row.agent_id,
            row.num_stray_dogs,
            row.normal_attitude,
            row.p_acquire,
            row.p_release,
            row.norm_education_level
        )?;
    }

    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}

/// Write the node rendering attributes of every record as JSON.
pub fn write_visuals<P: AsRef<Path>>(file: P, records: &[Record]) -> Result<()> {
    let file = file.as_ref();
    let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
    let writer = BufWriter::new(file);

    let frames: Vec<_> = records
        .iter()
        .map(|record| serde_json::json!({ "tick": record.tick, "nodes": record.node_visuals }))
        .collect();
    serde_json::to_writer_pretty(writer, &frames)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitConfig, ModelConfig, NetworkConfig, OutputConfig, TopologyConfig};
    use crate::types::{AgentRow, NodeVisual, Summary};

    fn config() -> Config {
        Config {
            model: ModelConfig {
                time_span: 20,
                seed: None,
            },
            network: NetworkConfig {
                n_agents: 2,
                topology: TopologyConfig::ErdosRenyi { p: 1.0 },
            },
            init: InitConfig::default(),
            output: OutputConfig { steps_per_save: 10 },
        }
    }

    fn record(tick: usize, n_strays: usize) -> Record {
        let row = |agent_id, normal_attitude| AgentRow {
            time: tick,
            agent_id,
            num_stray_dogs: 0,
            normal_attitude,
            p_acquire: 0.1,
            p_release: 0.5,
            norm_education_level: 0.25,
        };
        Record {
            tick,
            summary: Summary {
                n_dogs: 2 * n_strays,
                n_owned: n_strays,
                n_strays,
                n_sterilized: 0,
                n_births: 0,
                n_exposed: n_strays,
                dog_education: 0.0,
            },
            agent_rows: vec![row(0, 0.2), row(1, f64::NAN)],
            node_visuals: vec![
                NodeVisual {
                    color: 0.25,
                    opacity: 0.0,
                };
                2
            ],
        }
    }

    #[test]
    fn accumulates_across_runs() {
        let mut analyzer = Analyzer::new(config());
        analyzer.add_run(&[record(0, 1), record(10, 3)]).unwrap();
        analyzer.add_run(&[record(0, 3), record(10, 5)]).unwrap();
        assert!(analyzer.add_run(&[record(0, 3)]).is_err());

        let report = analyzer.obs_ptr_vec[0].report();
        assert_eq!(report["n_strays"][0]["mean"], 2.0);
        assert_eq!(report["n_strays"][1]["mean"], 4.0);

        let report = analyzer.obs_ptr_vec[2].report();
        assert_eq!(report["n_births"][1]["mean"], 0.0);

        let report = analyzer.obs_ptr_vec[3].report();
        assert_eq!(report["avg_attitude"][0]["mean"], 0.2);
    }

    #[test]
    fn csv_has_one_row_per_agent_and_record() {
        let dir = std::env::temp_dir().join(format!("dogsim-analysis-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("results.csv");

        write_results_csv(&file, &[record(0, 1), record(10, 2)]).unwrap();
        let contents = std::fs::read_to_string(&file).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("time,agentID,"));
        assert_eq!(lines[1], "0,0,0,0.2,0.1,0.5,0.25");
        assert!(lines[4].starts_with("10,1,0,NaN,"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
