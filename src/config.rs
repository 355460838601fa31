use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub network: NetworkConfig,
    #[serde(default)]
    pub init: InitConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Model parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Number of ticks simulated per run.
    pub time_span: usize,
    /// Base seed of the random number generator (run `r` uses `seed + r`).
    pub seed: Option<u64>,
}

/// Network parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Number of agents (households).
    pub n_agents: usize,
    /// Graph construction policy.
    pub topology: TopologyConfig,
}

/// Graph construction policy and its parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologyConfig {
    ErdosRenyi {
        #[serde(default = "default_er_p")]
        p: f64,
    },
    SmallWorld {
        #[serde(default = "default_sw_k")]
        k: usize,
        #[serde(default)]
        p: f64,
    },
    ScaleFree {
        #[serde(default = "default_sf_m")]
        m_0: usize,
        #[serde(default = "default_sf_m")]
        m: usize,
    },
}

fn default_er_p() -> f64 {
    0.25
}

fn default_sw_k() -> usize {
    4
}

fn default_sf_m() -> usize {
    4
}

/// Agent factory sampling parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitConfig {
    pub mean_income: f64,
    pub std_dev_income: f64,
    pub mean_residents: f64,
    pub std_dev_residents: f64,
    pub mean_dogs: f64,
    pub std_dev_dogs: f64,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            mean_income: 50500.0,
            std_dev_income: 10000.0,
            mean_residents: 4.0,
            std_dev_residents: 1.0,
            mean_dogs: 1.0,
            std_dev_dogs: 1.0,
        }
    }
}

/// Output parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Number of ticks between saved records.
    pub steps_per_save: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { steps_per_save: 10 }
    }
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Number of records saved during one run.
    pub fn saves_per_run(&self) -> usize {
        self.model.time_span.div_ceil(self.output.steps_per_save)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.model.time_span, 1..=1_000_000).context("invalid time span")?;

        let n_agents = self.network.n_agents;
        check_num(n_agents, 1..=100_000).context("invalid number of agents")?;
        match self.network.topology {
            TopologyConfig::ErdosRenyi { p } => {
                check_num(p, 0.0..=1.0).context("invalid edge probability")?;
            }
            TopologyConfig::SmallWorld { k, p } => {
                check_num(k, 0..n_agents).context("invalid number of lattice neighbors")?;
                check_num(p, 0.0..=1.0).context("invalid rewiring probability")?;
            }
            TopologyConfig::ScaleFree { m_0, m } => {
                check_num(m_0, 1..=n_agents).context("invalid number of baseline nodes")?;
                check_num(m, 0..=n_agents).context("invalid number of edges per node")?;
            }
        }

        let init = &self.init;
        check_num(init.mean_income, 0.0..=1.0e9).context("invalid mean income")?;
        check_num(init.std_dev_income, 0.0..=1.0e8)
            .context("invalid income standard deviation")?;
        check_num(init.mean_residents, 0.0..=1000.0)
            .context("invalid mean number of residents")?;
        check_num(init.std_dev_residents, 0.0..=100.0)
            .context("invalid residents standard deviation")?;
        check_num(init.mean_dogs, 0.0..100.0).context("invalid mean number of dogs")?;
        check_num(init.std_dev_dogs, 0.0..100.0).context("invalid dogs standard deviation")?;

        check_num(self.output.steps_per_save, 1..=self.model.time_span)
            .context("invalid number of steps per save")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
