use crate::agent::{Household, denormalize};
use crate::config::InitConfig;
use anyhow::Result;
use rand::prelude::*;
use rand_distr::Normal;

/// Samples household attributes for newly created agents.
pub struct AgentFactory {
    income_dist: Normal<f64>,
    residents_dist: Normal<f64>,
    dogs_dist: Normal<f64>,
}

impl AgentFactory {
    pub fn new(cfg: &InitConfig) -> Result<Self> {
        Ok(Self {
            income_dist: Normal::new(cfg.mean_income, cfg.std_dev_income)?,
            residents_dist: Normal::new(cfg.mean_residents, cfg.std_dev_residents)?,
            dogs_dist: Normal::new(cfg.mean_dogs, cfg.std_dev_dogs)?,
        })
    }

    /// Sample one household.
    ///
    /// Counts are rounded normal samples clamped at zero; attitude and
    /// education are uniform on the normalized scale.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Household {
        let income = sample_count(&self.income_dist, rng).min(u32::MAX as f64) as u32;
        let num_residents = sample_count(&self.residents_dist, rng).min(u32::MAX as f64) as u32;
        let num_dogs = sample_count(&self.dogs_dist, rng) as usize;

        let attitude = denormalize(rng.random());
        let education_level = denormalize(rng.random());

        Household {
            income,
            num_residents,
            num_dogs,
            attitude,
            education_level,
        }
    }
}

/// Normal sample rounded to the nearest non-negative integer.
fn sample_count<R: Rng + ?Sized>(dist: &Normal<f64>, rng: &mut R) -> f64 {
    dist.sample(rng).round().max(0.0)
}
