//! Household agents and their per-tick behavioral rules.

use crate::dog::DogId;
use crate::graph::AgentId;
use anyhow::{Result, bail};

/// Logistic transform centered at 5, mapping raw attitude and education
/// values onto the unit interval.
pub fn normalize(val: f64) -> f64 {
    1.0 / (1.0 + (-(val - 5.0)).exp())
}

/// Inverse of [`normalize`] on `(0, 1)`.
pub fn denormalize(val: f64) -> f64 {
    5.0 - (1.0 / val - 1.0).ln()
}

/// Sampled attributes of a household before it joins a network.
#[derive(Debug, Clone, PartialEq)]
pub struct Household {
    pub income: u32,
    pub num_residents: u32,
    /// Number of dogs the household starts with.
    pub num_dogs: usize,
    /// Raw (unnormalized) attitude towards dogs.
    pub attitude: f64,
    /// Raw (unnormalized) education level.
    pub education_level: f64,
}

/// Household node of the network.
///
/// Normalized values are always recomputed from their raw counterparts.
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    income: u32,
    num_residents: u32,
    has_children: bool,

    dogs: Vec<DogId>,
    num_stray_dogs: usize,
    has_stray_dog: bool,

    attitude: f64,
    normal_attitude: f64,
    education_level: f64,
    norm_education_level: f64,

    p_acquire: f64,
    p_release: f64,
    p_sterilization: f64,
}

impl Agent {
    /// Create an agent without dogs; initial probabilities assume the
    /// household's initial dog count.
    pub fn new(id: AgentId, household: &Household) -> Self {
        let normal_attitude = normalize(household.attitude);
        let norm_education_level = normalize(household.education_level);
        Self {
            id,
            income: household.income,
            num_residents: household.num_residents,
            has_children: household.num_residents > 2,
            dogs: Vec::with_capacity(household.num_dogs),
            num_stray_dogs: 0,
            has_stray_dog: false,
            attitude: household.attitude,
            normal_attitude,
            education_level: household.education_level,
            norm_education_level,
            p_acquire: normal_attitude / (1.0 + household.num_dogs as f64),
            p_release: (-normal_attitude).exp(),
            p_sterilization: norm_education_level.powi(2),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn income(&self) -> u32 {
        self.income
    }

    pub fn num_residents(&self) -> u32 {
        self.num_residents
    }

    pub fn has_children(&self) -> bool {
        self.has_children
    }

    pub fn dogs(&self) -> &[DogId] {
        &self.dogs
    }

    pub fn num_dogs(&self) -> usize {
        self.dogs.len()
    }

    pub fn num_stray_dogs(&self) -> usize {
        self.num_stray_dogs
    }

    pub fn has_stray_dog(&self) -> bool {
        self.has_stray_dog
    }

    pub fn attitude(&self) -> f64 {
        self.attitude
    }

    pub fn normal_attitude(&self) -> f64 {
        self.normal_attitude
    }

    pub fn education_level(&self) -> f64 {
        self.education_level
    }

    pub fn norm_education_level(&self) -> f64 {
        self.norm_education_level
    }

    pub fn p_acquire(&self) -> f64 {
        self.p_acquire
    }

    pub fn p_release(&self) -> f64 {
        self.p_release
    }

    pub fn p_sterilization(&self) -> f64 {
        self.p_sterilization
    }

    /// Social influence: neighbors' attitude pulls harder on educated
    /// households and weaker where strays are around.
    pub fn update_attitude(&mut self, mean_attitude: f64) {
        let delta = self.norm_education_level / (1.0 + self.num_stray_dogs as f64) * mean_attitude;
        self.attitude += delta;
        self.normal_attitude = normalize(self.attitude);
    }

    pub fn update_prob_acquire(&mut self) {
        self.p_acquire = self.normal_attitude / (1.0 + self.num_dogs() as f64);
    }

    pub fn update_prob_release(&mut self) {
        self.p_release = (-self.normal_attitude).exp();
    }

    /// Neighbors' education plus the global campaign, the latter weighted
    /// by a bump that peaks at mid-range education.
    pub fn update_education(&mut self, mean_education: f64, dog_education: f64) {
        let bump = 1.0 - (self.norm_education_level - 0.5).powi(2);
        let delta = mean_education + dog_education * bump;
        self.education_level += delta;
        self.norm_education_level = normalize(self.education_level);
    }

    pub fn update_prob_sterilization(&mut self) {
        self.p_sterilization = self.norm_education_level.powi(2);
    }

    pub fn update_stray(&mut self, num_stray_dogs: usize) {
        self.num_stray_dogs = num_stray_dogs;
        self.has_stray_dog = num_stray_dogs > 0;
    }

    pub(crate) fn add_dog(&mut self, dog: DogId) {
        self.dogs.push(dog);
    }

    pub(crate) fn remove_dog(&mut self, dog: DogId) -> Result<()> {
        let Some(i_dog) = self.dogs.iter().position(|&d| d == dog) else {
            bail!("agent {} does not own dog {dog}", self.id);
        };
        self.dogs.remove(i_dog);
        Ok(())
    }
}
