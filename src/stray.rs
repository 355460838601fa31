use crate::dog::DogId;
use crate::graph::AgentId;
use anyhow::{Result, bail};
use std::collections::HashMap;

/// Location index of stray dogs.
///
/// Keeps `location_of` and `strays_at` mutually consistent: a dog is in
/// the bucket of location `loc` iff `location_of[dog] == loc`.
#[derive(Debug, Clone, Default)]
pub struct StrayIndex {
    location_of: HashMap<DogId, AgentId>,
    strays_at: Vec<Vec<DogId>>,
    /// Strays in registration order.
    strays: Vec<DogId>,
}

impl StrayIndex {
    pub fn new(n_locations: usize) -> Self {
        Self {
            location_of: HashMap::new(),
            strays_at: vec![Vec::new(); n_locations],
            strays: Vec::new(),
        }
    }

    /// Register `dog` as stray at `loc`.
    pub fn add(&mut self, loc: AgentId, dog: DogId) -> Result<()> {
        if loc >= self.strays_at.len() {
            bail!("location {loc} does not exist");
        }
        if let Some(prev) = self.location_of.get(&dog) {
            bail!("dog {dog} is already registered as stray at {prev}");
        }
        self.location_of.insert(dog, loc);
        self.strays_at[loc].push(dog);
        self.strays.push(dog);
        Ok(())
    }

    /// Move a registered stray from its current location to `to`.
    pub fn relocate(&mut self, dog: DogId, to: AgentId) -> Result<()> {
        if to >= self.strays_at.len() {
            bail!("location {to} does not exist");
        }
        let Some(&from) = self.location_of.get(&dog) else {
            bail!("dog {dog} is not registered as stray");
        };
        let bucket = &mut self.strays_at[from];
        let Some(i_dog) = bucket.iter().position(|&d| d == dog) else {
            bail!("dog {dog} is missing from the bucket of location {from}");
        };
        bucket.remove(i_dog);
        self.strays_at[to].push(dog);
        self.location_of.insert(dog, to);
        Ok(())
    }

    /// Strays currently at `loc`.
    pub fn at(&self, loc: AgentId) -> &[DogId] {
        &self.strays_at[loc]
    }

    pub fn location_of(&self, dog: DogId) -> Option<AgentId> {
        self.location_of.get(&dog).copied()
    }

    pub fn contains(&self, dog: DogId) -> bool {
        self.location_of.contains_key(&dog)
    }

    /// All strays in registration order.
    pub fn strays(&self) -> &[DogId] {
        &self.strays
    }

    pub fn len(&self) -> usize {
        self.strays.len()
    }

    /// Check that both mappings describe the same placement.
    pub fn check_consistency(&self) -> Result<()> {
        let mut n_bucketed = 0;
        for (loc, bucket) in self.strays_at.iter().enumerate() {
            for &dog in bucket {
                if self.location_of.get(&dog) != Some(&loc) {
                    bail!("dog {dog} is in the bucket of {loc} but located elsewhere");
                }
                n_bucketed += 1;
            }
        }
        if n_bucketed != self.location_of.len() || n_bucketed != self.strays.len() {
            bail!(
                "index sizes differ: {n_bucketed} bucketed, {} located, {} registered",
                self.location_of.len(),
                self.strays.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_relocate_keep_index_consistent() {
        let mut index = StrayIndex::new(3);
        index.add(0, 7).unwrap();
        index.add(0, 8).unwrap();
        index.relocate(7, 2).unwrap();

        assert_eq!(index.at(0), &[8]);
        assert_eq!(index.at(2), &[7]);
        assert_eq!(index.location_of(7), Some(2));
        assert_eq!(index.strays(), &[7, 8]);
        index.check_consistency().unwrap();
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut index = StrayIndex::new(2);
        index.add(1, 0).unwrap();
        assert!(index.add(0, 0).is_err());
        assert_eq!(index.len(), 1);
        index.check_consistency().unwrap();
    }

    #[test]
    fn relocating_unknown_stray_is_rejected() {
        let mut index = StrayIndex::new(2);
        assert!(index.relocate(4, 1).is_err());
        assert!(!index.contains(4));
    }
}
