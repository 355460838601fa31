use crate::graph::AgentId;
use rand::prelude::*;

/// Index of a dog in the network roster (creation order).
pub type DogId = usize;

/// Minimum number of ticks after a birth before the reproduction
/// probability is recomputed.
pub const MIN_GESTATION: u32 = 5;

/// Dog of the simulation, either owned by an agent or stray.
///
/// A stray dog keeps its current location in `loc`; an owned dog is
/// located at its owner.
#[derive(Debug, Clone)]
pub struct Dog {
    owner: Option<AgentId>,
    loc: AgentId,
    is_sterilized: bool,
    prob_rand_reproduce: f64,
    prob_reproduce: f64,
    /// Ticks since the last birth; `None` if the dog never gave birth.
    last_birth: Option<u32>,
}

impl Dog {
    /// Create a new fertile dog at `loc`.
    ///
    /// `el_factor` is the owner's normalized education level, or 1 for a stray.
    pub fn new<R: Rng + ?Sized>(
        owner: Option<AgentId>,
        loc: AgentId,
        el_factor: f64,
        rng: &mut R,
    ) -> Self {
        let mut dog = Self {
            owner,
            loc,
            is_sterilized: false,
            prob_rand_reproduce: rng.random(),
            prob_reproduce: 0.0,
            last_birth: None,
        };
        dog.update_reproduce(el_factor, rng);
        dog
    }

    pub fn owner(&self) -> Option<AgentId> {
        self.owner
    }

    pub fn loc(&self) -> AgentId {
        self.loc
    }

    pub fn is_stray(&self) -> bool {
        self.owner.is_none()
    }

    pub fn is_sterilized(&self) -> bool {
        self.is_sterilized
    }

    pub fn last_birth(&self) -> Option<u32> {
        self.last_birth
    }

    /// Sterilization is permanent.
    pub fn sterilize(&mut self) {
        self.is_sterilized = true;
    }

    pub(crate) fn set_owner(&mut self, owner: Option<AgentId>) {
        self.owner = owner;
    }

    pub(crate) fn set_loc(&mut self, loc: AgentId) {
        self.loc = loc;
    }

    /// Ratchet the random reproduction factor upwards and recompute
    /// `prob_reproduce`.
    pub fn update_reproduce<R: Rng + ?Sized>(&mut self, el_factor: f64, rng: &mut R) {
        self.prob_rand_reproduce = rng.random_range(self.prob_rand_reproduce..=1.0);
        self.prob_reproduce =
            1.0 / (1.0 + 10.0 * el_factor * (-self.prob_rand_reproduce / 2.0).exp());
    }

    /// Attempt to give birth, returning whether a puppy was born.
    ///
    /// The caller is responsible for creating and registering the puppy.
    pub fn reproduce<R: Rng + ?Sized>(&mut self, el_factor: f64, rng: &mut R) -> bool {
        if self.is_sterilized {
            return false;
        }

        self.last_birth = self.last_birth.map(|ticks| ticks.saturating_add(1));
        let rand: f64 = rng.random();

        if self.last_birth.is_none_or(|ticks| ticks > MIN_GESTATION) {
            self.update_reproduce(el_factor, rng);
        }

        if rand < self.prob_reproduce {
            self.prob_rand_reproduce = 0.0;
            self.prob_reproduce = 0.0;
            self.last_birth = Some(0);
            return true;
        }
        false
    }
}
