//! Live-visitor counter for the analytics hero. A bounded random walk;
//! the number is decorative, not measured.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct VisitorCounter {
    current: u64,
    floor: u64,
    max_step: u64,
    rng: StdRng,
}

impl VisitorCounter {
    pub fn new(base: u64, floor: u64, max_step: u64) -> Self {
        Self::with_rng(base, floor, max_step, StdRng::from_entropy())
    }

    /// Deterministic counter for tests and snapshots.
    pub fn seeded(base: u64, floor: u64, max_step: u64, seed: u64) -> Self {
        Self::with_rng(base, floor, max_step, StdRng::seed_from_u64(seed))
    }

    fn with_rng(base: u64, floor: u64, max_step: u64, rng: StdRng) -> Self {
        Self {
            current: base.max(floor),
            floor,
            max_step,
            rng,
        }
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Move the counter by up to `max_step` in either direction.
    pub fn tick(&mut self) -> u64 {
        let magnitude = self.rng.gen_range(0..=self.max_step);
        self.current = if self.rng.gen_bool(0.5) {
            self.current.saturating_add(magnitude)
        } else {
            self.current.saturating_sub(magnitude).max(self.floor)
        };
        self.current
    }
}
