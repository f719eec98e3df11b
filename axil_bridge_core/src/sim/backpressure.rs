use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

/// When a simulated peer holds back its valid and ready lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StallPattern {
    #[default]
    Never,
    /// Stalled for the first `stalled` cycles of every `period`
    Periodic { period: u64, stalled: u64 },
    /// Stalled on roughly `percent` of cycles
    Random { percent: u32, seed: u64 },
}

#[derive(Clone, Debug)]
pub struct Backpressure {
    pattern: StallPattern,
    rng: StdRng,
}

impl Backpressure {
    pub fn new(pattern: StallPattern) -> Self {
        let seed = match pattern {
            StallPattern::Random { seed, .. } => seed,
            _ => 0,
        };
        Self {
            pattern,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn pattern(&self) -> StallPattern {
        self.pattern
    }

    pub fn stall(&mut self, cycle: u64) -> bool {
        match self.pattern {
            StallPattern::Never => false,
            StallPattern::Periodic { period, stalled } => {
                period != 0 && cycle % period < stalled
            }
            StallPattern::Random { percent, .. } => self.rng.random_ratio(percent.min(100), 100),
        }
    }
}

impl Default for Backpressure {
    fn default() -> Self {
        Self::new(StallPattern::Never)
    }
}
