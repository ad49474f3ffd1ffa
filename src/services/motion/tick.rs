use rand::distr::{Distribution, StandardUniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

/// Draws a fresh sleep duration for every tick from `[min, max]`, so the update
/// cadence never becomes perfectly periodic.
pub struct TickScheduler {
    min: Duration,
    max: Duration,
    rng: StdRng,
}

impl TickScheduler {
    pub fn new(min: Duration, max: Duration, seed: u64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        // A zero interval would turn the loop into a busy spin.
        let min = min.max(Duration::from_millis(1));
        let max = max.max(min);
        TickScheduler {
            min,
            max,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_interval(&mut self) -> Duration {
        let spread = (self.max - self.min).as_secs_f64();
        let u: f64 = StandardUniform.sample(&mut self.rng);
        // u is in [0, 1); millisecond granularity keeps virtual-time tests readable
        let offset_ms = (spread * u * 1000.0).round() as u64;
        (self.min + Duration::from_millis(offset_ms)).min(self.max)
    }
}
