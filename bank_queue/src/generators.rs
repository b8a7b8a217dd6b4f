//! Random process generators for customer arrivals and service times.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Exp1};

use crate::config::{ValidConfig, check_mean};
use crate::error::SimError;

/// Exponential interarrival and service-time samples drawn from one seeded
/// stream.
///
/// The stream is private: the only way to advance it is to ask for the next
/// sample, so a run's draws depend on nothing but the seed and the order in
/// which events request them.
pub struct RandomStreams {
    rng: StdRng,
    mean_interarrival: f64,
    mean_service: f64,
}

impl RandomStreams {
    pub fn new(mean_interarrival: f64, mean_service: f64, seed: u64) -> Result<Self, SimError> {
        check_mean("mean_interarrival_minutes", mean_interarrival)?;
        check_mean("mean_service_minutes", mean_service)?;
        Ok(Self::seeded(mean_interarrival, mean_service, seed))
    }

    pub fn for_config(config: &ValidConfig, seed: u64) -> Self {
        Self::seeded(
            config.mean_interarrival_minutes,
            config.mean_service_minutes,
            seed,
        )
    }

    fn seeded(mean_interarrival: f64, mean_service: f64, seed: u64) -> Self {
        RandomStreams {
            rng: StdRng::seed_from_u64(seed),
            mean_interarrival,
            mean_service,
        }
    }

    pub fn next_interarrival(&mut self) -> f64 {
        self.draw(self.mean_interarrival)
    }

    pub fn next_service_time(&mut self) -> f64 {
        self.draw(self.mean_service)
    }

    fn draw(&mut self, mean: f64) -> f64 {
        // Exp1 can return exactly zero; durations must be strictly positive
        loop {
            let unit: f64 = Exp1.sample(&mut self.rng);
            let sample = unit * mean;
            if sample > 0.0 {
                return sample;
            }
        }
    }
}
