use rand::{rngs::StdRng, SeedableRng};

use crate::settings::TelemetrySettings;

use super::{MetricsSampler, ResourceCoupler, TelemetrySnapshot};

/// Sampler and coupler chained over a single RNG, carrying the last
/// published snapshot forward.
pub struct TelemetryGenerator {
    sampler: MetricsSampler,
    coupler: ResourceCoupler,
    rng: StdRng,
    current: TelemetrySnapshot,
}

impl TelemetryGenerator {
    pub fn new(settings: &TelemetrySettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(settings, rng)
    }

    pub fn with_seed(settings: &TelemetrySettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: &TelemetrySettings, rng: StdRng) -> Self {
        Self {
            sampler: MetricsSampler::new(settings),
            coupler: ResourceCoupler::new(settings),
            rng,
            current: TelemetrySnapshot::initial(settings),
        }
    }

    pub fn current(&self) -> &TelemetrySnapshot {
        &self.current
    }

    /// Advance one tick using the processing flag as read at the start of it.
    pub fn tick(&mut self, processing: bool) -> TelemetrySnapshot {
        let raw = self.sampler.sample(&self.current, &mut self.rng);
        let next = self.coupler.couple(&self.current, raw, processing, &mut self.rng);
        debug_assert_eq!(next.cpu_load_window.len(), self.sampler.window_size());
        self.current = next.clone();
        next
    }
}
