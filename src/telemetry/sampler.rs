use rand::Rng;

use crate::settings::TelemetrySettings;

use super::{RawSample, TelemetrySnapshot};

/// Random-walk load sampler.
///
/// Holds no RNG of its own; callers pass one in so a seeded generator replays
/// the same walk.
#[derive(Debug, Clone)]
pub struct MetricsSampler {
    window_size: usize,
    initial_load: f64,
    load_floor: f64,
    load_ceiling: f64,
    perturbation_bound: f64,
    temperature_baseline_c: f64,
    temperature_spread_c: f64,
    active_threads: u32,
}

impl MetricsSampler {
    pub fn new(settings: &TelemetrySettings) -> Self {
        Self {
            window_size: settings.window_size.max(1),
            initial_load: settings.initial_load,
            load_floor: settings.load_floor,
            load_ceiling: settings.load_ceiling,
            perturbation_bound: settings.perturbation_bound,
            temperature_baseline_c: settings.temperature_baseline_c,
            temperature_spread_c: settings.temperature_spread_c,
            active_threads: settings.active_threads,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Next load value: last sample plus a perturbation in
    /// `[-bound, +bound]`, clamped to the load floor and ceiling.
    pub fn next_load<R: Rng>(&self, previous: &[f64], rng: &mut R) -> f64 {
        let last = previous.last().copied().unwrap_or(self.initial_load);
        let delta = rng.gen_range(-self.perturbation_bound..=self.perturbation_bound);
        (last + delta).clamp(self.load_floor, self.load_ceiling)
    }

    pub fn next_window<R: Rng>(&self, previous: &[f64], rng: &mut R) -> Vec<f64> {
        let load = self.next_load(previous, rng);
        slide_window(previous, load, self.window_size, self.initial_load)
    }

    pub fn sample<R: Rng>(&self, previous: &TelemetrySnapshot, rng: &mut R) -> RawSample {
        let cpu_load_window = self.next_window(&previous.cpu_load_window, rng);
        let temperature_c =
            self.temperature_baseline_c + rng.gen_range(0.0..=self.temperature_spread_c);

        RawSample {
            cpu_load_window,
            temperature_c,
            active_threads: self.active_threads,
        }
    }
}

/// Drop the oldest entries of `previous` and append `sample`, returning a
/// window of exactly `size` values. A short window is padded at the front
/// with `fill`.
pub fn slide_window(previous: &[f64], sample: f64, size: usize, fill: f64) -> Vec<f64> {
    let size = size.max(1);
    let keep = size - 1;
    let tail = &previous[previous.len().saturating_sub(keep)..];

    let mut window = Vec::with_capacity(size);
    window.extend(std::iter::repeat(fill).take(keep - tail.len()));
    window.extend_from_slice(tail);
    window.push(sample);
    window
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn sampler() -> MetricsSampler {
        MetricsSampler::new(&TelemetrySettings::default())
    }

    #[test]
    fn slide_drops_oldest_and_appends_newest() {
        let previous: Vec<f64> = (0..20).map(f64::from).collect();
        let next = slide_window(&previous, 99.0, 20, 10.0);
        assert_eq!(next.len(), 20);
        assert_eq!(next[0], 1.0);
        assert_eq!(next[18], 19.0);
        assert_eq!(next[19], 99.0);
    }

    #[test]
    fn slide_pads_short_windows() {
        let next = slide_window(&[30.0, 40.0], 50.0, 5, 10.0);
        assert_eq!(next, vec![10.0, 10.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn slide_truncates_long_windows() {
        let previous = vec![1.0; 30];
        assert_eq!(slide_window(&previous, 2.0, 20, 10.0).len(), 20);
    }

    #[test]
    fn next_load_stays_within_perturbation_and_bounds() {
        let sampler = sampler();
        let mut rng = StdRng::seed_from_u64(42);
        let mut window = vec![10.0; 20];

        for _ in 0..1_000 {
            let last = *window.last().unwrap();
            let next = sampler.next_window(&window, &mut rng);
            let load = *next.last().unwrap();
            assert!((5.0..=100.0).contains(&load), "load {load} escaped bounds");
            assert!((load - last).abs() <= 5.0 + 1e-9 || load == 5.0 || load == 100.0);
            assert_eq!(next.len(), 20);
            window = next;
        }
    }

    #[test]
    fn empty_window_falls_back_to_initial_load() {
        let sampler = sampler();
        let mut rng = StdRng::seed_from_u64(1);
        let load = sampler.next_load(&[], &mut rng);
        assert!((5.0..=15.0).contains(&load));
    }

    #[test]
    fn same_seed_replays_same_walk() {
        let sampler = sampler();
        let walk = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut window = vec![10.0; 20];
            for _ in 0..50 {
                window = sampler.next_window(&window, &mut rng);
            }
            window
        };
        assert_eq!(walk(9), walk(9));
        assert_ne!(walk(9), walk(10));
    }

    #[test]
    fn ambient_fields_follow_settings() {
        let sampler = sampler();
        let mut rng = StdRng::seed_from_u64(3);
        let previous = TelemetrySnapshot::initial(&TelemetrySettings::default());
        let raw = sampler.sample(&previous, &mut rng);
        assert_eq!(raw.active_threads, 4);
        assert!((45.0..=50.0).contains(&raw.temperature_c));
    }
}
