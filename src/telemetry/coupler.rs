use chrono::Utc;
use rand::Rng;

use crate::settings::TelemetrySettings;

use super::{RawSample, TelemetrySnapshot};

/// Applies spike/decay dynamics to a raw sample depending on whether an
/// inference request is in flight.
#[derive(Debug, Clone)]
pub struct ResourceCoupler {
    spike_increment: f64,
    load_ceiling: f64,
    ram_floor_gb: f64,
    ram_ceiling_gb: f64,
    ram_step_busy_gb: f64,
    ram_step_idle_gb: f64,
    inference_speed_min: f64,
    inference_speed_max: f64,
}

impl ResourceCoupler {
    pub fn new(settings: &TelemetrySettings) -> Self {
        Self {
            spike_increment: settings.spike_increment,
            load_ceiling: settings.load_ceiling,
            ram_floor_gb: settings.ram_floor_gb,
            ram_ceiling_gb: settings.ram_ceiling_gb,
            ram_step_busy_gb: settings.ram_step_busy_gb,
            ram_step_idle_gb: settings.ram_step_idle_gb,
            inference_speed_min: settings.inference_speed_min,
            inference_speed_max: settings.inference_speed_max,
        }
    }

    pub fn couple<R: Rng>(
        &self,
        previous: &TelemetrySnapshot,
        raw: RawSample,
        processing: bool,
        rng: &mut R,
    ) -> TelemetrySnapshot {
        let mut cpu_load_window = raw.cpu_load_window;

        let (inference_speed_tps, ram_usage_gb) = if processing {
            if let Some(newest) = cpu_load_window.last_mut() {
                *newest = (*newest + self.spike_increment).min(self.load_ceiling);
            }
            let speed = rng.gen_range(self.inference_speed_min..=self.inference_speed_max);
            (speed, self.clamp_ram(previous.ram_usage_gb + self.ram_step_busy_gb))
        } else {
            (0.0, self.clamp_ram(previous.ram_usage_gb - self.ram_step_idle_gb))
        };

        TelemetrySnapshot {
            sequence: previous.sequence + 1,
            captured_at: Utc::now(),
            cpu_load_window,
            ram_usage_gb,
            temperature_c: raw.temperature_c,
            inference_speed_tps,
            active_threads: raw.active_threads,
        }
    }

    fn clamp_ram(&self, value: f64) -> f64 {
        value.clamp(self.ram_floor_gb, self.ram_ceiling_gb)
    }
}
