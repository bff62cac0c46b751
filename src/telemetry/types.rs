use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::settings::TelemetrySettings;

/// One immutable telemetry reading, published once per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    /// 0 for the boot snapshot, then one per tick.
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
    /// Most recent sample last.
    pub cpu_load_window: Vec<f64>,
    pub ram_usage_gb: f64,
    pub temperature_c: f64,
    pub inference_speed_tps: f64,
    pub active_threads: u32,
}

impl TelemetrySnapshot {
    /// Reading shown before the first tick: flat load, RAM at its floor, no threads.
    pub fn initial(settings: &TelemetrySettings) -> Self {
        Self {
            sequence: 0,
            captured_at: Utc::now(),
            cpu_load_window: vec![settings.initial_load; settings.window_size],
            ram_usage_gb: settings.ram_floor_gb,
            temperature_c: settings.temperature_baseline_c,
            inference_speed_tps: 0.0,
            active_threads: 0,
        }
    }

    pub fn current_load(&self) -> Option<f64> {
        self.cpu_load_window.last().copied()
    }
}

/// Sampler output before the processing flag is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub cpu_load_window: Vec<f64>,
    pub temperature_c: f64,
    pub active_threads: u32,
}
