use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
    time::Duration,
};

/// Tunables for the metrics sampler, the resource coupler and the tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetrySettings {
    pub tick_interval_ms: u64,
    pub window_size: usize,
    /// Load every window slot starts at, and the fallback for an empty window.
    pub initial_load: f64,
    pub load_floor: f64,
    pub load_ceiling: f64,
    pub perturbation_bound: f64,
    pub spike_increment: f64,
    pub ram_floor_gb: f64,
    pub ram_ceiling_gb: f64,
    pub ram_step_busy_gb: f64,
    pub ram_step_idle_gb: f64,
    pub inference_speed_min: f64,
    pub inference_speed_max: f64,
    pub temperature_baseline_c: f64,
    pub temperature_spread_c: f64,
    pub active_threads: u32,
    /// Fixed RNG seed for reproducible runs. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            window_size: 20,
            initial_load: 10.0,
            load_floor: 5.0,
            load_ceiling: 100.0,
            perturbation_bound: 5.0,
            spike_increment: 40.0,
            ram_floor_gb: 4.2,
            ram_ceiling_gb: 15.5,
            ram_step_busy_gb: 0.1,
            ram_step_idle_gb: 0.05,
            inference_speed_min: 8.0,
            inference_speed_max: 12.0,
            temperature_baseline_c: 45.0,
            temperature_spread_c: 5.0,
            active_threads: 4,
            seed: None,
        }
    }
}

impl TelemetrySettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// The canned answer the simulated backend returns for every prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimulatedResponseSettings {
    pub content: String,
    pub tokens_per_second: f64,
    pub processing_time_sec: f64,
    pub used_ram_mb: u64,
    pub sources: Vec<String>,
}

impl Default for SimulatedResponseSettings {
    fn default() -> Self {
        Self {
            content: "Based on the internal documents, the B4ms instance provides 4 vCPUs and 16GB of RAM. \
                      This configuration suggests we should use quantized models (q4_0 or q5_km) to maintain \
                      acceptable inference speeds. The 'Project_Titan_Logs.txt' file indicates high CPU \
                      contention during the last batch ingest."
                .into(),
            tokens_per_second: 8.4,
            processing_time_sec: 2.1,
            used_ram_mb: 640,
            sources: vec![
                "Azure_B4ms_Specs.pdf".into(),
                "Project_Titan_Logs.txt".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    pub response_latency_ms: u64,
    /// Agent announced in the conversation's opening system message.
    pub active_agent_id: String,
    pub response: SimulatedResponseSettings,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            response_latency_ms: 2500,
            active_agent_id: "2".into(),
            response: SimulatedResponseSettings::default(),
        }
    }
}

impl ChatSettings {
    pub fn response_latency(&self) -> Duration {
        Duration::from_millis(self.response_latency_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub telemetry: TelemetrySettings,
    pub chat: ChatSettings,
}

const MAX_LOAD_PERCENT: f64 = 100.0;
const MAX_RAM_GB: f64 = 1024.0;
const MAX_INFERENCE_SPEED_TPS: f64 = 10_000.0;
const TEMPERATURE_RANGE_C: std::ops::RangeInclusive<f64> = -50.0..=150.0;
const MAX_TEMPERATURE_SPREAD_C: f64 = 100.0;

impl EngineSettings {
    pub fn validate(&self) -> Result<()> {
        let t = &self.telemetry;
        if t.tick_interval_ms == 0 {
            bail!("tickIntervalMs must be greater than zero");
        }
        if t.window_size == 0 {
            bail!("windowSize must be greater than zero");
        }
        let floats = [
            ("initialLoad", t.initial_load),
            ("loadFloor", t.load_floor),
            ("loadCeiling", t.load_ceiling),
            ("perturbationBound", t.perturbation_bound),
            ("spikeIncrement", t.spike_increment),
            ("ramFloorGb", t.ram_floor_gb),
            ("ramCeilingGb", t.ram_ceiling_gb),
            ("ramStepBusyGb", t.ram_step_busy_gb),
            ("ramStepIdleGb", t.ram_step_idle_gb),
            ("inferenceSpeedMin", t.inference_speed_min),
            ("inferenceSpeedMax", t.inference_speed_max),
            ("temperatureBaselineC", t.temperature_baseline_c),
            ("temperatureSpreadC", t.temperature_spread_c),
        ];
        if let Some((name, value)) = floats.iter().find(|(_, value)| !value.is_finite()) {
            bail!("{name} must be a finite number (got {value})");
        }

        if !(0.0..=MAX_LOAD_PERCENT).contains(&t.load_floor)
            || !(0.0..=MAX_LOAD_PERCENT).contains(&t.load_ceiling)
            || t.load_floor > t.load_ceiling
        {
            bail!(
                "load bounds must satisfy 0 <= floor <= ceiling <= 100 (got {}..{})",
                t.load_floor,
                t.load_ceiling
            );
        }
        if !(t.load_floor..=t.load_ceiling).contains(&t.initial_load) {
            bail!(
                "initialLoad ({}) must lie within the load bounds {}..{}",
                t.initial_load,
                t.load_floor,
                t.load_ceiling
            );
        }
        let load_span = t.load_ceiling - t.load_floor;
        if !(0.0..=load_span).contains(&t.perturbation_bound) {
            bail!(
                "perturbationBound ({}) must be between 0 and the load span ({load_span})",
                t.perturbation_bound
            );
        }
        if !(0.0..=MAX_LOAD_PERCENT).contains(&t.spike_increment) {
            bail!("spikeIncrement ({}) must be between 0 and 100", t.spike_increment);
        }

        if t.ram_floor_gb < 0.0 || t.ram_floor_gb > t.ram_ceiling_gb || t.ram_ceiling_gb > MAX_RAM_GB {
            bail!(
                "RAM bounds must satisfy 0 <= ramFloorGb <= ramCeilingGb <= {MAX_RAM_GB} (got {}..{})",
                t.ram_floor_gb,
                t.ram_ceiling_gb
            );
        }
        let ram_span = t.ram_ceiling_gb - t.ram_floor_gb;
        if !(0.0..=ram_span).contains(&t.ram_step_busy_gb)
            || !(0.0..=ram_span).contains(&t.ram_step_idle_gb)
        {
            bail!("RAM steps must be between 0 and the RAM span ({ram_span})");
        }

        if t.inference_speed_min < 0.0
            || t.inference_speed_min > t.inference_speed_max
            || t.inference_speed_max > MAX_INFERENCE_SPEED_TPS
        {
            bail!(
                "inference speed range must satisfy 0 <= min <= max <= {MAX_INFERENCE_SPEED_TPS} (got {}..{})",
                t.inference_speed_min,
                t.inference_speed_max
            );
        }

        if !TEMPERATURE_RANGE_C.contains(&t.temperature_baseline_c) {
            bail!(
                "temperatureBaselineC ({}) must be between {} and {}",
                t.temperature_baseline_c,
                TEMPERATURE_RANGE_C.start(),
                TEMPERATURE_RANGE_C.end()
            );
        }
        if !(0.0..=MAX_TEMPERATURE_SPREAD_C).contains(&t.temperature_spread_c) {
            bail!(
                "temperatureSpreadC ({}) must be between 0 and {MAX_TEMPERATURE_SPREAD_C}",
                t.temperature_spread_c
            );
        }
        Ok(())
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or unreadable as JSON.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<EngineSettings>(&contents) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(
                        "Ignoring malformed settings at {}: {err}; using defaults",
                        path.display()
                    );
                    EngineSettings::default()
                }
            }
        } else {
            EngineSettings::default()
        };

        data.validate()
            .with_context(|| format!("Invalid settings in {}", path.display()))?;

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    /// Re-read the file. Unlike `new`, a malformed or invalid file is an error
    /// and the current settings stay in place.
    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: EngineSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        data.validate()?;
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = data;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_console_constants() {
        let settings = EngineSettings::default();
        assert_eq!(settings.telemetry.tick_interval(), Duration::from_millis(1000));
        assert_eq!(settings.telemetry.window_size, 20);
        assert_eq!(settings.telemetry.ram_floor_gb, 4.2);
        assert_eq!(settings.telemetry.ram_ceiling_gb, 15.5);
        assert_eq!(settings.telemetry.spike_increment, 40.0);
        assert_eq!(settings.chat.response_latency(), Duration::from_millis(2500));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("absent.json")).expect("store");
        assert_eq!(store.engine(), EngineSettings::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"chat":{"responseLatencyMs":10}}"#).expect("write");

        let store = SettingsStore::new(path).expect("store");
        let engine = store.engine();
        assert_eq!(engine.chat.response_latency_ms, 10);
        assert_eq!(engine.chat.active_agent_id, "2");
        assert_eq!(engine.telemetry, TelemetrySettings::default());
    }

    #[test]
    fn update_persists_and_reload_reads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).expect("store");

        let mut settings = store.engine();
        settings.telemetry.seed = Some(7);
        store.update(settings.clone()).expect("update");

        let reopened = SettingsStore::new(path).expect("reopen");
        assert_eq!(reopened.engine(), settings);
        reopened.reload().expect("reload");
        assert_eq!(reopened.engine().telemetry.seed, Some(7));
    }

    #[test]
    fn update_rejects_inverted_ram_bounds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("store");

        let mut settings = store.engine();
        settings.telemetry.ram_floor_gb = 20.0;
        assert!(store.update(settings).is_err());
        assert_eq!(store.engine(), EngineSettings::default());
    }

    #[test]
    fn initial_load_outside_load_bounds_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"telemetry":{"initialLoad":250.0}}"#).expect("write");
        let err = SettingsStore::new(path).err().expect("initialLoad above the ceiling");
        assert!(format!("{err:#}").contains("initialLoad"));

        let mut settings = EngineSettings::default();
        settings.telemetry.initial_load = 2.0;
        assert!(settings.validate().is_err(), "below the default floor of 5");
    }

    #[test]
    fn oversized_random_ranges_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"telemetry":{"perturbationBound":1.7e308}}"#).expect("write");
        assert!(SettingsStore::new(path).is_err());

        let base = EngineSettings::default();
        let mut wide_speed = base.clone();
        wide_speed.telemetry.inference_speed_max = f64::MAX;
        let mut wide_spread = base.clone();
        wide_spread.telemetry.temperature_spread_c = 1e300;
        let mut nan_step = base.clone();
        nan_step.telemetry.ram_step_busy_gb = f64::NAN;
        for settings in [wide_speed, wide_spread, nan_step] {
            assert!(settings.validate().is_err());
        }
    }

    #[test]
    fn widest_accepted_ranges_still_tick() {
        let mut settings = EngineSettings::default();
        let t = &mut settings.telemetry;
        t.load_floor = 0.0;
        t.load_ceiling = 100.0;
        t.initial_load = 100.0;
        t.perturbation_bound = 100.0;
        t.spike_increment = 100.0;
        t.inference_speed_max = 10_000.0;
        t.temperature_spread_c = 100.0;
        settings.validate().expect("limits are inclusive");

        let mut generator =
            crate::telemetry::TelemetryGenerator::with_seed(&settings.telemetry, 11);
        for busy in [false, true, true, false] {
            let snapshot = generator.tick(busy);
            assert!(snapshot
                .cpu_load_window
                .iter()
                .all(|load| (0.0..=100.0).contains(load)));
        }
    }

    #[test]
    fn invalid_file_fails_to_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"telemetry":{"windowSize":0}}"#).expect("write");
        assert!(SettingsStore::new(path).is_err());
    }
}
