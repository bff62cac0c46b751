use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    events::EventBus,
    session::SessionController,
    settings::TelemetrySettings,
};

use super::{TelemetryGenerator, TelemetrySnapshot};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Drives the telemetry generator on a fixed period and publishes each
/// snapshot to the event bus and the latest-value channel.
#[derive(Clone)]
pub struct TickScheduler {
    generator: Arc<Mutex<TelemetryGenerator>>,
    session: SessionController,
    bus: EventBus,
    latest: Arc<watch::Sender<TelemetrySnapshot>>,
    ticker: Arc<Mutex<Option<(JoinHandle<()>, CancellationToken)>>>,
    tick_interval: Duration,
    heartbeat_every_ticks: u64,
}

impl TickScheduler {
    pub fn new(settings: &TelemetrySettings, session: SessionController, bus: EventBus) -> Self {
        Self::with_generator(TelemetryGenerator::new(settings), settings, session, bus)
    }

    pub fn with_generator(
        generator: TelemetryGenerator,
        settings: &TelemetrySettings,
        session: SessionController,
        bus: EventBus,
    ) -> Self {
        let debug_mode = std::env::var("DORADO_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let (latest, _) = watch::channel(generator.current().clone());

        Self {
            generator: Arc::new(Mutex::new(generator)),
            session,
            bus,
            latest: Arc::new(latest),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: settings.tick_interval(),
            heartbeat_every_ticks: if debug_mode { 1 } else { 10 },
        }
    }

    pub fn latest(&self) -> TelemetrySnapshot {
        self.latest.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<TelemetrySnapshot> {
        self.latest.subscribe()
    }

    pub async fn is_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }

    /// Start ticking. The first snapshot is published one period from now.
    pub async fn start(&self) -> Result<()> {
        let mut ticker_guard = self.ticker.lock().await;
        if ticker_guard.is_some() {
            bail!("telemetry ticker already running");
        }

        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();
        let scheduler = self.clone();
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        log_info!("telemetry ticker shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        scheduler.tick_once().await;
                    }
                }
            }
        });

        log_info!("telemetry ticker started ({}ms period)", tick_interval.as_millis());
        *ticker_guard = Some((handle, cancel_token));
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let Some((handle, token)) = self.ticker.lock().await.take() else {
            return Ok(());
        };
        token.cancel();
        handle
            .await
            .context("telemetry ticker task failed to join")
    }

    /// Run one sample/couple/publish cycle immediately.
    pub async fn tick_once(&self) -> TelemetrySnapshot {
        // The flag is read once, before sampling, so a request that starts
        // mid-tick shows up on the next one.
        let processing = self.session.is_processing().await;
        let snapshot = self.generator.lock().await.tick(processing);

        self.latest.send_replace(snapshot.clone());
        let receivers = self.bus.emit_telemetry(snapshot.clone());

        if snapshot.sequence % self.heartbeat_every_ticks == 0 {
            log_info!(
                "telemetry heartbeat #{}: load {:.1}% ram {:.2}GB speed {:.1}t/s processing={}",
                snapshot.sequence,
                snapshot.current_load().unwrap_or_default(),
                snapshot.ram_usage_gb,
                snapshot.inference_speed_tps,
                processing
            );
        } else {
            log_debug!(
                "telemetry tick #{} delivered to {} subscriber(s)",
                snapshot.sequence,
                receivers
            );
        }

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(session: SessionController, bus: EventBus) -> TickScheduler {
        let settings = TelemetrySettings::default();
        TickScheduler::with_generator(
            TelemetryGenerator::with_seed(&settings, 99),
            &settings,
            session,
            bus,
        )
    }

    #[tokio::test]
    async fn tick_once_reads_processing_flag() {
        let session = SessionController::new();
        let ticks = scheduler(session.clone(), EventBus::default());

        assert_eq!(ticks.tick_once().await.inference_speed_tps, 0.0);

        session.begin_request().await;
        let busy = ticks.tick_once().await;
        assert!(busy.inference_speed_tps >= 8.0);
        assert_eq!(ticks.latest(), busy);
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_once_per_period() {
        let bus = EventBus::default();
        let mut events = bus.subscribe_telemetry();
        let ticks = scheduler(SessionController::new(), bus);

        ticks.start().await.expect("start");
        assert!(ticks.start().await.is_err(), "second start is rejected");

        for expected in 1..=3u64 {
            let snapshot = events.recv().await.expect("tick");
            assert_eq!(snapshot.sequence, expected);
            assert_eq!(snapshot.cpu_load_window.len(), 20);
        }

        ticks.stop().await.expect("stop");
        assert!(!ticks.is_running().await);
        assert_eq!(ticks.latest().sequence, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let ticks = scheduler(SessionController::new(), EventBus::default());
        let mut latest = ticks.watch();
        ticks.start().await.expect("start");

        time::sleep(Duration::from_millis(999)).await;
        assert_eq!(ticks.latest().sequence, 0);

        latest.changed().await.expect("first tick");
        assert_eq!(latest.borrow().sequence, 1);
        ticks.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn stop_when_not_running_is_ok() {
        let ticks = scheduler(SessionController::new(), EventBus::default());
        assert!(ticks.stop().await.is_ok());
    }
}
