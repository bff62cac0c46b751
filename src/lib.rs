pub mod agents;
pub mod chat;
pub mod commands;
pub mod console;
pub mod events;
pub mod models;
pub mod session;
pub mod settings;
pub mod telemetry;
pub mod utils;

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::BufReader;

use agents::AgentRegistry;
use chat::{ChatMessage, ChatPipeline};
use events::EventBus;
use session::SessionController;
use settings::SettingsStore;
use telemetry::TickScheduler;

const DEFAULT_SETTINGS_FILE: &str = "dorado.settings.json";

/// Everything a front end talks to. Components share the same
/// `SessionController`, so the tick loop sees the flag the chat pipeline sets.
pub struct AppState {
    pub settings: SettingsStore,
    pub events: EventBus,
    pub session: SessionController,
    pub telemetry: TickScheduler,
    pub chat: ChatPipeline,
    pub agents: AgentRegistry,
}

impl AppState {
    pub fn new(settings: SettingsStore) -> Self {
        let engine = settings.engine();
        let events = EventBus::default();
        let session = SessionController::new();
        let agents = AgentRegistry::default();

        let telemetry = TickScheduler::new(&engine.telemetry, session.clone(), events.clone());

        let greeting = match agents.get(&engine.chat.active_agent_id) {
            Some(agent) => vec![ChatMessage::agent_loaded(&agent.name)],
            None => {
                warn!(
                    "Active agent '{}' not found; starting without a greeting",
                    engine.chat.active_agent_id
                );
                Vec::new()
            }
        };
        let chat =
            ChatPipeline::new(session.clone(), events.clone(), &engine.chat).with_history(greeting);

        Self {
            settings,
            events,
            session,
            telemetry,
            chat,
            agents,
        }
    }
}

fn settings_path() -> PathBuf {
    std::env::var("DORADO_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE))
}

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    utils::logging::init_logging();

    info!("Dorado console starting up...");

    let settings = SettingsStore::new(settings_path())?;
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;

    let result = runtime.block_on(async move {
        let state = AppState::new(settings);
        state.telemetry.start().await?;
        let display = console::spawn_display(&state);

        let stdin = BufReader::new(tokio::io::stdin());
        let outcome = console::run_console(&state, stdin, tokio::io::stdout()).await;

        if let Some(request_id) = state.chat.stop().await {
            info!("Cancelled request {request_id} on shutdown");
        }
        state.telemetry.stop().await?;
        display.abort();
        outcome
    });

    // A pending stdin read must not keep the process alive after /quit.
    runtime.shutdown_timeout(Duration::from_millis(500));
    info!("Dorado console stopped");
    result
}
