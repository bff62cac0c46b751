//! Commands accepted from the display collaborator.
//!
//! Each command is a thin call into the owning component so a future front
//! end (desktop shell, HTTP bridge) can expose them one-to-one.

use uuid::Uuid;

use crate::{
    chat::{ChatMessage, SendOutcome},
    models::{AgentConfig, AgentParameters, AgentStatus, Quantization},
    session::SessionSnapshot,
    settings::EngineSettings,
    telemetry::TelemetrySnapshot,
    AppState,
};

/// A single agent field changed from the console.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentField {
    Name(String),
    Quantization(Quantization),
    ContextWindow(u32),
    Status(AgentStatus),
}

pub async fn send_message(state: &AppState, text: &str) -> SendOutcome {
    state.chat.send(text).await
}

pub async fn stop_request(state: &AppState) -> Option<Uuid> {
    state.chat.stop().await
}

pub async fn get_session_state(state: &AppState) -> SessionSnapshot {
    state.session.snapshot().await
}

pub fn get_telemetry(state: &AppState) -> TelemetrySnapshot {
    state.telemetry.latest()
}

pub fn get_messages(state: &AppState) -> Vec<ChatMessage> {
    state.chat.messages()
}

pub fn list_agents(state: &AppState) -> Vec<AgentConfig> {
    state.agents.list()
}

/// Edit-and-save in one step. Fields left as `None` keep their current value.
pub fn update_agent(
    state: &AppState,
    agent_id: &str,
    system_prompt: Option<String>,
    parameters: Option<AgentParameters>,
) -> Result<AgentConfig, String> {
    let mut edit = state
        .agents
        .begin_edit(agent_id)
        .map_err(|e| e.to_string())?;

    if let Some(prompt) = system_prompt {
        let prompt = prompt.trim().to_string();
        edit.set_system_prompt((!prompt.is_empty()).then_some(prompt));
    }
    if parameters.is_some() {
        edit.set_parameters(parameters);
    }

    edit.save(&state.agents).map_err(|e| e.to_string())
}

pub fn edit_agent(state: &AppState, agent_id: &str, field: AgentField) -> Result<AgentConfig, String> {
    let mut edit = state
        .agents
        .begin_edit(agent_id)
        .map_err(|e| e.to_string())?;

    match field {
        AgentField::Name(name) => edit.set_name(name),
        AgentField::Quantization(quantization) => edit.set_quantization(quantization),
        AgentField::ContextWindow(context_window) => edit.set_context_window(context_window),
        AgentField::Status(status) => edit.set_status(status),
    };

    edit.save(&state.agents).map_err(|e| e.to_string())
}

pub fn get_settings(state: &AppState) -> EngineSettings {
    state.settings.engine()
}

/// Re-read the settings file. Running components keep the values they
/// started with; the reloaded values apply on the next start.
pub fn reload_settings(state: &AppState) -> Result<EngineSettings, String> {
    state.settings.reload().map_err(|e| format!("{e:#}"))?;
    Ok(state.settings.engine())
}

/// Persist a telemetry seed (`None` for entropy). Applies on the next start.
pub fn set_telemetry_seed(state: &AppState, seed: Option<u64>) -> Result<EngineSettings, String> {
    let mut settings = state.settings.engine();
    settings.telemetry.seed = seed;
    state
        .settings
        .update(settings.clone())
        .map_err(|e| format!("{e:#}"))?;
    Ok(settings)
}
