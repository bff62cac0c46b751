//! Headless line-oriented front end.
//!
//! Plain lines are chat input; lines starting with `/` are console commands.

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::broadcast::error::RecvError,
    task::JoinHandle,
};

use crate::{
    chat::{ChatMessage, Role, SendOutcome},
    commands::{self, AgentField},
    events::{MESSAGE_APPENDED_EVENT, TELEMETRY_UPDATE_EVENT},
    session::SessionSnapshot,
    telemetry::TelemetrySnapshot,
    AppState,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_warn};

const HELP: &str = "commands: <text> send | /stop | /status | /messages | /agents | \
                    /prompt <agent-id> [text] | \
                    /edit <agent-id> name|quantization|context|status <value> | \
                    /settings [reload | seed <n|none>] | /help | /quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    Show,
    Reload,
    Seed(Option<u64>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Send(String),
    Stop,
    Status,
    Messages,
    Agents,
    /// Replace an agent's system prompt; an empty prompt clears it.
    Prompt { agent_id: String, prompt: String },
    /// Change one agent field; the value is checked when the command runs.
    Edit { agent_id: String, field: String, value: String },
    Settings(SettingsAction),
    Help,
    Quit,
}

impl ConsoleCommand {
    /// `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Some(ConsoleCommand::Send(line.trim_end_matches(['\r', '\n']).to_string()));
        };

        let (name, args) = rest
            .split_once(char::is_whitespace)
            .map(|(name, args)| (name, args.trim()))
            .unwrap_or((rest, ""));

        let command = match name {
            "stop" => ConsoleCommand::Stop,
            "status" => ConsoleCommand::Status,
            "messages" => ConsoleCommand::Messages,
            "agents" => ConsoleCommand::Agents,
            "quit" | "exit" => ConsoleCommand::Quit,
            "prompt" if !args.is_empty() => {
                let (agent_id, prompt) = args
                    .split_once(char::is_whitespace)
                    .map(|(id, prompt)| (id, prompt.trim()))
                    .unwrap_or((args, ""));
                ConsoleCommand::Prompt {
                    agent_id: agent_id.to_string(),
                    prompt: prompt.to_string(),
                }
            }
            "edit" => {
                let mut parts = args.splitn(3, char::is_whitespace);
                match (parts.next(), parts.next(), parts.next().map(str::trim)) {
                    (Some(agent_id), Some(field), Some(value)) if !value.is_empty() => {
                        ConsoleCommand::Edit {
                            agent_id: agent_id.to_string(),
                            field: field.to_string(),
                            value: value.to_string(),
                        }
                    }
                    _ => ConsoleCommand::Help,
                }
            }
            "settings" => match args.split_whitespace().collect::<Vec<_>>()[..] {
                [] => ConsoleCommand::Settings(SettingsAction::Show),
                ["reload"] => ConsoleCommand::Settings(SettingsAction::Reload),
                ["seed", "none"] => ConsoleCommand::Settings(SettingsAction::Seed(None)),
                ["seed", seed] => match seed.parse() {
                    Ok(seed) => ConsoleCommand::Settings(SettingsAction::Seed(Some(seed))),
                    Err(_) => ConsoleCommand::Help,
                },
                _ => ConsoleCommand::Help,
            },
            _ => ConsoleCommand::Help,
        };
        Some(command)
    }
}

/// Run one command and return the text to show the user.
pub async fn execute(state: &AppState, command: ConsoleCommand) -> String {
    match command {
        ConsoleCommand::Send(text) => match commands::send_message(state, &text).await {
            SendOutcome::Accepted { request_id, .. } => format!("sent (request {request_id})"),
            SendOutcome::RejectedEmpty => String::new(),
            SendOutcome::RejectedBusy => "busy: wait for the current reply or /stop".into(),
        },
        ConsoleCommand::Stop => match commands::stop_request(state).await {
            Some(request_id) => format!("stopped request {request_id}"),
            None => "nothing to stop".into(),
        },
        ConsoleCommand::Status => {
            let session = commands::get_session_state(state).await;
            let telemetry = commands::get_telemetry(state);
            render_status(&session, &telemetry)
        }
        ConsoleCommand::Messages => commands::get_messages(state)
            .iter()
            .map(render_message)
            .collect::<Vec<_>>()
            .join("\n"),
        ConsoleCommand::Agents => commands::list_agents(state)
            .iter()
            .map(|agent| {
                format!(
                    "{} {} [{} {}] ctx={} role={}",
                    agent.id,
                    agent.name,
                    agent.model,
                    agent.quantization.as_str(),
                    agent.context_window,
                    agent.role
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        ConsoleCommand::Prompt { agent_id, prompt } => {
            match commands::update_agent(state, &agent_id, Some(prompt), None) {
                Ok(agent) => format!("updated system prompt for {}", agent.name),
                Err(err) => format!("error: {err}"),
            }
        }
        ConsoleCommand::Edit {
            agent_id,
            field,
            value,
        } => {
            let edited = parse_agent_field(&field, &value)
                .and_then(|field| commands::edit_agent(state, &agent_id, field));
            match edited {
                Ok(agent) => format!("updated {field} for {}", agent.name),
                Err(err) => format!("error: {err}"),
            }
        }
        ConsoleCommand::Settings(action) => {
            let result = match action {
                SettingsAction::Show => Ok(commands::get_settings(state)),
                SettingsAction::Reload => commands::reload_settings(state),
                SettingsAction::Seed(seed) => commands::set_telemetry_seed(state, seed),
            };
            match result.and_then(|settings| {
                serde_json::to_string_pretty(&settings).map_err(|e| e.to_string())
            }) {
                Ok(json) if action == SettingsAction::Show => json,
                Ok(json) => format!("{json}\n(applies on next start)"),
                Err(err) => {
                    log_error!("settings command failed: {err}");
                    format!("error: {err}")
                }
            }
        }
        ConsoleCommand::Help => HELP.into(),
        ConsoleCommand::Quit => String::new(),
    }
}

fn parse_agent_field(field: &str, value: &str) -> Result<AgentField, String> {
    match field {
        "name" => Ok(AgentField::Name(value.to_string())),
        "quantization" | "quant" => value
            .parse()
            .map(AgentField::Quantization)
            .map_err(|e: anyhow::Error| e.to_string()),
        "context" => value
            .parse()
            .map(AgentField::ContextWindow)
            .map_err(|_| format!("invalid context window '{value}'")),
        "status" => value
            .parse()
            .map(AgentField::Status)
            .map_err(|e: anyhow::Error| e.to_string()),
        _ => Err(format!("unknown agent field '{field}'")),
    }
}

/// Read commands from `input` until `/quit` or end of input.
pub async fn run_console<R, W>(state: &AppState, input: R, mut output: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read console input")? {
        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };
        if command == ConsoleCommand::Quit {
            break;
        }

        let reply = execute(state, command).await;
        if !reply.is_empty() {
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
    }
    Ok(())
}

/// Print appended messages to stdout and trace telemetry until the bus closes.
pub fn spawn_display(state: &AppState) -> JoinHandle<()> {
    let mut messages = state.events.subscribe_messages();
    let mut telemetry = state.events.subscribe_telemetry();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Ok(message) if message.role != Role::User => println!("{}", render_message(&message)),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => log_warn!("{MESSAGE_APPENDED_EVENT}: display skipped {skipped} events"),
                    Err(RecvError::Closed) => break,
                },
                snapshot = telemetry.recv() => match snapshot {
                    Ok(snapshot) => log_debug!("{TELEMETRY_UPDATE_EVENT}: {}", render_telemetry(&snapshot)),
                    Err(RecvError::Lagged(skipped)) => log_warn!("{TELEMETRY_UPDATE_EVENT}: display skipped {skipped} events"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    })
}

pub fn render_message(message: &ChatMessage) -> String {
    let role = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
        Role::System => "system",
    };
    let mut line = format!("[{role}] {}", message.content);
    if let Some(metrics) = &message.metrics {
        line.push_str(&format!(
            "\n    {:.1} t/s | {:.1}s | {} MB",
            metrics.tokens_per_second, metrics.processing_time_sec, metrics.used_ram_mb
        ));
    }
    if let Some(sources) = message.sources.as_ref().filter(|s| !s.is_empty()) {
        line.push_str(&format!("\n    sources: {}", sources.join(", ")));
    }
    line
}

pub fn render_telemetry(snapshot: &TelemetrySnapshot) -> String {
    let speed = if snapshot.inference_speed_tps > 0.0 {
        format!("{:.1}", snapshot.inference_speed_tps)
    } else {
        "--".into()
    };
    format!(
        "#{} cpu {:.1}% | ram {:.1} GB | {:.1}C | {} t/s | {} threads",
        snapshot.sequence,
        snapshot.current_load().unwrap_or_default(),
        snapshot.ram_usage_gb,
        snapshot.temperature_c,
        speed,
        snapshot.active_threads
    )
}

fn render_status(session: &SessionSnapshot, telemetry: &TelemetrySnapshot) -> String {
    let status = match session.active_request_id {
        Some(id) => format!("busy (request {id})"),
        None => "idle".into(),
    };
    format!(
        "session: {status}, {} completed, {} cancelled\ntelemetry: {}",
        session.completed_requests,
        session.cancelled_requests,
        render_telemetry(telemetry)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;

    #[test]
    fn parse_distinguishes_chat_from_commands() {
        assert_eq!(ConsoleCommand::parse("   "), None);
        assert_eq!(
            ConsoleCommand::parse("what is in the logs?"),
            Some(ConsoleCommand::Send("what is in the logs?".into()))
        );
        assert_eq!(ConsoleCommand::parse("/stop"), Some(ConsoleCommand::Stop));
        assert_eq!(ConsoleCommand::parse(" /status "), Some(ConsoleCommand::Status));
        assert_eq!(ConsoleCommand::parse("/exit"), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("/bogus"), Some(ConsoleCommand::Help));
        assert_eq!(ConsoleCommand::parse("/prompt"), Some(ConsoleCommand::Help));
    }

    #[test]
    fn parse_prompt_splits_agent_and_text() {
        assert_eq!(
            ConsoleCommand::parse("/prompt 2 Cite every source."),
            Some(ConsoleCommand::Prompt {
                agent_id: "2".into(),
                prompt: "Cite every source.".into(),
            })
        );
        assert_eq!(
            ConsoleCommand::parse("/prompt 1"),
            Some(ConsoleCommand::Prompt {
                agent_id: "1".into(),
                prompt: String::new(),
            })
        );
    }

    #[test]
    fn parse_edit_and_settings() {
        assert_eq!(
            ConsoleCommand::parse("/edit 2 name Analyst (Llama-3)"),
            Some(ConsoleCommand::Edit {
                agent_id: "2".into(),
                field: "name".into(),
                value: "Analyst (Llama-3)".into(),
            })
        );
        assert_eq!(ConsoleCommand::parse("/edit 2 name"), Some(ConsoleCommand::Help));
        assert_eq!(
            ConsoleCommand::parse("/settings"),
            Some(ConsoleCommand::Settings(SettingsAction::Show))
        );
        assert_eq!(
            ConsoleCommand::parse("/settings seed 42"),
            Some(ConsoleCommand::Settings(SettingsAction::Seed(Some(42))))
        );
        assert_eq!(
            ConsoleCommand::parse("/settings seed none"),
            Some(ConsoleCommand::Settings(SettingsAction::Seed(None)))
        );
        assert_eq!(ConsoleCommand::parse("/settings seed -1"), Some(ConsoleCommand::Help));
    }

    #[tokio::test]
    async fn edit_and_settings_commands_reach_the_stores() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = AppState::new(SettingsStore::new(dir.path().join("s.json")).expect("settings"));

        let reply = execute(&state, ConsoleCommand::parse("/edit 1 quantization q8_0").expect("cmd")).await;
        assert!(reply.starts_with("updated quantization"), "{reply}");
        assert_eq!(
            commands::list_agents(&state)[0].quantization,
            crate::models::Quantization::Q8_0
        );

        let reply = execute(&state, ConsoleCommand::parse("/edit 1 status asleep").expect("cmd")).await;
        assert!(reply.starts_with("error:"), "{reply}");

        let reply = execute(&state, ConsoleCommand::parse("/settings seed 5").expect("cmd")).await;
        assert!(reply.contains("\"seed\": 5"), "{reply}");
        assert!(reply.ends_with("(applies on next start)"));

        let reply = execute(&state, ConsoleCommand::Settings(SettingsAction::Reload)).await;
        assert!(reply.contains("\"seed\": 5"), "{reply}");
    }

    #[test]
    fn render_idle_telemetry_hides_speed() {
        let snapshot = TelemetrySnapshot::initial(&Default::default());
        let text = render_telemetry(&snapshot);
        assert!(text.contains("-- t/s"));
        assert!(text.contains("ram 4.2 GB"));
    }

    #[tokio::test(start_paused = true)]
    async fn console_session_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = AppState::new(SettingsStore::new(dir.path().join("s.json")).expect("settings"));

        let script: &[u8] = b"hello\nagain\n/stop\n/stop\n/quit\nnever read\n";
        let mut output = Vec::new();
        run_console(&state, script, &mut output).await.expect("console");

        let output = String::from_utf8(output).expect("utf8");
        let lines: Vec<_> = output.lines().collect();
        assert!(lines[0].starts_with("sent (request "));
        assert!(lines[1].starts_with("busy"));
        assert!(lines[2].starts_with("stopped request "));
        assert_eq!(lines[3], "nothing to stop");
        assert_eq!(lines.len(), 4);

        let messages = commands::get_messages(&state);
        assert_eq!(messages.len(), 2, "system greeting plus one user message");
        assert_eq!(messages[1].content, "hello");
    }
}
