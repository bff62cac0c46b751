use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time};
use uuid::Uuid;

use crate::{
    events::EventBus,
    session::{RequestHandle, SessionController},
    settings::ChatSettings,
};

use super::{ChatMessage, SimulatedResponder};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Accepted { request_id: Uuid, message_id: Uuid },
    /// Blank or whitespace-only input.
    RejectedEmpty,
    /// A request is already in flight.
    RejectedBusy,
}

impl SendOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendOutcome::Accepted { .. })
    }
}

/// User input gate and conversation log.
///
/// The log is append-only. Both appends made on behalf of a request happen
/// inside the session's critical section: the user message together with the
/// `Idle -> Busy` transition, the assistant reply together with `Busy -> Idle`.
#[derive(Clone)]
pub struct ChatPipeline {
    session: SessionController,
    bus: EventBus,
    responder: Arc<SimulatedResponder>,
    log: Arc<Mutex<Vec<ChatMessage>>>,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
    response_latency: Duration,
}

impl ChatPipeline {
    pub fn new(session: SessionController, bus: EventBus, settings: &ChatSettings) -> Self {
        Self {
            session,
            bus,
            responder: Arc::new(SimulatedResponder::new(settings.response.clone())),
            log: Arc::new(Mutex::new(Vec::new())),
            pending: Arc::new(Mutex::new(None)),
            response_latency: settings.response_latency(),
        }
    }

    /// Seed the log before the pipeline is shared. Seeded messages are not
    /// announced on the event bus.
    pub fn with_history(self, history: Vec<ChatMessage>) -> Self {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(history);
        self
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub async fn is_processing(&self) -> bool {
        self.session.is_processing().await
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            log_debug!("ignoring blank message");
            return SendOutcome::RejectedEmpty;
        }

        // Spawned and recorded under the session lock: `pending` always holds
        // the worker of the most recently started request.
        let begun = self
            .session
            .begin_request_with(|handle| {
                let message_id = self.append(ChatMessage::user(text.to_string()));
                let pipeline = self.clone();
                let worker = handle.clone();
                let prompt = text.to_string();
                let task = tokio::spawn(async move { pipeline.await_response(worker, prompt).await });
                *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
                message_id
            })
            .await;
        let Some((handle, message_id)) = begun else {
            log_debug!("ignoring message while a request is in flight");
            return SendOutcome::RejectedBusy;
        };

        SendOutcome::Accepted {
            request_id: handle.id(),
            message_id,
        }
    }

    /// Cancel the in-flight request. Its reply is suppressed. Returns the
    /// cancelled request id, or `None` when nothing was in flight.
    pub async fn stop(&self) -> Option<Uuid> {
        let cancelled = self.session.cancel_active().await;
        if cancelled.is_none() {
            log_debug!("stop requested while idle");
        }
        cancelled
    }

    /// Wait for the most recent response worker to finish, whether it
    /// appended a reply or was cancelled.
    pub async fn wait_for_response(&self) {
        let task = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                log_error!("response worker failed: {err}");
            }
        }
    }

    async fn await_response(&self, handle: RequestHandle, prompt: String) {
        tokio::select! {
            biased;
            _ = handle.cancelled() => {
                log_info!("request {} cancelled before its response; nothing appended", handle.id());
                return;
            }
            _ = time::sleep(self.response_latency) => {}
        }

        let reply = self.responder.respond(&prompt);
        let appended = self
            .session
            .complete_request_with(&handle, || self.append(reply))
            .await;

        match appended {
            Some(message_id) => log_info!(
                "request {} answered with message {}",
                handle.id(),
                message_id
            ),
            None => log_warn!(
                "request {} was no longer active when its response arrived; discarded",
                handle.id()
            ),
        }
    }

    fn append(&self, message: ChatMessage) -> Uuid {
        let id = message.id;
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.push(message.clone());
        self.bus.emit_message(message);
        id
    }
}
