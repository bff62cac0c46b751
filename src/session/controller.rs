use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RequestHandle, SessionSnapshot, SessionState};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug)]
pub enum BeginOutcome {
    Started(RequestHandle),
    AlreadyBusy,
}

impl BeginOutcome {
    pub fn handle(self) -> Option<RequestHandle> {
        match self {
            BeginOutcome::Started(handle) => Some(handle),
            BeginOutcome::AlreadyBusy => None,
        }
    }
}

/// Owner of the console's single processing flag.
///
/// Every transition happens under one lock, and the `*_with` variants run a
/// caller's side effect inside that same critical section so observers never
/// see the flag and the effect disagree.
#[derive(Clone, Default)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_processing(&self) -> bool {
        self.state.lock().await.is_processing()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn active_request(&self) -> Option<RequestHandle> {
        self.state.lock().await.active().cloned()
    }

    pub async fn begin_request(&self) -> BeginOutcome {
        match self.begin_request_with(|_| ()).await {
            Some((handle, ())) => BeginOutcome::Started(handle),
            None => BeginOutcome::AlreadyBusy,
        }
    }

    /// Begin a request and run `effect` before anyone else can observe the
    /// busy flag. `effect` is not called when the session is already busy.
    pub async fn begin_request_with<T>(
        &self,
        effect: impl FnOnce(&RequestHandle) -> T,
    ) -> Option<(RequestHandle, T)> {
        let mut state = self.state.lock().await;
        let Some(handle) = state.begin(Utc::now()) else {
            log_debug!("begin_request ignored: request already in flight");
            return None;
        };
        let output = effect(&handle);
        log_info!("request {} started", handle.id());
        Some((handle, output))
    }

    pub async fn complete_request(&self, handle: &RequestHandle) -> bool {
        self.complete_request_with(handle, || ()).await.is_some()
    }

    /// Complete `handle` and run `effect` atomically with the transition.
    /// Returns `None` without calling `effect` when the handle is stale or was
    /// cancelled.
    pub async fn complete_request_with<T>(
        &self,
        handle: &RequestHandle,
        effect: impl FnOnce() -> T,
    ) -> Option<T> {
        let mut state = self.state.lock().await;
        if !state.owns(handle.id()) {
            log_debug!("complete_request ignored for stale request {}", handle.id());
            return None;
        }
        let output = effect();
        state.complete(handle.id());
        log_info!("request {} completed", handle.id());
        Some(output)
    }

    pub async fn cancel_request(&self, handle: &RequestHandle) -> bool {
        let mut state = self.state.lock().await;
        let cancelled = state.cancel(handle.id());
        if cancelled {
            log_info!("request {} cancelled", handle.id());
        } else {
            log_debug!("cancel_request ignored for stale request {}", handle.id());
        }
        cancelled
    }

    /// Cancel whatever request is in flight. Returns its id, or `None` when idle.
    pub async fn cancel_active(&self) -> Option<Uuid> {
        let mut state = self.state.lock().await;
        let id = state.active()?.id();
        if state.cancel(id) {
            log_info!("request {} cancelled", id);
            Some(id)
        } else {
            None
        }
    }
}
