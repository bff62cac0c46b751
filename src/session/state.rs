use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Busy,
}

/// One in-flight inference request.
///
/// Clones share the cancellation token, so the copy held by the session and the
/// copy held by the response worker observe the same cancellation.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    id: Uuid,
    started_at: DateTime<Utc>,
    token: CancellationToken,
}

impl RequestHandle {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the request has been cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    fn cancel(&self) {
        self.token.cancel();
    }
}

/// Busy flag and request counters. Only `begin`, `complete` and `cancel`
/// change them; `snapshot` is the read surface.
///
/// ```compile_fail
/// let mut state = dorado_lib::session::SessionState::new();
/// state.completed_requests = 5;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    status: SessionStatus,
    active: Option<RequestHandle>,
    completed_requests: u64,
    cancelled_requests: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_processing(&self) -> bool {
        self.status == SessionStatus::Busy
    }

    pub fn active(&self) -> Option<&RequestHandle> {
        self.active.as_ref()
    }

    /// `Idle -> Busy`. Returns `None` and leaves the state alone when a request
    /// is already outstanding.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Option<RequestHandle> {
        if self.is_processing() {
            return None;
        }
        let handle = RequestHandle::new(now);
        self.status = SessionStatus::Busy;
        self.active = Some(handle.clone());
        Some(handle)
    }

    /// `Busy -> Idle` for the active request. Stale or repeated ids are no-ops.
    pub fn complete(&mut self, id: Uuid) -> bool {
        if !self.owns(id) {
            return false;
        }
        self.active = None;
        self.status = SessionStatus::Idle;
        self.completed_requests += 1;
        true
    }

    /// `Busy -> Idle` without a response. Fires the handle's token so any
    /// worker waiting on it stops before producing output.
    pub fn cancel(&mut self, id: Uuid) -> bool {
        if !self.owns(id) {
            return false;
        }
        if let Some(handle) = self.active.take() {
            handle.cancel();
        }
        self.status = SessionStatus::Idle;
        self.cancelled_requests += 1;
        true
    }

    pub fn owns(&self, id: Uuid) -> bool {
        self.active
            .as_ref()
            .map(|handle| handle.id == id && !handle.is_cancelled())
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            is_processing: self.is_processing(),
            active_request_id: self.active.as_ref().map(RequestHandle::id),
            busy_since: self.active.as_ref().map(RequestHandle::started_at),
            completed_requests: self.completed_requests,
            cancelled_requests: self.cancelled_requests,
        }
    }
}

/// Read-only view handed to display collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub is_processing: bool,
    pub active_request_id: Option<Uuid>,
    pub busy_since: Option<DateTime<Utc>>,
    pub completed_requests: u64,
    pub cancelled_requests: u64,
}
