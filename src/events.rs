use tokio::sync::broadcast;

use crate::{chat::ChatMessage, telemetry::TelemetrySnapshot};

pub const TELEMETRY_UPDATE_EVENT: &str = "telemetry-update";
pub const MESSAGE_APPENDED_EVENT: &str = "message-appended";

const DEFAULT_CAPACITY: usize = 64;

/// Fan-out of engine events to display collaborators.
///
/// Emitting never blocks and never fails: with no subscribers the event is
/// dropped, and a subscriber that falls more than `capacity` events behind
/// sees `RecvError::Lagged` on its next receive.
#[derive(Clone)]
pub struct EventBus {
    telemetry: broadcast::Sender<TelemetrySnapshot>,
    messages: broadcast::Sender<ChatMessage>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity.max(1));
        let (messages, _) = broadcast::channel(capacity.max(1));
        Self {
            telemetry,
            messages,
        }
    }

    /// Returns the number of subscribers that received the snapshot.
    pub fn emit_telemetry(&self, snapshot: TelemetrySnapshot) -> usize {
        self.telemetry.send(snapshot).unwrap_or(0)
    }

    pub fn emit_message(&self, message: ChatMessage) -> usize {
        self.messages.send(message).unwrap_or(0)
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetrySnapshot> {
        self.telemetry.subscribe()
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<ChatMessage> {
        self.messages.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::TelemetrySettings;

    #[test]
    fn emit_without_subscribers_is_dropped() {
        let bus = EventBus::default();
        assert_eq!(bus.emit_message(ChatMessage::user("nobody listening")), 0);
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let bus = EventBus::default();
        let mut first = bus.subscribe_telemetry();
        let mut second = bus.subscribe_telemetry();

        let snapshot = TelemetrySnapshot::initial(&TelemetrySettings::default());
        assert_eq!(bus.emit_telemetry(snapshot.clone()), 2);

        assert_eq!(first.recv().await.expect("first"), snapshot);
        assert_eq!(second.recv().await.expect("second"), snapshot);
    }
}
