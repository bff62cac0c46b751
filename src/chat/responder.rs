use crate::settings::SimulatedResponseSettings;

use super::{ChatMessage, MessageMetrics};

/// Stand-in for the inference backend: answers every prompt with the
/// configured reply.
#[derive(Debug, Clone)]
pub struct SimulatedResponder {
    reply: SimulatedResponseSettings,
}

impl SimulatedResponder {
    pub fn new(reply: SimulatedResponseSettings) -> Self {
        Self { reply }
    }

    pub fn respond(&self, _prompt: &str) -> ChatMessage {
        ChatMessage::assistant(
            self.reply.content.clone(),
            MessageMetrics {
                tokens_per_second: self.reply.tokens_per_second,
                processing_time_sec: self.reply.processing_time_sec,
                used_ram_mb: self.reply.used_ram_mb,
            },
            self.reply.sources.clone(),
        )
    }
}
