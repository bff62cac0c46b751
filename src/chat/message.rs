//! Message types
//!
//! Entries of the append-only conversation log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Inference statistics attached to an assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetrics {
    pub tokens_per_second: f64,
    pub processing_time_sec: f64,
    pub used_ram_mb: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MessageMetrics>,
    /// Names of the documents the reply was grounded on, in citation order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metrics: None,
            sources: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn assistant(
        content: impl Into<String>,
        metrics: MessageMetrics,
        sources: Vec<String>,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            sources: Some(sources),
            ..Self::new(Role::Assistant, content)
        }
    }

    /// Opening line of a conversation, naming the agent that will answer.
    pub fn agent_loaded(agent_name: &str) -> Self {
        Self::system(format!(
            "System initialized. Loaded \"{agent_name}\" agent with access to local knowledge base."
        ))
    }
}
