use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{anyhow, Result};
use log::info;

use crate::models::{
    agent::validation::validate_agent, AgentConfig, AgentParameters, AgentStatus, Quantization,
};

use super::default_agents;

/// Canonical list of agent configurations.
#[derive(Clone)]
pub struct AgentRegistry {
    agents: Arc<RwLock<Vec<AgentConfig>>>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(default_agents())
    }
}

impl AgentRegistry {
    pub fn new(agents: Vec<AgentConfig>) -> Self {
        Self {
            agents: Arc::new(RwLock::new(agents)),
        }
    }

    pub fn list(&self) -> Vec<AgentConfig> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<AgentConfig> {
        self.agents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|agent| agent.id == id)
            .cloned()
    }

    /// Open an edit session on a private copy of agent `id`.
    pub fn begin_edit(&self, id: &str) -> Result<AgentEditSession> {
        let working = self
            .get(id)
            .ok_or_else(|| anyhow!("unknown agent '{id}'"))?;
        Ok(AgentEditSession { working })
    }

    fn commit(&self, working: AgentConfig) -> Result<AgentConfig> {
        validate_agent(&working)?;

        let mut agents = self.agents.write().unwrap_or_else(PoisonError::into_inner);
        let slot = agents
            .iter_mut()
            .find(|agent| agent.id == working.id)
            .ok_or_else(|| anyhow!("agent '{}' no longer exists", working.id))?;
        *slot = working.clone();

        info!("Saved configuration for agent {} ({})", working.id, working.name);
        Ok(working)
    }
}

/// Working copy of one agent. Nothing reaches the registry until `save`;
/// `cancel` (or dropping the session) discards the edits.
#[derive(Debug, Clone)]
pub struct AgentEditSession {
    working: AgentConfig,
}

impl AgentEditSession {
    pub fn working(&self) -> &AgentConfig {
        &self.working
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.working.name = name.into();
        self
    }

    pub fn set_system_prompt(&mut self, prompt: Option<String>) -> &mut Self {
        self.working.system_prompt = prompt;
        self
    }

    pub fn set_parameters(&mut self, parameters: Option<AgentParameters>) -> &mut Self {
        self.working.parameters = parameters;
        self
    }

    pub fn set_quantization(&mut self, quantization: Quantization) -> &mut Self {
        self.working.quantization = quantization;
        self
    }

    pub fn set_context_window(&mut self, context_window: u32) -> &mut Self {
        self.working.context_window = context_window;
        self
    }

    pub fn set_status(&mut self, status: AgentStatus) -> &mut Self {
        self.working.status = status;
        self
    }

    /// Validate and merge the working copy back into `registry`. On error the
    /// registry is unchanged.
    pub fn save(self, registry: &AgentRegistry) -> Result<AgentConfig> {
        registry.commit(self.working)
    }

    pub fn cancel(self) {}
}
