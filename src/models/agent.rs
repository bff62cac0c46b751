//! Agent configuration models.
//!
//! An `AgentConfig` is reference data: the registry owns the canonical copy and
//! edits go through an `AgentEditSession`.

use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantization {
    #[serde(rename = "q4_0")]
    Q4_0,
    #[serde(rename = "q5_km")]
    Q5Km,
    #[serde(rename = "q8_0")]
    Q8_0,
    #[serde(rename = "fp16")]
    Fp16,
}

impl Quantization {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantization::Q4_0 => "q4_0",
            Quantization::Q5Km => "q5_km",
            Quantization::Q8_0 => "q8_0",
            Quantization::Fp16 => "fp16",
        }
    }
}

impl FromStr for Quantization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Quantization::Q4_0,
            Quantization::Q5Km,
            Quantization::Q8_0,
            Quantization::Fp16,
        ]
        .into_iter()
        .find(|q| q.as_str().eq_ignore_ascii_case(s))
        .ok_or_else(|| anyhow!("Unknown quantization '{s}'. Expected q4_0, q5_km, q8_0 or fp16"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Loading,
    Inference,
}

impl FromStr for AgentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "loading" => Ok(AgentStatus::Loading),
            "inference" => Ok(AgentStatus::Inference),
            _ => Err(anyhow!("Unknown status '{s}'. Expected idle, loading or inference")),
        }
    }
}

/// Sampling parameters passed to the model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentParameters {
    /// 0.0 - 2.0
    pub temperature: f32,
    /// 0.0 - 1.0
    pub top_p: f32,
    pub top_k: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    pub model: String,
    pub quantization: Quantization,
    pub role: String,
    pub status: AgentStatus,
    pub context_window: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<AgentParameters>,
}

/// Validation functions for agent config data
pub mod validation {
    use super::{AgentConfig, AgentParameters};
    use anyhow::{bail, Result};

    const MAX_TEMPERATURE: f32 = 2.0;
    const MAX_SYSTEM_PROMPT_LENGTH: usize = 16_000;

    pub fn validate_parameters(parameters: &AgentParameters) -> Result<()> {
        if !(0.0..=MAX_TEMPERATURE).contains(&parameters.temperature) {
            bail!("Invalid temperature. Must be between 0 and 2");
        }
        if !(0.0..=1.0).contains(&parameters.top_p) {
            bail!("Invalid topP. Must be between 0 and 1");
        }
        if parameters.top_k == 0 {
            bail!("Invalid topK. Must be a positive integer");
        }
        Ok(())
    }

    pub fn validate_agent(agent: &AgentConfig) -> Result<()> {
        if agent.id.trim().is_empty() {
            bail!("Agent id must not be empty");
        }
        if agent.name.trim().is_empty() {
            bail!("Agent name must not be empty");
        }
        if agent.context_window == 0 {
            bail!("Invalid context window. Must be a positive integer");
        }
        if let Some(prompt) = &agent.system_prompt {
            if prompt.len() > MAX_SYSTEM_PROMPT_LENGTH {
                bail!("System prompt too long (max 16,000 chars)");
            }
        }
        if let Some(parameters) = &agent.parameters {
            validate_parameters(parameters)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::validation::*;
    use super::*;

    fn agent() -> AgentConfig {
        AgentConfig {
            id: "9".into(),
            name: "Tester".into(),
            model: "tiny".into(),
            quantization: Quantization::Q8_0,
            role: "QA".into(),
            status: AgentStatus::Idle,
            context_window: 2048,
            system_prompt: None,
            parameters: Some(AgentParameters {
                temperature: 0.7,
                top_p: 0.9,
                top_k: 40,
            }),
        }
    }

    #[test]
    fn quantization_uses_gguf_names() {
        let json = serde_json::to_string(&Quantization::Q5Km).expect("serialize");
        assert_eq!(json, "\"q5_km\"");
        let parsed: Quantization = serde_json::from_str("\"fp16\"").expect("parse");
        assert_eq!(parsed, Quantization::Fp16);
        assert_eq!(Quantization::Q4_0.as_str(), "q4_0");
    }

    #[test]
    fn console_names_parse() {
        assert_eq!("Q5_KM".parse::<Quantization>().ok(), Some(Quantization::Q5Km));
        assert!("q3".parse::<Quantization>().is_err());
        assert_eq!("loading".parse::<AgentStatus>().ok(), Some(AgentStatus::Loading));
        assert!("busy".parse::<AgentStatus>().is_err());
    }

    #[test]
    fn parameter_bounds_are_inclusive() {
        let edge = AgentParameters {
            temperature: 2.0,
            top_p: 1.0,
            top_k: 1,
        };
        assert!(validate_parameters(&edge).is_ok());
        assert!(validate_parameters(&AgentParameters { temperature: 2.1, ..edge }).is_err());
        assert!(validate_parameters(&AgentParameters { top_p: -0.1, ..edge }).is_err());
        assert!(validate_parameters(&AgentParameters { top_k: 0, ..edge }).is_err());
    }

    #[test]
    fn agent_requires_positive_context_window() {
        assert!(validate_agent(&agent()).is_ok());
        assert!(validate_agent(&AgentConfig {
            context_window: 0,
            ..agent()
        })
        .is_err());
    }
}
