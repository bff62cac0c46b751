pub mod agent;

pub use agent::{AgentConfig, AgentParameters, AgentStatus, Quantization};
