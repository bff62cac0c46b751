pub mod catalog;
pub mod registry;

pub use catalog::default_agents;
pub use registry::{AgentEditSession, AgentRegistry};
