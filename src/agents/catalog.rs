use crate::models::{AgentConfig, AgentParameters, AgentStatus, Quantization};

/// Agents available on a fresh install, sized for a 16GB CPU-only host.
pub fn default_agents() -> Vec<AgentConfig> {
    vec![
        AgentConfig {
            id: "1".into(),
            name: "Orchestrator (Phi-3)".into(),
            model: "phi-3-mini-4k-instruct".into(),
            quantization: Quantization::Q4_0,
            role: "Router & Planner".into(),
            status: AgentStatus::Idle,
            context_window: 4096,
            system_prompt: Some(
                "You are the orchestration node for a local RAG system. Analyze the user's request, \
                 determine which retrieval tools are necessary, and delegate tasks to the Analyst agent. \
                 Keep responses concise and structured."
                    .into(),
            ),
            parameters: Some(AgentParameters {
                temperature: 0.1,
                top_p: 0.9,
                top_k: 40,
            }),
        },
        AgentConfig {
            id: "2".into(),
            name: "Analyst (Mistral-7B)".into(),
            model: "mistral-7b-instruct-v0.2".into(),
            quantization: Quantization::Q4_0,
            role: "Data Synthesis".into(),
            status: AgentStatus::Idle,
            context_window: 8192,
            system_prompt: Some(
                "You are an expert data analyst. You will be provided with context chunks retrieved \
                 from a local vector store. Synthesize this information to answer the user's question \
                 accurately. Do not hallucinate information not present in the context."
                    .into(),
            ),
            parameters: Some(AgentParameters {
                temperature: 0.7,
                top_p: 0.95,
                top_k: 60,
            }),
        },
    ]
}
