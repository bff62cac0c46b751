//! Chat log and the simulated request/response pipeline.

pub mod message;
pub mod pipeline;
pub mod responder;

pub use message::{ChatMessage, MessageMetrics, Role};
pub use pipeline::{ChatPipeline, SendOutcome};
pub use responder::SimulatedResponder;
