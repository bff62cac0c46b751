mod coupler;
mod generator;
mod sampler;
mod scheduler;
mod types;

pub use coupler::ResourceCoupler;
pub use generator::TelemetryGenerator;
pub use sampler::{slide_window, MetricsSampler};
pub use scheduler::TickScheduler;
pub use types::{RawSample, TelemetrySnapshot};
