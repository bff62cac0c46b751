pub mod controller;
pub mod state;

pub use controller::{BeginOutcome, SessionController};
pub use state::{RequestHandle, SessionSnapshot, SessionState, SessionStatus};
