pub mod engine;
pub mod uploads;

pub use engine::{TransitionOutcome, WorkflowEngine, WorkflowError};
