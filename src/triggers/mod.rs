//! Trigger engine: variable-change and lifecycle rules dispatching actions.

mod engine;
mod types;

pub use engine::{EngineError, EngineState, TriggerEngine};
pub use types::{LifecycleEvent, Trigger, TriggerSource};
