//! Render-time binding resolution over the variable store.

mod condition;
mod resolver;

pub use condition::Condition;
pub use resolver::{BindingResolver, VariableSource};
