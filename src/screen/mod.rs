//! Screen model and structural validation.

mod model;
mod validator;

pub use model::{Node, Scaffold, Screen, ScreenRequest, Section};
pub use validator::{validate, IssueCode, ValidationIssue, ValidationLimits};
