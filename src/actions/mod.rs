//! Polymorphic action dispatch.
//!
//! # Architecture
//!
//! ```text
//!  Action { id, payload } ──→ ActionRegistry ──kind──→ ActionHandler
//!                                  │                        │
//!                                  └── missing / mismatch   ├──→ Navigator
//!                                      (logged, dropped)    ├──→ VariableStore
//!                                                           └──→ ActionFetcher
//!                                                                 └─→ replay
//! ```

mod collaborators;
mod context;
mod error;
mod handlers;
mod registry;
mod types;

pub use collaborators::{ActionFetcher, Navigator, NoopNavigator};
pub use context::ActionContext;
pub use error::{ActionError, NavigationError};
pub use handlers::default_handlers;
pub use registry::{
    ActionHandler, ActionRegistry, ActionRegistryBuilder, DispatchOutcome, DropReason, FnHandler,
    DEFAULT_MAX_REPLAY_DEPTH,
};
pub use types::{Action, ActionKind, ActionPayload, Destination, Params};
