//! Runtime core for screens described by remote data.
//!
//! The crate keeps a dynamically-described screen alive: a scoped, TTL-aware
//! variable store, a trigger engine reacting to variable changes and lifecycle
//! events, a polymorphic action registry, a binding resolver used on every
//! render pass, and a screen cache guarded by a structural validator.
//!
//! ```text
//! ScreenHost::open ──→ CachingScreenFetcher ──→ ScreenFetcher (remote)
//!        │                    │
//!        │                    └──→ validate ──→ ScreenCache (memory / disk)
//!        ▼
//!   ActiveScreen ──→ TriggerEngine ──→ ActionRegistry ──→ handlers
//!        │                 ▲                   │
//!        ▼                 │                   ▼
//!   BindingResolver ──→ VariableStore ◀────────┘
//! ```

pub mod actions;
pub mod binding;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod screen;
pub mod triggers;
pub mod variables;

pub use error::RuntimeError;
