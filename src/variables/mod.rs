//! Scoped variable state with TTL and persistence sync.
//!
//! # Architecture
//!
//! ```text
//! set / increment / remove ──→ VariableStore ──→ broadcast<VariableChange>
//!                                   │                 (trigger engine)
//!                                   │
//!                                   ├──→ watch<u64>   (render subscribers)
//!                                   │
//!                                   └──→ writer task ──→ VariablePersistence
//! ```

mod conflict;
mod error;
mod persistence;
mod scope;
mod store;
mod value;
mod variable;

pub use conflict::{ConflictStrategy, LastWriteWins, Resolution};
pub use error::{PersistenceError, StoreError};
pub use persistence::{JsonFilePersistence, MemoryPersistence, VariablePersistence};
pub use scope::{Scope, ScopeKind, StoragePolicy, VariableKey};
pub use store::{ChangeKind, SyncSummary, VariableChange, VariableStore, VariableStoreBuilder};
pub use value::VariableValue;
pub use variable::{StoredVariable, Variable};
