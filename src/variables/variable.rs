use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::scope::{Scope, StoragePolicy, VariableKey};
use super::value::VariableValue;
use crate::clock::{from_millis, to_millis};

/// A variable owned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub key: VariableKey,
    pub value: VariableValue,
    pub updated_at: SystemTime,
    pub policy: StoragePolicy,
    /// Absolute expiry derived from the TTL at write time.
    pub expires_at: Option<SystemTime>,
}

impl Variable {
    /// Expired entries are treated as absent. An entry expiring exactly at `now`
    /// is already gone.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    pub fn to_stored(&self) -> StoredVariable {
        StoredVariable {
            key: self.key.key.clone(),
            scope: self.key.scope.clone(),
            value: self.value.clone(),
            updated_at_ms: to_millis(self.updated_at),
            expires_at_ms: self.expires_at.map(to_millis),
        }
    }
}

/// Variable as exchanged with the persistence backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVariable {
    pub key: String,
    pub scope: Scope,
    pub value: VariableValue,
    pub updated_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

impl StoredVariable {
    pub fn identity(&self) -> VariableKey {
        VariableKey::new(self.key.clone(), self.scope.clone())
    }

    pub fn into_variable(self) -> Variable {
        Variable {
            key: VariableKey::new(self.key, self.scope),
            value: self.value,
            updated_at: from_millis(self.updated_at_ms),
            policy: StoragePolicy::Persistent,
            expires_at: self.expires_at_ms.map(from_millis),
        }
    }
}
