//! Persistence backends the variable store synchronizes with.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::PersistenceError;
use super::scope::{Scope, VariableKey};
use super::variable::StoredVariable;
use crate::cache::sanitize_key;

/// Key-value backend behind persistent variables.
#[async_trait]
pub trait VariablePersistence: Send + Sync {
    /// Load every persisted variable in the given scope.
    async fn load(&self, scope: &Scope) -> Result<Vec<StoredVariable>, PersistenceError>;

    async fn save(&self, variable: &StoredVariable) -> Result<(), PersistenceError>;

    async fn remove(&self, key: &VariableKey) -> Result<(), PersistenceError>;
}

/// In-process persistence, mostly useful for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    entries: Mutex<HashMap<Scope, BTreeMap<String, StoredVariable>>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value directly, bypassing the store.
    pub fn insert(&self, variable: StoredVariable) {
        self.entries
            .lock()
            .entry(variable.scope.clone())
            .or_default()
            .insert(variable.key.clone(), variable);
    }

    pub fn get(&self, key: &VariableKey) -> Option<StoredVariable> {
        self.entries
            .lock()
            .get(&key.scope)
            .and_then(|scope| scope.get(&key.key))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VariablePersistence for MemoryPersistence {
    async fn load(&self, scope: &Scope) -> Result<Vec<StoredVariable>, PersistenceError> {
        Ok(self
            .entries
            .lock()
            .get(scope)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn save(&self, variable: &StoredVariable) -> Result<(), PersistenceError> {
        self.insert(variable.clone());
        Ok(())
    }

    async fn remove(&self, key: &VariableKey) -> Result<(), PersistenceError> {
        if let Some(entries) = self.entries.lock().get_mut(&key.scope) {
            entries.remove(&key.key);
        }
        Ok(())
    }
}

/// JSON-file persistence: one document per scope inside a directory.
///
/// Writes go through a temporary file and a rename so a crash never leaves a
/// truncated document behind.
#[derive(Debug)]
pub struct JsonFilePersistence {
    directory: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFilePersistence {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, scope: &Scope) -> PathBuf {
        let name = match scope {
            Scope::Global => "global.json".to_string(),
            Scope::Screen(id) => format!("screen-{}.json", sanitize_key(id)),
        };
        self.directory.join(name)
    }

    async fn read_document(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<String, StoredVariable>, PersistenceError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(PersistenceError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| PersistenceError::Decode {
            path: path.to_path_buf(),
            source: e,
        })
    }

    async fn write_document(
        &self,
        path: &Path,
        document: &BTreeMap<String, StoredVariable>,
    ) -> Result<(), PersistenceError> {
        let io_err = |source| PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        };

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(io_err)?;

        let content = serde_json::to_string_pretty(document).map_err(PersistenceError::Encode)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(io_err)
    }
}

#[async_trait]
impl VariablePersistence for JsonFilePersistence {
    async fn load(&self, scope: &Scope) -> Result<Vec<StoredVariable>, PersistenceError> {
        let document = self.read_document(&self.path_for(scope)).await?;
        Ok(document.into_values().collect())
    }

    async fn save(&self, variable: &StoredVariable) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(&variable.scope);
        let mut document = self.read_document(&path).await?;
        document.insert(variable.key.clone(), variable.clone());
        self.write_document(&path, &document).await
    }

    async fn remove(&self, key: &VariableKey) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(&key.scope);
        let mut document = self.read_document(&path).await?;
        if document.remove(&key.key).is_some() {
            self.write_document(&path, &document).await?;
        }
        Ok(())
    }
}
