//! Scoped, TTL-aware variable store.
//!
//! The store is the single source of truth for variable state. Reads on the
//! render path go through [`VariableStore::peek`], which only touches the
//! in-memory map. Everything else is async because it may wait on the
//! persistence writer.
//!
//! Persistent writes are not applied inline: they are enqueued on one ordered
//! command queue served by a background writer task, so the backing store sees
//! writes in exactly the order they were applied in memory. Loads travel through
//! the same queue and therefore never observe a state older than a write that
//! was already acknowledged.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use super::conflict::{ConflictStrategy, LastWriteWins, Resolution};
use super::error::{PersistenceError, StoreError};
use super::persistence::VariablePersistence;
use super::scope::{Scope, StoragePolicy, VariableKey};
use super::value::VariableValue;
use super::variable::{StoredVariable, Variable};
use crate::clock::{Clock, SystemClock};

const DEFAULT_CHANGE_BUFFER: usize = 256;

/// What happened to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Set,
    Removed,
    /// Replaced or inserted by `sync_from_persistent`.
    Synced,
    /// Dropped by `clear_screen`.
    Cleared,
}

/// Notification published for every applied change, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableChange {
    pub version: u64,
    pub key: VariableKey,
    pub kind: ChangeKind,
}

/// Result of a `sync_from_persistent` pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    /// Persisted entries inserted or replacing local ones.
    pub applied: usize,
    /// Persisted entries ignored because the local value won.
    pub kept_local: usize,
}

enum PersistenceCommand {
    Save(StoredVariable),
    Remove(VariableKey),
    Load {
        scope: Scope,
        respond_to: oneshot::Sender<Result<Vec<StoredVariable>, PersistenceError>>,
    },
    Flush {
        respond_to: oneshot::Sender<()>,
    },
}

/// Builder for [`VariableStore`].
pub struct VariableStoreBuilder {
    persistence: Option<Arc<dyn VariablePersistence>>,
    clock: Arc<dyn Clock>,
    strategy: Arc<dyn ConflictStrategy>,
    change_buffer: usize,
}

impl Default for VariableStoreBuilder {
    fn default() -> Self {
        Self {
            persistence: None,
            clock: Arc::new(SystemClock),
            strategy: Arc::new(LastWriteWins),
            change_buffer: DEFAULT_CHANGE_BUFFER,
        }
    }
}

impl VariableStoreBuilder {
    pub fn persistence(mut self, persistence: Arc<dyn VariablePersistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn conflict_strategy(mut self, strategy: Arc<dyn ConflictStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Capacity of the change broadcast channel. Slow subscribers that fall
    /// further behind observe a lag.
    pub fn change_buffer(mut self, capacity: usize) -> Self {
        self.change_buffer = capacity.max(1);
        self
    }

    /// Build the store.
    ///
    /// When persistence is configured this spawns the writer task and must be
    /// called from within a Tokio runtime.
    pub fn build(self) -> VariableStore {
        let writer = self.persistence.map(|persistence| {
            let (sender, receiver) = mpsc::unbounded_channel();
            tokio::spawn(run_writer(receiver, persistence));
            sender
        });
        let (changes, _) = broadcast::channel(self.change_buffer);
        let (version_tx, _) = watch::channel(0);

        VariableStore {
            inner: Arc::new(StoreInner {
                clock: self.clock,
                strategy: self.strategy,
                state: Mutex::new(StoreState {
                    entries: HashMap::new(),
                    version: 0,
                    changes: Some(changes),
                    version_tx,
                    writer,
                    hydrated: HashSet::new(),
                    pending_loads: 0,
                    tombstones: HashMap::new(),
                    disposed: false,
                }),
            }),
        }
    }
}

/// Shared handle to the variable store. Cloning is cheap.
#[derive(Clone)]
pub struct VariableStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    clock: Arc<dyn Clock>,
    strategy: Arc<dyn ConflictStrategy>,
    state: Mutex<StoreState>,
}

struct StoreState {
    entries: HashMap<VariableKey, Variable>,
    version: u64,
    changes: Option<broadcast::Sender<VariableChange>>,
    version_tx: watch::Sender<u64>,
    writer: Option<mpsc::UnboundedSender<PersistenceCommand>>,
    /// Scopes whose persisted entries were already pulled into memory.
    hydrated: HashSet<Scope>,
    /// Loads issued but not merged yet.
    pending_loads: usize,
    /// Keys removed while loads were in flight, with the removal version.
    tombstones: HashMap<VariableKey, u64>,
    disposed: bool,
}

impl StoreState {
    fn ensure_live(&self) -> Result<(), StoreError> {
        if self.disposed {
            Err(StoreError::Disposed)
        } else {
            Ok(())
        }
    }

    fn publish(&mut self, key: VariableKey, kind: ChangeKind) -> u64 {
        self.version += 1;
        let version = self.version;
        tracing::trace!(key = %key, version, ?kind, "Variable changed");
        if let Some(changes) = &self.changes {
            // No receivers is fine: nobody is listening yet.
            let _ = changes.send(VariableChange { version, key, kind });
        }
        self.version_tx.send_replace(version);
        version
    }

    fn enqueue(&self, command: PersistenceCommand) {
        if let Some(writer) = &self.writer {
            if writer.send(command).is_err() {
                tracing::warn!("Persistence writer stopped, dropping write");
            }
        }
    }

    fn record_removal(&mut self, key: &VariableKey) {
        if self.pending_loads > 0 {
            self.tombstones.insert(key.clone(), self.version);
        }
    }

    fn finish_load(&mut self) {
        self.pending_loads = self.pending_loads.saturating_sub(1);
        if self.pending_loads == 0 {
            self.tombstones.clear();
        }
    }

    /// Whether a persisted entry loaded at `load_version` is stale because the
    /// key was removed afterwards.
    fn removed_since(&self, key: &VariableKey, load_version: u64) -> bool {
        self.tombstones
            .get(key)
            .is_some_and(|&removed_at| removed_at >= load_version)
    }
}

impl VariableStore {
    pub fn builder() -> VariableStoreBuilder {
        VariableStoreBuilder::default()
    }

    /// In-memory store with the system clock and no persistence.
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    /// Read the in-memory snapshot only. Never waits on I/O.
    ///
    /// Expired entries read as absent but are left for the next
    /// suspending read to purge.
    pub fn peek(&self, key: &str, scope: &Scope) -> Option<VariableValue> {
        let now = self.inner.clock.now();
        let state = self.inner.state.lock();
        if state.disposed {
            return None;
        }
        state
            .entries
            .get(&VariableKey::new(key, scope.clone()))
            .filter(|variable| !variable.is_expired(now))
            .map(|variable| variable.value.clone())
    }

    /// Authoritative read. Falls back to the persistence backend the first
    /// time a scope misses in memory.
    pub async fn get(&self, key: &str, scope: &Scope) -> Result<Option<VariableValue>, StoreError> {
        let identity = VariableKey::new(key, scope.clone());
        let now = self.inner.clock.now();

        {
            let mut state = self.inner.state.lock();
            state.ensure_live()?;

            match state.entries.get(&identity) {
                Some(variable) if !variable.is_expired(now) => {
                    return Ok(Some(variable.value.clone()));
                }
                Some(_) => {
                    tracing::debug!(key = %identity, "Purging expired variable");
                    state.entries.remove(&identity);
                }
                None => {}
            }
        }

        self.hydrate(scope).await?;

        let now = self.inner.clock.now();
        let state = self.inner.state.lock();
        state.ensure_live()?;
        Ok(state
            .entries
            .get(&identity)
            .filter(|variable| !variable.is_expired(now))
            .map(|variable| variable.value.clone()))
    }

    /// Pull a scope's persisted entries into memory the first time the scope is
    /// touched. Entries already in memory win over loaded ones.
    async fn hydrate(&self, scope: &Scope) -> Result<(), StoreError> {
        let (writer, load_version) = {
            let mut state = self.inner.state.lock();
            state.ensure_live()?;
            if state.hydrated.contains(scope) {
                return Ok(());
            }
            let Some(writer) = state.writer.clone() else {
                return Ok(());
            };
            state.pending_loads += 1;
            (writer, state.version)
        };

        let loaded = load_through(&writer, scope).await;

        let mut state = self.inner.state.lock();
        let persisted = match loaded {
            Ok(persisted) if !state.disposed => persisted,
            Ok(_) => {
                state.finish_load();
                return Err(StoreError::Disposed);
            }
            Err(e) => {
                state.finish_load();
                return Err(e.into());
            }
        };

        let now = self.inner.clock.now();
        for stored in persisted {
            let variable = stored.into_variable();
            if variable.is_expired(now) || state.removed_since(&variable.key, load_version) {
                continue;
            }
            // A write that raced the load is newer than anything persisted.
            state.entries.entry(variable.key.clone()).or_insert(variable);
        }
        state.hydrated.insert(scope.clone());
        state.finish_load();
        Ok(())
    }

    /// Upsert a variable, bumping the change version.
    pub async fn set(
        &self,
        key: &str,
        value: VariableValue,
        scope: &Scope,
        policy: StoragePolicy,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let now = self.inner.clock.now();
        let identity = VariableKey::new(key, scope.clone());
        let variable = Variable {
            key: identity.clone(),
            value,
            updated_at: now,
            policy,
            expires_at: ttl.map(|ttl| now + ttl),
        };

        let mut state = self.inner.state.lock();
        state.ensure_live()?;
        if policy == StoragePolicy::Persistent {
            state.enqueue(PersistenceCommand::Save(variable.to_stored()));
        }
        state.entries.insert(identity.clone(), variable);
        state.publish(identity, ChangeKind::Set);
        Ok(())
    }

    /// Add `delta` to a numeric variable, creating it when absent. A value
    /// only present in the backing store counts as present.
    ///
    /// Fails with [`StoreError::TypeMismatch`] when the current value is not a
    /// number; the value is left untouched in that case.
    pub async fn increment(
        &self,
        key: &str,
        delta: f64,
        scope: &Scope,
        policy: StoragePolicy,
    ) -> Result<f64, StoreError> {
        // The persisted counter is the base when the scope is not loaded yet.
        self.hydrate(scope).await?;

        let now = self.inner.clock.now();
        let identity = VariableKey::new(key, scope.clone());

        let mut state = self.inner.state.lock();
        state.ensure_live()?;

        let (next, expires_at) = match state.entries.get(&identity) {
            Some(current) if !current.is_expired(now) => match &current.value {
                VariableValue::Number(n) => (n + delta, current.expires_at),
                other => {
                    return Err(StoreError::TypeMismatch {
                        key: identity,
                        expected: "number",
                        found: other.type_name(),
                    })
                }
            },
            _ => (delta, None),
        };

        let variable = Variable {
            key: identity.clone(),
            value: VariableValue::Number(next),
            updated_at: now,
            policy,
            expires_at,
        };
        if policy == StoragePolicy::Persistent {
            state.enqueue(PersistenceCommand::Save(variable.to_stored()));
        }
        state.entries.insert(identity.clone(), variable);
        state.publish(identity, ChangeKind::Set);
        Ok(next)
    }

    /// Remove a variable from memory and, unless it was memory-only, from the
    /// backing store. Returns whether an entry existed, loading the scope from
    /// the backing store first if needed.
    pub async fn remove(&self, key: &str, scope: &Scope) -> Result<bool, StoreError> {
        self.hydrate(scope).await?;
        let identity = VariableKey::new(key, scope.clone());

        let mut state = self.inner.state.lock();
        state.ensure_live()?;

        let removed = state.entries.remove(&identity);
        if !matches!(
            removed,
            Some(Variable {
                policy: StoragePolicy::InMemory,
                ..
            })
        ) {
            state.enqueue(PersistenceCommand::Remove(identity.clone()));
        }
        state.record_removal(&identity);

        if removed.is_some() {
            state.publish(identity, ChangeKind::Removed);
        }
        Ok(removed.is_some())
    }

    /// Pull persisted variables for the global scope (and the screen scope when
    /// given) and merge them with memory using the conflict strategy.
    ///
    /// A local write newer than its persisted copy is never dropped.
    pub async fn sync_from_persistent(
        &self,
        screen_id: Option<&str>,
    ) -> Result<SyncSummary, StoreError> {
        let mut scopes = vec![Scope::Global];
        if let Some(id) = screen_id {
            scopes.push(Scope::screen(id));
        }

        let mut summary = SyncSummary::default();
        for scope in scopes {
            let (writer, load_version) = {
                let mut state = self.inner.state.lock();
                state.ensure_live()?;
                let Some(writer) = state.writer.clone() else {
                    return Ok(summary);
                };
                state.pending_loads += 1;
                (writer, state.version)
            };

            let loaded = load_through(&writer, &scope).await;

            let mut state = self.inner.state.lock();
            let persisted = match loaded {
                Ok(persisted) if !state.disposed => persisted,
                Ok(_) => {
                    state.finish_load();
                    return Err(StoreError::Disposed);
                }
                Err(e) => {
                    state.finish_load();
                    return Err(e.into());
                }
            };

            let now = self.inner.clock.now();
            for stored in persisted {
                let incoming = stored.into_variable();
                if incoming.is_expired(now) || state.removed_since(&incoming.key, load_version) {
                    continue;
                }

                let take = match state.entries.get(&incoming.key) {
                    Some(local) if !local.is_expired(now) => {
                        self.inner.strategy.resolve(local, &incoming) == Resolution::TakePersisted
                    }
                    _ => true,
                };

                if take {
                    let key = incoming.key.clone();
                    state.entries.insert(key.clone(), incoming);
                    state.publish(key, ChangeKind::Synced);
                    summary.applied += 1;
                } else {
                    summary.kept_local += 1;
                }
            }
            state.hydrated.insert(scope.clone());
            state.finish_load();
            tracing::debug!(
                scope = %scope,
                applied = summary.applied,
                kept_local = summary.kept_local,
                "Synced variables from persistence"
            );
        }
        Ok(summary)
    }

    /// Drop every in-memory variable of a screen. Persisted copies are kept.
    pub fn clear_screen(&self, screen_id: &str) -> usize {
        let scope = Scope::screen(screen_id);
        let mut state = self.inner.state.lock();
        if state.disposed {
            return 0;
        }

        let keys: Vec<VariableKey> = state
            .entries
            .keys()
            .filter(|key| key.scope == scope)
            .cloned()
            .collect();
        for key in &keys {
            state.entries.remove(key);
            state.record_removal(key);
            state.publish(key.clone(), ChangeKind::Cleared);
        }
        state.hydrated.remove(&scope);

        if !keys.is_empty() {
            tracing::debug!(screen_id, cleared = keys.len(), "Cleared screen variables");
        }
        keys.len()
    }

    /// Wait until every persistence write enqueued so far has been applied.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let writer = {
            let state = self.inner.state.lock();
            state.ensure_live()?;
            match &state.writer {
                Some(writer) => writer.clone(),
                None => return Ok(()),
            }
        };

        let (respond_to, receiver) = oneshot::channel();
        writer
            .send(PersistenceCommand::Flush { respond_to })
            .map_err(|_| PersistenceError::QueueClosed)?;
        receiver.await.map_err(|_| PersistenceError::QueueClosed)?;
        Ok(())
    }

    /// Copy of every live entry in a scope.
    pub fn snapshot(&self, scope: &Scope) -> Vec<(String, VariableValue)> {
        let now = self.inner.clock.now();
        let state = self.inner.state.lock();
        if state.disposed {
            return Vec::new();
        }
        let mut entries: Vec<(String, VariableValue)> = state
            .entries
            .values()
            .filter(|variable| &variable.key.scope == scope && !variable.is_expired(now))
            .map(|variable| (variable.key.key.clone(), variable.value.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Current change version.
    pub fn version(&self) -> u64 {
        self.inner.state.lock().version
    }

    /// Subscribe to change notifications.
    ///
    /// Returns `None` once the store is disposed.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<VariableChange>> {
        self.inner
            .state
            .lock()
            .changes
            .as_ref()
            .map(broadcast::Sender::subscribe)
    }

    /// Watch the latest change version, for render subscribers that only need
    /// to know that something changed.
    pub fn watch_version(&self) -> watch::Receiver<u64> {
        self.inner.state.lock().version_tx.subscribe()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Release all resources. Idempotent.
    ///
    /// Subscribers see their channel close. Persistence writes already
    /// enqueued still drain; later operations fail with
    /// [`StoreError::Disposed`].
    pub fn dispose(&self) {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.entries.clear();
        state.hydrated.clear();
        state.tombstones.clear();
        state.changes = None;
        state.writer = None;
        tracing::info!(version = state.version, "Variable store disposed");
    }
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("VariableStore")
            .field("entries", &state.entries.len())
            .field("version", &state.version)
            .field("persistent", &state.writer.is_some())
            .field("disposed", &state.disposed)
            .finish()
    }
}

async fn load_through(
    writer: &mpsc::UnboundedSender<PersistenceCommand>,
    scope: &Scope,
) -> Result<Vec<StoredVariable>, PersistenceError> {
    let (respond_to, receiver) = oneshot::channel();
    writer
        .send(PersistenceCommand::Load {
            scope: scope.clone(),
            respond_to,
        })
        .map_err(|_| PersistenceError::QueueClosed)?;
    receiver.await.map_err(|_| PersistenceError::QueueClosed)?
}

async fn run_writer(
    mut receiver: mpsc::UnboundedReceiver<PersistenceCommand>,
    persistence: Arc<dyn VariablePersistence>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            PersistenceCommand::Save(variable) => {
                if let Err(e) = persistence.save(&variable).await {
                    tracing::warn!(key = %variable.key, scope = %variable.scope, error = %e, "Failed to persist variable");
                }
            }
            PersistenceCommand::Remove(key) => {
                if let Err(e) = persistence.remove(&key).await {
                    tracing::warn!(key = %key, error = %e, "Failed to remove persisted variable");
                }
            }
            PersistenceCommand::Load { scope, respond_to } => {
                let result = persistence.load(&scope).await;
                if respond_to.send(result).is_err() {
                    tracing::trace!("Persistence load response dropped (receiver gone)");
                }
            }
            PersistenceCommand::Flush { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }
    tracing::debug!("Persistence writer stopped");
}
