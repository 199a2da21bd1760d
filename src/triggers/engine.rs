//! Reactive rule engine for one active screen.
//!
//! ```text
//!   Idle ──start──→ Running ──stop──→ Stopped
//!     └──────────────stop──────────────┘
//! ```
//!
//! While running, a listener task receives every [`VariableChange`] from the
//! store and every lifecycle event delivered by the host. Each matching
//! trigger becomes one *firing*: a task that dispatches the trigger's actions
//! sequentially. Firings run concurrently with each other; only the order
//! inside one firing is guaranteed. A handler error aborts the rest of its own
//! firing and nothing else.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};

use super::types::{LifecycleEvent, Trigger};
use crate::actions::{ActionContext, ActionRegistry};
use crate::variables::VariableChange;

/// Errors returned by [`TriggerEngine`] transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Trigger engine is already running")]
    AlreadyRunning,

    /// The engine was stopped; stopping is terminal.
    #[error("Trigger engine has been stopped")]
    Stopped,

    #[error("Trigger engine is not running")]
    NotRunning,

    #[error("Variable store has been disposed")]
    StoreDisposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Stopped,
}

enum EngineCommand {
    Lifecycle(LifecycleEvent),
    Stop {
        /// Let in-flight firings finish instead of aborting them.
        drain: bool,
        respond_to: oneshot::Sender<()>,
    },
}

struct EngineInner {
    state: EngineState,
    commands: Option<mpsc::UnboundedSender<EngineCommand>>,
    listener: Option<JoinHandle<()>>,
}

/// Trigger engine bound to one screen's action context.
pub struct TriggerEngine {
    ctx: ActionContext,
    inner: Mutex<EngineInner>,
}

impl TriggerEngine {
    pub fn new(ctx: ActionContext) -> Self {
        Self {
            ctx,
            inner: Mutex::new(EngineInner {
                state: EngineState::Idle,
                commands: None,
                listener: None,
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        self.inner.lock().state
    }

    /// Start observing the store and fire `Open` lifecycle triggers.
    ///
    /// The store subscription is taken before this returns, so any change
    /// applied afterwards is seen by the engine. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self, triggers: Vec<Trigger>) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        match inner.state {
            EngineState::Idle => {}
            EngineState::Running => return Err(EngineError::AlreadyRunning),
            EngineState::Stopped => return Err(EngineError::Stopped),
        }

        let changes = self
            .ctx
            .store()
            .subscribe()
            .ok_or(EngineError::StoreDisposed)?;
        let (commands, receiver) = mpsc::unbounded_channel();

        // Queued before the listener starts so Open fires first.
        let _ = commands.send(EngineCommand::Lifecycle(LifecycleEvent::Open));

        let listener = Listener {
            triggers: triggers.into_iter().map(Arc::new).collect(),
            registry: Arc::clone(self.ctx.registry()),
            ctx: self.ctx.clone(),
            firings: JoinSet::new(),
        };

        tracing::info!(
            screen_id = ?self.ctx.screen_id(),
            triggers = listener.triggers.len(),
            "Trigger engine started"
        );

        inner.listener = Some(tokio::spawn(listener.run(changes, receiver)));
        inner.commands = Some(commands);
        inner.state = EngineState::Running;
        Ok(())
    }

    /// Deliver a lifecycle event to the running engine.
    pub fn notify_lifecycle(&self, event: LifecycleEvent) -> Result<(), EngineError> {
        let inner = self.inner.lock();
        match (&inner.state, &inner.commands) {
            (EngineState::Running, Some(commands)) => commands
                .send(EngineCommand::Lifecycle(event))
                .map_err(|_| EngineError::NotRunning),
            (EngineState::Stopped, _) => Err(EngineError::Stopped),
            _ => Err(EngineError::NotRunning),
        }
    }

    /// Stop the engine: abort in-flight firings and release the store
    /// subscription. Idempotent; never fails.
    pub async fn stop(&self) {
        self.shutdown(false).await;
    }

    /// Like [`stop`](Self::stop), but events delivered before this call are
    /// still handled: queued lifecycle events and variable changes start their
    /// firings, and every firing runs to completion first.
    pub async fn drain_and_stop(&self) {
        self.shutdown(true).await;
    }

    async fn shutdown(&self, drain: bool) {
        let (commands, listener) = {
            let mut inner = self.inner.lock();
            if inner.state == EngineState::Stopped {
                return;
            }
            inner.state = EngineState::Stopped;
            (inner.commands.take(), inner.listener.take())
        };

        if let Some(commands) = commands {
            let (respond_to, acknowledged) = oneshot::channel();
            if commands
                .send(EngineCommand::Stop { drain, respond_to })
                .is_ok()
            {
                let _ = acknowledged.await;
            }
        }
        if let Some(listener) = listener {
            if let Err(e) = listener.await {
                tracing::debug!(error = %e, "Trigger listener ended abnormally");
            }
        }

        tracing::info!(screen_id = ?self.ctx.screen_id(), "Trigger engine stopped");
    }
}

impl Drop for TriggerEngine {
    fn drop(&mut self) {
        // Dropping the command sender ends the listener, which aborts firings.
        let inner = self.inner.get_mut();
        inner.commands = None;
        inner.state = EngineState::Stopped;
    }
}

impl std::fmt::Debug for TriggerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerEngine")
            .field("screen_id", &self.ctx.screen_id())
            .field("state", &self.state())
            .finish()
    }
}

struct Listener {
    triggers: Vec<Arc<Trigger>>,
    registry: Arc<ActionRegistry>,
    ctx: ActionContext,
    firings: JoinSet<()>,
}

impl Listener {
    async fn run(
        mut self,
        mut changes: broadcast::Receiver<VariableChange>,
        mut commands: mpsc::UnboundedReceiver<EngineCommand>,
    ) {
        let mut stop_ack = None;
        let mut drain = false;

        loop {
            tokio::select! {
                // Commands first so Open fires before queued changes.
                biased;

                command = commands.recv() => match command {
                    Some(EngineCommand::Lifecycle(event)) => self.on_lifecycle(event),
                    Some(EngineCommand::Stop { drain: wait, respond_to }) => {
                        stop_ack = Some(respond_to);
                        drain = wait;
                        break;
                    }
                    None => break,
                },
                change = changes.recv() => match change {
                    Ok(change) => self.on_change(&change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            screen_id = ?self.ctx.screen_id(),
                            skipped,
                            "Trigger engine lagged behind variable changes"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("Variable store closed, trigger listener exiting");
                        break;
                    }
                },
                Some(finished) = self.firings.join_next(), if !self.firings.is_empty() => {
                    if let Err(e) = finished {
                        if e.is_panic() {
                            tracing::warn!(error = %e, "Trigger firing panicked");
                        }
                    }
                }
            }
        }

        if drain {
            self.take_queued_changes(&mut changes);
        }
        // Release the subscription before touching firings.
        drop(changes);
        if drain {
            while let Some(finished) = self.firings.join_next().await {
                if let Err(e) = finished {
                    tracing::warn!(error = %e, "Trigger firing failed while draining");
                }
            }
        } else {
            self.firings.shutdown().await;
        }

        if let Some(respond_to) = stop_ack {
            let _ = respond_to.send(());
        }
    }

    /// Fire for changes already sitting in the channel, without waiting for
    /// new ones.
    fn take_queued_changes(&mut self, changes: &mut broadcast::Receiver<VariableChange>) {
        loop {
            match changes.try_recv() {
                Ok(change) => self.on_change(&change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        screen_id = ?self.ctx.screen_id(),
                        skipped,
                        "Trigger engine lagged behind variable changes while draining"
                    );
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }
    }

    fn on_change(&mut self, change: &VariableChange) {
        let screen_id = self.ctx.screen_id();
        let matched: Vec<Arc<Trigger>> = self
            .triggers
            .iter()
            .filter(|trigger| trigger.matches_variable(&change.key, screen_id))
            .cloned()
            .collect();

        for trigger in matched {
            tracing::debug!(
                trigger_id = %trigger.id,
                key = %change.key,
                version = change.version,
                "Variable trigger matched"
            );
            self.fire(trigger);
        }
    }

    fn on_lifecycle(&mut self, event: LifecycleEvent) {
        let matched: Vec<Arc<Trigger>> = self
            .triggers
            .iter()
            .filter(|trigger| trigger.matches_lifecycle(event))
            .cloned()
            .collect();

        for trigger in matched {
            tracing::debug!(trigger_id = %trigger.id, event = %event, "Lifecycle trigger matched");
            self.fire(trigger);
        }
    }

    fn fire(&mut self, trigger: Arc<Trigger>) {
        let registry = Arc::clone(&self.registry);
        let ctx = self.ctx.clone();
        let firing_id = uuid::Uuid::new_v4();

        self.firings.spawn(async move {
            match registry.dispatch_all(&trigger.actions, &ctx).await {
                Ok(handled) => tracing::debug!(
                    trigger_id = %trigger.id,
                    %firing_id,
                    handled,
                    "Trigger firing completed"
                ),
                Err(e) => tracing::warn!(
                    trigger_id = %trigger.id,
                    %firing_id,
                    error = %e,
                    "Trigger firing aborted"
                ),
            }
        });
    }
}
