//! Shared test utilities and fakes for the runtime collaborators.

#![allow(dead_code, unused_imports)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sdui_runtime::actions::{
    Action, ActionContext, ActionError, ActionFetcher, ActionHandler, ActionKind, ActionPayload,
    ActionRegistry, NavigationError, Navigator, Params,
};
use sdui_runtime::cache::ScreenFetcher;
use sdui_runtime::error::FetchError;
use sdui_runtime::screen::{Screen, ScreenRequest};
use sdui_runtime::variables::{ScopeKind, StoragePolicy, VariableStore, VariableValue};
use serde_json::json;

/// Navigator that records every call as `"<kind>:<target>"`.
#[derive(Default)]
pub struct RecordingNavigator {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Navigator whose every call fails.
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) -> Result<(), NavigationError> {
        self.calls.lock().push(call.clone());
        if self.fail {
            return Err(NavigationError::new(format!("refused {}", call)));
        }
        Ok(())
    }
}

#[async_trait]
impl Navigator for RecordingNavigator {
    async fn open_route(&self, route: &str) -> Result<(), NavigationError> {
        self.record(format!("route:{}", route))
    }

    async fn forward(&self, screen_id: &str, _params: &Params) -> Result<(), NavigationError> {
        self.record(format!("forward:{}", screen_id))
    }

    async fn show_popup(&self, screen_id: &str, _params: &Params) -> Result<(), NavigationError> {
        self.record(format!("popup:{}", screen_id))
    }

    async fn show_overlay(
        &self,
        screen_id: &str,
        _params: &Params,
    ) -> Result<(), NavigationError> {
        self.record(format!("overlay:{}", screen_id))
    }
}

/// Handler recording the ids of the actions it receives.
///
/// Actions whose id is in `failing` return an error after being recorded;
/// every action waits `delay` before completing.
pub struct RecordingHandler {
    kind: ActionKind,
    seen: Arc<Mutex<Vec<String>>>,
    completed: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    delay: Duration,
}

impl RecordingHandler {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            seen: Arc::new(Mutex::new(Vec::new())),
            completed: Arc::new(Mutex::new(Vec::new())),
            failing: HashSet::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn failing_on(mut self, action_id: &str) -> Self {
        self.failing.insert(action_id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Ids in the order handling started.
    pub fn seen(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.seen)
    }

    /// Ids in the order handling finished successfully.
    pub fn completed(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.completed)
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    fn kind(&self) -> ActionKind {
        self.kind
    }

    async fn handle(&self, action: &Action, _ctx: &ActionContext) -> Result<(), ActionError> {
        self.seen.lock().push(action.id.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.contains(&action.id) {
            return Err(ActionError::Handler(anyhow::anyhow!(
                "scripted failure for {}",
                action.id
            )));
        }
        self.completed.lock().push(action.id.clone());
        Ok(())
    }
}

/// Screen fetcher answering from a script and counting calls.
#[derive(Default)]
pub struct ScriptedScreenFetcher {
    responses: Mutex<HashMap<String, Result<Screen, FetchError>>>,
    calls: AtomicUsize,
}

impl ScriptedScreenFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, screen_id: &str, response: Result<Screen, FetchError>) {
        self.responses
            .lock()
            .insert(screen_id.to_string(), response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenFetcher for ScriptedScreenFetcher {
    async fn fetch(&self, request: &ScreenRequest) -> Result<Screen, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .get(&request.screen_id)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::remote(format!("no script for {}", request.screen_id))))
    }
}

/// Action fetcher answering from a path-keyed script.
#[derive(Default)]
pub struct ScriptedActionFetcher {
    responses: Mutex<HashMap<String, Vec<Action>>>,
    requested: Mutex<Vec<String>>,
}

impl ScriptedActionFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, path: &str, actions: Vec<Action>) {
        self.responses.lock().insert(path.to_string(), actions);
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl ActionFetcher for ScriptedActionFetcher {
    async fn fetch(&self, path: &str, _params: &Params) -> Result<Vec<Action>, FetchError> {
        self.requested.lock().push(path.to_string());
        self.responses
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::remote(format!("no script for {}", path)))
    }
}

pub fn set_action(id: &str, key: &str, value: impl Into<VariableValue>, scope: ScopeKind) -> Action {
    Action::new(
        id,
        ActionPayload::SetVariable {
            key: key.to_string(),
            value: value.into(),
            scope,
            policy: StoragePolicy::InMemory,
            ttl_seconds: None,
        },
    )
}

pub fn increment_action(id: &str, key: &str, delta: f64, scope: ScopeKind) -> Action {
    Action::new(
        id,
        ActionPayload::Increment {
            key: key.to_string(),
            delta,
            scope,
            policy: StoragePolicy::InMemory,
        },
    )
}

pub fn custom_action(id: &str) -> Action {
    Action::new(
        id,
        ActionPayload::Custom {
            name: id.to_string(),
            payload: json!({}),
        },
    )
}

pub fn fetch_action(id: &str, path: &str) -> Action {
    Action::new(
        id,
        ActionPayload::FetchActions {
            path: path.to_string(),
            params: Params::new(),
        },
    )
}

/// Action context over `store` with a recording navigator.
pub fn context(
    store: &VariableStore,
    registry: ActionRegistry,
    screen_id: Option<&str>,
) -> (ActionContext, Arc<RecordingNavigator>) {
    let navigator = RecordingNavigator::new();
    let mut ctx = ActionContext::new(store.clone(), navigator.clone(), Arc::new(registry));
    if let Some(id) = screen_id {
        ctx = ctx.with_screen(id);
    }
    (ctx, navigator)
}

/// Poll `condition` until it holds or a second passes.
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
