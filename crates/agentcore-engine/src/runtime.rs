//! The single `Runtime` value: the process-wide
//! singletons of the source (workspace directory, approved ruleset,
//! pending maps, session-state map, bus, storage) collected into one
//! struct constructed at startup and threaded into every component.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex as AsyncMutex};

use agentcore_bus::Bus;
use agentcore_model::ModelProvider;
use agentcore_permission::{Arbiter, PermissionEvent};
use agentcore_storage::Storage;
use agentcore_tools::{AbortController, AbortSignal, ToolRegistry};

use crate::agent::AgentCatalog;
use crate::error::EngineError;
use crate::event::CoreEvent;
use crate::message::{Message, ModelRef};
use crate::store::Store;

/// Per-session loop bookkeeping: its abort controller, and a broadcast
/// channel so callers that arrive while a loop is already running can
/// await the same final assistant message (per-session
/// at-most-one-loop).
pub(crate) struct SessionLoopState {
    pub abort: AbortController,
    pub done: broadcast::Sender<Result<Message, String>>,
}

pub struct Runtime {
    pub store: Store,
    pub bus: Bus<CoreEvent>,
    pub arbiter: Arc<Arbiter>,
    pub tools: ToolRegistry,
    pub agents: AgentCatalog,
    pub max_retries: u32,
    providers: HashMap<(String, String), Arc<dyn ModelProvider>>,
    pub(crate) session_state: AsyncMutex<HashMap<String, Arc<SessionLoopState>>>,
}

impl Runtime {
    pub fn new(
        storage: Storage,
        tools: ToolRegistry,
        providers: Vec<Arc<dyn ModelProvider>>,
        agents: AgentCatalog,
        max_retries: u32,
    ) -> Arc<Self> {
        let bus = Bus::new();
        let arbiter = Arc::new(Arbiter::new(Bus::new()));

        let forward_bus = bus.clone();
        arbiter.bus().subscribe_all(move |event: &PermissionEvent| {
            forward_bus.publish(CoreEvent::Permission(event.clone()));
        });

        let mut by_key = HashMap::new();
        for provider in providers {
            by_key.insert((provider.name().to_string(), provider.model_name().to_string()), provider);
        }

        Arc::new(Runtime {
            store: Store::new(storage, bus.clone()),
            bus,
            arbiter,
            tools,
            agents,
            max_retries,
            providers: by_key,
            session_state: AsyncMutex::new(HashMap::new()),
        })
    }

    pub fn resolve_provider(&self, model: &ModelRef) -> Result<Arc<dyn ModelProvider>, EngineError> {
        self.providers.get(&(model.provider_id.clone(), model.model_id.clone())).cloned().ok_or_else(|| {
            let suggestions = self
                .providers
                .keys()
                .filter(|(p, _)| *p == model.provider_id)
                .map(|(_, m)| m.clone())
                .take(5)
                .collect();
            EngineError::ModelNotFound {
                provider_id: model.provider_id.clone(),
                model_id: model.model_id.clone(),
                suggestions,
            }
        })
    }

    /// Fetch (or create) the abort controller for a session's running loop.
    /// Returns `None` for the newly-created-by-us case (caller should run
    /// the loop), `Some(signal)` if a loop is already running and the
    /// caller should instead subscribe to `done`.
    pub(crate) async fn acquire_loop(self: &Arc<Self>, session_id: &str) -> LoopAcquisition {
        let mut state = self.session_state.lock().await;
        if let Some(existing) = state.get(session_id) {
            return LoopAcquisition::AlreadyRunning(existing.done.subscribe());
        }
        let (done_tx, _) = broadcast::channel(1);
        let entry = Arc::new(SessionLoopState { abort: AbortController::new(), done: done_tx });
        state.insert(session_id.to_string(), entry.clone());
        LoopAcquisition::Owned(entry)
    }

    pub(crate) async fn release_loop(&self, session_id: &str, result: Result<Message, String>) {
        let mut state = self.session_state.lock().await;
        if let Some(entry) = state.remove(session_id) {
            let _ = entry.done.send(result);
        }
    }

    pub async fn abort_session(&self, session_id: &str) -> bool {
        let state = self.session_state.lock().await;
        match state.get(session_id) {
            Some(entry) => {
                entry.abort.abort();
                self.arbiter.abort_session(session_id);
                true
            }
            None => false,
        }
    }

    pub(crate) async fn abort_signal(&self, session_id: &str) -> Option<AbortSignal> {
        self.session_state.lock().await.get(session_id).map(|entry| entry.abort.signal())
    }
}

pub(crate) enum LoopAcquisition {
    Owned(Arc<SessionLoopState>),
    AlreadyRunning(broadcast::Receiver<Result<Message, String>>),
}
