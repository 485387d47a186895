//! Shared axum state: the runtime, the per-call tool-host factory, and the
//! directories surfaced by `GET /path`.

use std::path::PathBuf;
use std::sync::Arc;

use agentcore_engine::{EngineToolHost, HostFactory, Runtime};
use agentcore_tools::ToolHost;

#[derive(Clone)]
pub struct Paths {
    pub data: PathBuf,
    pub config: Option<PathBuf>,
    pub storage: PathBuf,
    pub directory: PathBuf,
    pub worktree: Option<PathBuf>,
}

#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<Runtime>,
    pub host_factory: HostFactory,
    pub paths: Paths,
}

impl AppState {
    pub fn new(runtime: Arc<Runtime>, paths: Paths) -> Self {
        AppState { runtime, host_factory: default_host_factory(), paths }
    }
}

fn default_host_factory() -> HostFactory {
    Arc::new(|runtime, session_id, message_id, part_id, model| {
        Arc::new(EngineToolHost::new(runtime, session_id, message_id, part_id, model)) as Arc<dyn ToolHost>
    })
}
