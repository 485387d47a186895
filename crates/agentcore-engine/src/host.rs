//! The engine's own `ToolHost`: wires a running tool's `ctx.metadata()`,
//! `ctx.ask()`, and `ctx.messages()` back into the store, arbiter, and
//! materializer without `agentcore-tools` depending on any of them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use agentcore_permission::{AskRequest, PermissionError};
use agentcore_tools::ToolHost;

use crate::materialize::{materialize, Turn};
use crate::message::ModelRef;
use crate::runtime::Runtime;

pub struct EngineToolHost {
    runtime: Arc<Runtime>,
    session_id: String,
    message_id: String,
    part_id: String,
    model: ModelRef,
}

impl EngineToolHost {
    pub fn new(runtime: Arc<Runtime>, session_id: String, message_id: String, part_id: String, model: ModelRef) -> Self {
        EngineToolHost { runtime, session_id, message_id, part_id, model }
    }
}

#[async_trait]
impl ToolHost for EngineToolHost {
    fn patch_metadata(&self, title: Option<String>, metadata: Option<Value>) {
        let Ok(parts) = self.runtime.store.parts(&self.message_id) else { return };
        let Some(part) = parts.into_iter().find(|p| p.id() == self.part_id.as_str()) else { return };
        if let crate::message::Part::Tool { id, message_id, session_id, call_id, tool, state, title: prior_title, metadata: prior_metadata } = part {
            let patched = crate::message::Part::Tool {
                id,
                message_id,
                session_id,
                call_id,
                tool,
                state,
                title: title.or(prior_title),
                metadata: metadata.or(prior_metadata),
            };
            let _ = self.runtime.store.write_part(&patched, None);
        }
    }

    async fn ask(&self, req: AskRequest) -> Result<(), PermissionError> {
        self.runtime.arbiter.ask(req).await
    }

    fn messages(&self) -> Vec<Value> {
        let Ok(messages) = self.runtime.store.messages(&self.session_id) else { return Vec::new() };
        let mut with_parts = Vec::with_capacity(messages.len());
        for message in &messages {
            let parts = self.runtime.store.parts(message.id()).unwrap_or_default();
            with_parts.push((message.clone(), parts));
        }
        let turns: Vec<Turn<'_>> = with_parts.iter().map(|(message, parts)| Turn { message, parts }).collect();
        materialize(&turns, &self.model)
    }
}
