//! The `Tool` trait and the execution context passed to every invocation.

use async_trait::async_trait;
use serde_json::Value;

use agentcore_permission::{AskRequest, PermissionError};

use crate::abort::AbortSignal;
use crate::state::Attachment;

/// A single tool invocation requested by the model, with its finalized
/// (fully parsed) arguments.
#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// The successful result of `Tool::execute`.
#[derive(Debug, Clone, Default)]
pub struct ToolExecuteOutput {
    pub title: String,
    pub output: String,
    pub metadata: Value,
    pub attachments: Vec<Attachment>,
}

impl ToolExecuteOutput {
    pub fn text(title: impl Into<String>, output: impl Into<String>) -> Self {
        ToolExecuteOutput {
            title: title.into(),
            output: output.into(),
            metadata: Value::Null,
            attachments: Vec::new(),
        }
    }
}

/// Capabilities the engine grants to a running tool, without exposing the
/// engine's own types to this crate (the message store and permission
/// arbiter are both owned by the caller, not by `agentcore-tools`).
#[async_trait]
pub trait ToolHost: Send + Sync {
    /// Patch the in-progress tool part's title and/or metadata.
    fn patch_metadata(&self, title: Option<String>, metadata: Option<Value>);
    /// Delegate to the permission arbiter; resolves on `allow`/`once`/
    /// `always`, fails on `deny`/`reject`.
    async fn ask(&self, req: AskRequest) -> Result<(), PermissionError>;
    /// Snapshot of the session's messages, for tools that need
    /// conversational context.
    fn messages(&self) -> Vec<Value>;
}

pub struct ToolContext {
    pub session_id: String,
    pub message_id: String,
    pub call_id: String,
    pub agent: String,
    pub abort: AbortSignal,
    host: std::sync::Arc<dyn ToolHost>,
}

impl ToolContext {
    pub fn new(
        session_id: impl Into<String>,
        message_id: impl Into<String>,
        call_id: impl Into<String>,
        agent: impl Into<String>,
        abort: AbortSignal,
        host: std::sync::Arc<dyn ToolHost>,
    ) -> Self {
        ToolContext {
            session_id: session_id.into(),
            message_id: message_id.into(),
            call_id: call_id.into(),
            agent: agent.into(),
            abort,
            host,
        }
    }

    pub fn metadata(&self, title: Option<String>, metadata: Option<Value>) {
        self.host.patch_metadata(title, metadata);
    }

    pub async fn ask(&self, req: AskRequest) -> Result<(), PermissionError> {
        self.host.ask(req).await
    }

    pub fn messages(&self) -> Vec<Value> {
        self.host.messages()
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }
}

/// Trait every built-in and user-defined tool implements. The registry is
/// a fixed list augmentable at startup; tool filtering by model is
/// advisory via [`Tool::models`].
#[async_trait]
pub trait Tool: Send + Sync {
    fn id(&self) -> &str;
    fn description(&self) -> &str;
    fn parameter_schema(&self) -> Value;

    /// `(providerID, modelID)` pairs this tool is offered to. `None` means
    /// every model.
    fn models(&self) -> Option<&[(&str, &str)]> {
        None
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolExecuteOutput, String>;
}
