//! The typed event stream every language-model adapter produces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::Usage;

/// Why a step stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    Other,
}

/// The raw failure an adapter reports. Classifying it into
/// `ProviderAuth`/`ContextOverflow`/`API`/`Aborted`/`Unknown` is the stream
/// processor's job, not the adapter's — the adapter only knows what the
/// provider told it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelErrorCause {
    pub message: String,
    pub status: Option<u16>,
    pub retryable: Option<bool>,
}

impl ModelErrorCause {
    pub fn new(message: impl Into<String>) -> Self {
        ModelErrorCause { message: message.into(), status: None, retryable: None }
    }
}

/// Provider-agnostic text patterns that indicate the prompt exceeded the
/// model's context window, independent of which provider emitted them.
const CONTEXT_OVERFLOW_PATTERNS: &[&str] =
    &["prompt is too long", "context_length_exceeded", "exceeds the maximum"];

/// Whether `message` looks like a context-window overflow, by the
/// provider-agnostic substring patterns every adapter is expected to surface.
pub fn looks_like_context_overflow(message: &str) -> bool {
    let lower = message.to_lowercase();
    CONTEXT_OVERFLOW_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Events for distinct text/reasoning/tool-call blocks may interleave, but
/// events within one block are ordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ModelEvent {
    TextStart,
    TextDelta {
        delta: String,
    },
    TextEnd {
        text: String,
        #[serde(default)]
        metadata: Option<Value>,
    },
    ReasoningStart,
    ReasoningDelta {
        delta: String,
    },
    ReasoningEnd {
        text: String,
        #[serde(default)]
        metadata: Option<Value>,
    },
    #[serde(rename = "tool-call-start")]
    ToolCallStart {
        tool_call_id: String,
        tool_name: String,
    },
    #[serde(rename = "tool-call-delta")]
    ToolCallDelta {
        tool_call_id: String,
        args_delta: String,
    },
    #[serde(rename = "tool-call")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        args: Value,
    },
    StepFinish {
        finish_reason: FinishReason,
        usage: Usage,
        #[serde(default)]
        metadata: Option<Value>,
    },
    Error {
        cause: ModelErrorCause,
    },
}
