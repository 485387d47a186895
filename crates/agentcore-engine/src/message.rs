//! The closed tagged-union message and part shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use agentcore_tools::{TimeRange, ToolPartState};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelRef {
    pub provider_id: String,
    pub model_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsOverlay {
    #[serde(default)]
    pub allow: Option<Vec<String>>,
    #[serde(default)]
    pub deny: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTime {
    pub created: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantTime {
    pub created: i64,
    pub completed: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheTokens {
    pub read: u32,
    pub write: u32,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Tokens {
    pub input: u32,
    pub output: u32,
    pub reasoning: u32,
    pub cache: CacheTokens,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantPath {
    pub cwd: String,
    pub root: String,
}

/// Terminal reason an assistant message's stream ended with. `content_filter`
/// is folded in alongside the adapter's own finish reasons: the loop
/// treats it as a stop condition identical to `stop`/`length`/`error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
    Abort,
    Unknown,
}

impl FinishReason {
    /// These are *not* terminal — the loop takes another step.
    pub fn continues_loop(self) -> bool {
        matches!(self, FinishReason::ToolCalls | FinishReason::Unknown)
    }
}

/// One of the stable, enumerated assistant-message error kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum AssistantError {
    ProviderAuth { message: String },
    ContextOverflow { message: String },
    Api { status: Option<u16>, retryable: bool, body: Option<String> },
    Unknown { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        id: String,
        session_id: String,
        time: UserTime,
        agent: String,
        model: ModelRef,
        #[serde(default)]
        system: Option<String>,
        #[serde(default)]
        tools: Option<ToolsOverlay>,
        #[serde(default)]
        variant: Option<String>,
    },
    Assistant {
        id: String,
        session_id: String,
        time: AssistantTime,
        parent_id: String,
        model_id: String,
        provider_id: String,
        #[serde(default)]
        mode: Option<String>,
        agent: String,
        path: AssistantPath,
        #[serde(default)]
        cost: f64,
        #[serde(default)]
        tokens: Tokens,
        #[serde(default)]
        finish: Option<FinishReason>,
        #[serde(default)]
        error: Option<AssistantError>,
        #[serde(default)]
        summary: Option<String>,
        #[serde(default)]
        variant: Option<String>,
    },
}

impl Message {
    pub fn id(&self) -> &str {
        match self {
            Message::User { id, .. } | Message::Assistant { id, .. } => id,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Message::User { session_id, .. } | Message::Assistant { session_id, .. } => session_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Message::Assistant { finish: Some(_), .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    Text {
        id: String,
        message_id: String,
        session_id: String,
        text: String,
        #[serde(default)]
        synthetic: bool,
        #[serde(default)]
        ignored: bool,
        #[serde(default)]
        time: Option<TimeRange>,
        #[serde(default)]
        metadata: Option<Value>,
    },
    Reasoning {
        id: String,
        message_id: String,
        session_id: String,
        text: String,
        time: TimeRange,
        #[serde(default)]
        metadata: Option<Value>,
    },
    File {
        id: String,
        message_id: String,
        session_id: String,
        mime: String,
        url: String,
    },
    Tool {
        id: String,
        message_id: String,
        session_id: String,
        call_id: String,
        tool: String,
        state: ToolPartState,
        /// Live title/metadata patched in via `ctx.metadata()` while
        /// `running`; superseded by the tool's own `title`/`metadata` once
        /// `state` reaches `completed`.
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        metadata: Option<Value>,
    },
}

impl Part {
    pub fn id(&self) -> &str {
        match self {
            Part::Text { id, .. } | Part::Reasoning { id, .. } | Part::File { id, .. } | Part::Tool { id, .. } => id,
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            Part::Text { message_id, .. }
            | Part::Reasoning { message_id, .. }
            | Part::File { message_id, .. }
            | Part::Tool { message_id, .. } => message_id,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Part::Text { session_id, .. }
            | Part::Reasoning { session_id, .. }
            | Part::File { session_id, .. }
            | Part::Tool { session_id, .. } => session_id,
        }
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Part::Text { ignored: true, .. })
    }
}
