//! The turn engine, stream processor, and content-addressed store for the
//! agent core runtime: everything between a persisted user message and a
//! persisted, finished assistant message.

mod agent;
mod error;
mod event;
mod host;
mod materialize;
mod message;
mod prompt;
mod runtime;
mod session;
mod store;
mod stream;
mod time;
mod turn;

pub use agent::{Agent, AgentCatalog};
pub use error::EngineError;
pub use event::CoreEvent;
pub use host::EngineToolHost;
pub use materialize::{materialize, Turn};
pub use message::{
    AssistantError, AssistantPath, AssistantTime, CacheTokens, FinishReason, Message, ModelRef, Part,
    Tokens, ToolsOverlay, UserTime,
};
pub use prompt::{environment_prompt, system_prompt};
pub use runtime::Runtime;
pub use session::{Session, SessionTime};
pub use store::Store;
pub use stream::{run_step, StepOutcome};
pub use turn::{run_turn, HostFactory};
