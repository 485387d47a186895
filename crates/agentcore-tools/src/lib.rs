//! Tool ABI, execution context, registry, and the tool-call state machine.

mod abort;
mod registry;
mod state;
mod tool;

pub use abort::{AbortController, AbortSignal};
pub use registry::{ToolRegistry, ToolSchema};
pub use state::{Attachment, InvalidTransition, TimeRange, ToolPartState};
pub use tool::{Tool, ToolCall, ToolContext, ToolExecuteOutput, ToolHost};
