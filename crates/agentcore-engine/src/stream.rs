//! The stream processor: consumes one model step's event stream,
//! materializing text/reasoning/tool-call parts as they arrive and
//! executing tool calls inline. Tool execution is sequential — in
//! practice the model stream pauses until tools complete, so there is
//! nothing to gain from consuming further events concurrently with a
//! running tool.

use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::Value;

use agentcore_model::{looks_like_context_overflow, FinishReason as ModelFinishReason, ModelErrorCause, ModelEvent};
use agentcore_tools::{AbortSignal, Attachment, Tool, ToolContext, ToolExecuteOutput, ToolHost, ToolPartState, ToolRegistry};

use crate::message::{AssistantError, CacheTokens, FinishReason, Part, Tokens};
use crate::store::Store;
use crate::time::now_millis;

/// What a single step's event stream resolved to, once exhausted, aborted,
/// or errored.
pub struct StepOutcome {
    pub finish: FinishReason,
    pub tokens: Tokens,
    pub error: Option<AssistantError>,
}

struct OpenText {
    part_id: String,
    text: String,
    started_at: i64,
}

struct OpenReasoning {
    part_id: String,
    text: String,
    started_at: i64,
}

struct OpenTool {
    part_id: String,
    tool_name: String,
    state: ToolPartState,
}

fn map_finish_reason(reason: ModelFinishReason) -> FinishReason {
    match reason {
        ModelFinishReason::Stop => FinishReason::Stop,
        ModelFinishReason::Length => FinishReason::Length,
        ModelFinishReason::ToolCalls => FinishReason::ToolCalls,
        ModelFinishReason::ContentFilter => FinishReason::ContentFilter,
        ModelFinishReason::Error => FinishReason::Error,
        ModelFinishReason::Other => FinishReason::Unknown,
    }
}

fn classify_error(cause: &ModelErrorCause) -> AssistantError {
    if looks_like_context_overflow(&cause.message) {
        return AssistantError::ContextOverflow { message: cause.message.clone() };
    }
    if matches!(cause.status, Some(401) | Some(403)) {
        return AssistantError::ProviderAuth { message: cause.message.clone() };
    }
    match cause.status {
        Some(status) => AssistantError::Api { status: Some(status), retryable: cause.retryable.unwrap_or(false), body: Some(cause.message.clone()) },
        None => AssistantError::Unknown { message: cause.message.clone() },
    }
}

/// Case-insensitive repair of a tool name against the registry, per the
/// tolerance for providers that mangle tool-name casing.
fn resolve_tool(tools: &ToolRegistry, name: &str) -> Option<Arc<dyn Tool>> {
    if let Some(tool) = tools.get(name) {
        return Some(tool);
    }
    let lower = name.to_lowercase();
    tools.ids().into_iter().find(|id| id.to_lowercase() == lower).and_then(|id| tools.get(&id))
}

#[allow(clippy::too_many_arguments)]
pub async fn run_step(
    store: &Store,
    tools: &ToolRegistry,
    make_host: &(dyn Fn(&str) -> Arc<dyn ToolHost> + Send + Sync),
    session_id: &str,
    message_id: &str,
    agent: &str,
    mut stream: agentcore_model::ModelEventStream,
    mut abort: AbortSignal,
) -> StepOutcome {
    let mut open_text: Option<OpenText> = None;
    let mut open_reasoning: Option<OpenReasoning> = None;
    let mut open_tools: HashMap<String, OpenTool> = HashMap::new();

    let mut tokens = Tokens::default();
    let mut finish = FinishReason::Stop;
    let mut error = None;

    loop {
        let event = tokio::select! {
            biased;
            _ = abort.aborted() => {
                finish = FinishReason::Abort;
                break;
            }
            next = stream.next() => next,
        };

        let event = match event {
            Some(Ok(event)) => event,
            Some(Err(err)) => {
                error = Some(AssistantError::Unknown { message: err.to_string() });
                finish = FinishReason::Error;
                break;
            }
            None => break,
        };

        match event {
            ModelEvent::TextStart => {
                let part_id = agentcore_ids::generate(agentcore_ids::prefix::PART);
                let started_at = now_millis();
                open_text = Some(OpenText { part_id, text: String::new(), started_at });
            }
            ModelEvent::TextDelta { delta } => {
                if let Some(open) = open_text.as_mut() {
                    open.text.push_str(&delta);
                    let part = Part::Text {
                        id: open.part_id.clone(),
                        message_id: message_id.to_string(),
                        session_id: session_id.to_string(),
                        text: open.text.clone(),
                        synthetic: false,
                        ignored: false,
                        time: Some(agentcore_tools::TimeRange { start: open.started_at, end: None }),
                        metadata: None,
                    };
                    let _ = store.write_part(&part, Some(delta));
                }
            }
            ModelEvent::TextEnd { text, metadata } => {
                if let Some(open) = open_text.take() {
                    let part = Part::Text {
                        id: open.part_id,
                        message_id: message_id.to_string(),
                        session_id: session_id.to_string(),
                        text,
                        synthetic: false,
                        ignored: false,
                        time: Some(agentcore_tools::TimeRange { start: open.started_at, end: Some(now_millis()) }),
                        metadata,
                    };
                    let _ = store.write_part(&part, None);
                }
            }
            ModelEvent::ReasoningStart => {
                let part_id = agentcore_ids::generate(agentcore_ids::prefix::PART);
                let started_at = now_millis();
                open_reasoning = Some(OpenReasoning { part_id, text: String::new(), started_at });
            }
            ModelEvent::ReasoningDelta { delta } => {
                if let Some(open) = open_reasoning.as_mut() {
                    open.text.push_str(&delta);
                    let part = Part::Reasoning {
                        id: open.part_id.clone(),
                        message_id: message_id.to_string(),
                        session_id: session_id.to_string(),
                        text: open.text.clone(),
                        time: agentcore_tools::TimeRange { start: open.started_at, end: None },
                        metadata: None,
                    };
                    let _ = store.write_part(&part, Some(delta));
                }
            }
            ModelEvent::ReasoningEnd { text, metadata } => {
                if let Some(open) = open_reasoning.take() {
                    let part = Part::Reasoning {
                        id: open.part_id,
                        message_id: message_id.to_string(),
                        session_id: session_id.to_string(),
                        text,
                        time: agentcore_tools::TimeRange { start: open.started_at, end: Some(now_millis()) },
                        metadata,
                    };
                    let _ = store.write_part(&part, None);
                }
            }
            ModelEvent::ToolCallStart { tool_call_id, tool_name } => {
                let part_id = agentcore_ids::generate(agentcore_ids::prefix::PART);
                let state = ToolPartState::pending();
                let part = Part::Tool {
                    id: part_id.clone(),
                    message_id: message_id.to_string(),
                    session_id: session_id.to_string(),
                    call_id: tool_call_id.clone(),
                    tool: tool_name.clone(),
                    state: state.clone(),
                    title: None,
                    metadata: None,
                };
                let _ = store.write_part(&part, None);
                open_tools.insert(tool_call_id, OpenTool { part_id, tool_name, state });
            }
            ModelEvent::ToolCallDelta { tool_call_id, args_delta } => {
                if let Some(open) = open_tools.get_mut(&tool_call_id) {
                    if open.state.append_delta(&args_delta).is_ok() {
                        let part = Part::Tool {
                            id: open.part_id.clone(),
                            message_id: message_id.to_string(),
                            session_id: session_id.to_string(),
                            call_id: tool_call_id.clone(),
                            tool: open.tool_name.clone(),
                            state: open.state.clone(),
                            title: None,
                            metadata: None,
                        };
                        let _ = store.write_part(&part, None);
                    }
                }
            }
            ModelEvent::ToolCall { tool_call_id, tool_name, args } => {
                let open = open_tools.remove(&tool_call_id).unwrap_or_else(|| OpenTool {
                    part_id: agentcore_ids::generate(agentcore_ids::prefix::PART),
                    tool_name: tool_name.clone(),
                    state: ToolPartState::pending(),
                });
                let host = make_host(&open.part_id);
                execute_tool(store, tools, host, session_id, message_id, agent, abort.clone(), open, tool_call_id, tool_name, args).await;
            }
            ModelEvent::StepFinish { finish_reason, usage, metadata: _ } => {
                tokens.input += usage.input_tokens;
                tokens.output += usage.output_tokens;
                tokens.reasoning += usage.reasoning_tokens;
                tokens.cache = CacheTokens {
                    read: tokens.cache.read + usage.cache_read_tokens,
                    write: tokens.cache.write + usage.cache_write_tokens,
                };
                finish = map_finish_reason(finish_reason);
            }
            ModelEvent::Error { cause } => {
                if abort.is_aborted() {
                    finish = FinishReason::Abort;
                } else {
                    error = Some(classify_error(&cause));
                    finish = FinishReason::Error;
                }
                break;
            }
        }
    }

    if abort.is_aborted() {
        finish = FinishReason::Abort;
        for (call_id, open) in open_tools.into_iter() {
            let mut state = open.state;
            if state.interrupt(now_millis()).is_ok() {
                let part = Part::Tool {
                    id: open.part_id,
                    message_id: message_id.to_string(),
                    session_id: session_id.to_string(),
                    call_id,
                    tool: open.tool_name,
                    state,
                    title: None,
                    metadata: None,
                };
                let _ = store.write_part(&part, None);
            }
        }
    }

    StepOutcome { finish, tokens, error }
}

#[allow(clippy::too_many_arguments)]
async fn execute_tool(
    store: &Store,
    tools: &ToolRegistry,
    host: Arc<dyn ToolHost>,
    session_id: &str,
    message_id: &str,
    agent: &str,
    abort: AbortSignal,
    open: OpenTool,
    tool_call_id: String,
    tool_name: String,
    args: Value,
) {
    let mut state = open.state;
    let now = now_millis();
    if state.start_running(args.clone(), now).is_err() {
        return;
    }
    let running_part = Part::Tool {
        id: open.part_id.clone(),
        message_id: message_id.to_string(),
        session_id: session_id.to_string(),
        call_id: tool_call_id.clone(),
        tool: tool_name.clone(),
        state: state.clone(),
        title: None,
        metadata: None,
    };
    let _ = store.write_part(&running_part, None);

    // No separate `invalid`-sentinel tool: an unresolved name folds straight
    // into the same error-state part a failed tool call would produce, just
    // carrying this message instead of the tool's own.
    let outcome = match resolve_tool(tools, &tool_name) {
        Some(tool) => {
            let ctx = ToolContext::new(session_id, message_id, tool_call_id.clone(), agent, abort.clone(), host);
            tool.execute(args, &ctx).await
        }
        None => Err(format!("unknown tool: {tool_name}")),
    };

    let done_at = now_millis();
    match outcome {
        Ok(ToolExecuteOutput { title, output, metadata, attachments }) => {
            let _ = state.complete(done_at, title.clone(), output, metadata.clone(), attachments_into(&attachments));
            let part = Part::Tool {
                id: open.part_id,
                message_id: message_id.to_string(),
                session_id: session_id.to_string(),
                call_id: tool_call_id,
                tool: tool_name,
                state,
                title: Some(title),
                metadata: Some(metadata),
            };
            let _ = store.write_part(&part, None);
        }
        Err(message) => {
            let _ = state.fail(done_at, message, None);
            let part = Part::Tool {
                id: open.part_id,
                message_id: message_id.to_string(),
                session_id: session_id.to_string(),
                call_id: tool_call_id,
                tool: tool_name,
                state,
                title: None,
                metadata: None,
            };
            let _ = store.write_part(&part, None);
        }
    }
}

fn attachments_into(attachments: &[Attachment]) -> Vec<Attachment> {
    attachments.to_vec()
}
