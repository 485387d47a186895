//! Model-message materialization: persisted messages+parts → the
//! sequence sent to the adapter.

use serde_json::{json, Value};

use agentcore_tools::ToolPartState;

use crate::message::{Message, ModelRef, Part};

pub struct Turn<'a> {
    pub message: &'a Message,
    pub parts: &'a [Part],
}

/// `current_model` is the model about to be invoked; when it differs from a
/// past assistant message's own model, that message's provider-specific
/// metadata (reasoning blobs, cache keys) is dropped — in practice this
/// means only plain text/reasoning/tool-result content survives.
pub fn materialize(turns: &[Turn<'_>], current_model: &ModelRef) -> Vec<Value> {
    let mut out = Vec::new();
    for turn in turns {
        match turn.message {
            Message::User { .. } => materialize_user(turn, &mut out),
            Message::Assistant { model_id, provider_id, error, .. } => {
                let same_model = *model_id == current_model.model_id && *provider_id == current_model.provider_id;
                if error.is_some() {
                    materialize_errored_assistant(turn, &mut out);
                } else {
                    materialize_assistant(turn, same_model, &mut out);
                }
            }
        }
    }
    out
}

fn materialize_user(turn: &Turn<'_>, out: &mut Vec<Value>) {
    let mut content = Vec::new();
    for part in turn.parts {
        match part {
            Part::Text { text, ignored: false, .. } => content.push(json!({"type": "text", "text": text})),
            Part::File { mime, url, .. } if !mime.starts_with("text/plain") => {
                content.push(json!({"type": "file", "mime": mime, "url": url}))
            }
            _ => {}
        }
    }
    if !content.is_empty() {
        out.push(json!({"role": "user", "content": content}));
    }
}

/// An assistant message with a terminal error is skipped, unless it
/// contains reasoning parts, in which case only the reasoning is included.
fn materialize_errored_assistant(turn: &Turn<'_>, out: &mut Vec<Value>) {
    let reasoning: Vec<Value> = turn
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Reasoning { text, .. } => Some(json!({"type": "reasoning", "text": text})),
            _ => None,
        })
        .collect();
    if !reasoning.is_empty() {
        out.push(json!({"role": "assistant", "content": reasoning}));
    }
}

fn materialize_assistant(turn: &Turn<'_>, same_model: bool, out: &mut Vec<Value>) {
    let mut content = Vec::new();
    let mut tool_results = Vec::new();

    for part in turn.parts {
        match part {
            Part::Text { text, ignored: false, .. } => content.push(json!({"type": "text", "text": text})),
            Part::Reasoning { text, .. } if same_model => content.push(json!({"type": "reasoning", "text": text})),
            Part::File { mime, url, .. } => content.push(json!({"type": "file", "mime": mime, "url": url})),
            Part::Tool { call_id, tool, state, .. } => {
                content.push(json!({"type": "tool-call", "id": call_id, "name": tool, "args": tool_input(state)}));
                tool_results.push(json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": [{"type": "text", "text": tool_result_text(state)}],
                }));
            }
            _ => {}
        }
    }

    if content.is_empty() && tool_results.is_empty() {
        return;
    }
    if !content.is_empty() {
        out.push(json!({"role": "assistant", "content": content}));
    }
    out.extend(tool_results);
}

fn tool_input(state: &ToolPartState) -> Value {
    match state {
        ToolPartState::Pending { input } => serde_json::from_str(input).unwrap_or(Value::String(input.clone())),
        ToolPartState::Running { input, .. }
        | ToolPartState::Completed { input, .. }
        | ToolPartState::Error { input, .. } => input.clone(),
    }
}

/// A tool in `pending`/`running` at history-replay time becomes a
/// tool-result carrying this sentinel, so the model sees a well-formed
/// trajectory.
fn tool_result_text(state: &ToolPartState) -> String {
    match state {
        ToolPartState::Pending { .. } | ToolPartState::Running { .. } => "[Tool execution was interrupted]".into(),
        ToolPartState::Completed { output, .. } => output.clone(),
        ToolPartState::Error { error, .. } => error.clone(),
    }
}
