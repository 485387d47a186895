//! Deterministic providers for tests: no network, fully scripted event
//! sequences.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

use crate::catalog::{FinishReason, Usage};
use crate::event::ModelEvent;
use crate::provider::{ModelEventStream, ModelProvider, ModelRequest};

/// Echoes the last user message back as a single text reply, then a
/// `stop` step-finish. Always named `mock`/`mock-model`, matching the
/// bundled catalog entry.
#[derive(Default)]
pub struct MockProvider;

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, req: ModelRequest) -> anyhow::Result<ModelEventStream> {
        let reply = req
            .messages
            .iter()
            .rev()
            .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
            .and_then(|m| m.get("text").and_then(Value::as_str))
            .unwrap_or("[no input]")
            .to_string();

        let events: Vec<anyhow::Result<ModelEvent>> = vec![
            Ok(ModelEvent::TextStart),
            Ok(ModelEvent::TextDelta { delta: format!("MOCK: {reply}") }),
            Ok(ModelEvent::TextEnd { text: format!("MOCK: {reply}"), metadata: None }),
            Ok(ModelEvent::StepFinish {
                finish_reason: FinishReason::Stop,
                usage: Usage { input_tokens: 10, output_tokens: 10, ..Default::default() },
                metadata: None,
            }),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

/// A pre-scripted provider. Each call to `complete` pops the next script
/// from the front of the queue, so tests can specify exact event sequences
/// — including tool calls across multiple steps — without network access.
pub struct ScriptedMockProvider {
    scripts: Arc<Mutex<Vec<Vec<ModelEvent>>>>,
    name: String,
    pub last_request: Arc<Mutex<Option<ModelRequest>>>,
}

impl ScriptedMockProvider {
    pub fn new(scripts: Vec<Vec<ModelEvent>>) -> Self {
        ScriptedMockProvider {
            scripts: Arc::new(Mutex::new(scripts)),
            name: "scripted-mock".into(),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// A provider that always replies with one text block, then stops.
    pub fn always_text(reply: impl Into<String>) -> Self {
        let text = reply.into();
        Self::new(vec![vec![
            ModelEvent::TextStart,
            ModelEvent::TextDelta { delta: text.clone() },
            ModelEvent::TextEnd { text: text.clone(), metadata: None },
            ModelEvent::StepFinish {
                finish_reason: FinishReason::Stop,
                usage: Usage { input_tokens: 5, output_tokens: 5, ..Default::default() },
                metadata: None,
            },
        ]])
    }

    /// A provider that emits one tool call, then (on the next `complete`
    /// call) a final text reply.
    pub fn tool_then_text(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
        final_text: impl Into<String>,
    ) -> Self {
        let tool_name = tool_name.into();
        let call_id = call_id.into();
        let final_text = final_text.into();
        Self::new(vec![
            vec![
                ModelEvent::ToolCallStart { tool_call_id: call_id.clone(), tool_name: tool_name.clone() },
                ModelEvent::ToolCallDelta { tool_call_id: call_id.clone(), args_delta: args.to_string() },
                ModelEvent::ToolCall { tool_call_id: call_id, tool_name, args },
                ModelEvent::StepFinish {
                    finish_reason: FinishReason::ToolCalls,
                    usage: Usage { input_tokens: 8, output_tokens: 2, ..Default::default() },
                    metadata: None,
                },
            ],
            vec![
                ModelEvent::TextStart,
                ModelEvent::TextDelta { delta: final_text.clone() },
                ModelEvent::TextEnd { text: final_text, metadata: None },
                ModelEvent::StepFinish {
                    finish_reason: FinishReason::Stop,
                    usage: Usage { input_tokens: 12, output_tokens: 4, ..Default::default() },
                    metadata: None,
                },
            ],
        ])
    }
}

#[async_trait]
impl ModelProvider for ScriptedMockProvider {
    fn name(&self) -> &str {
        &self.name
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }

    async fn complete(&self, req: ModelRequest) -> anyhow::Result<ModelEventStream> {
        *self.last_request.lock().unwrap() = Some(req);
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                tracing::debug!(provider = %self.name, "scripted mock exhausted, returning fallback reply");
                vec![
                    ModelEvent::TextStart,
                    ModelEvent::TextDelta { delta: "[no more scripts]".into() },
                    ModelEvent::TextEnd { text: "[no more scripts]".into(), metadata: None },
                    ModelEvent::StepFinish {
                        finish_reason: FinishReason::Stop,
                        usage: Usage::default(),
                        metadata: None,
                    },
                ]
            } else {
                scripts.remove(0)
            }
        };
        let wrapped: Vec<anyhow::Result<ModelEvent>> = events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }
}

#[cfg(test)]
fn user_message(text: &str) -> Value {
    json!({ "role": "user", "text": text })
}
