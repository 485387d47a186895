//! The turn engine: the per-session agent loop. Reads the
//! session's messages, resolves the provider/agent/tools for the next
//! step, materializes model messages, and hands the adapter's event
//! stream to the stream processor — repeating while the step result
//! calls for another step.

use std::sync::Arc;

use agentcore_permission::{evaluate, Action};
use agentcore_tools::ToolHost;

use crate::agent::Agent;
use crate::error::EngineError;
use crate::materialize::{materialize, Turn as MaterializeTurn};
use crate::message::{AssistantError, AssistantPath, AssistantTime, FinishReason, Message, ModelRef, Tokens, ToolsOverlay};
use crate::prompt::system_prompt;
use crate::runtime::{LoopAcquisition, Runtime};
use crate::stream::run_step;
use crate::time::now_millis;

const SYNTHETIC_MAX_STEPS_NOTICE: &str = "Max steps reached. Provide final response now.";

/// Constructs the `ToolHost` a single tool call sees: `(runtime, session_id,
/// message_id, part_id, model)`. A fresh host is built per tool call, since
/// `ToolHost::patch_metadata` addresses the part implicitly.
pub type HostFactory = Arc<dyn Fn(Arc<Runtime>, String, String, String, ModelRef) -> Arc<dyn ToolHost> + Send + Sync>;

/// Run the per-session agent loop to completion, returning the final
/// assistant message. If a loop is already running for this session, this
/// call instead waits for that loop's result.
pub async fn run_turn(
    runtime: Arc<Runtime>,
    session_id: String,
    host_factory: HostFactory,
) -> Result<Message, EngineError> {
    match runtime.acquire_loop(&session_id).await {
        LoopAcquisition::AlreadyRunning(mut done) => done
            .recv()
            .await
            .map_err(|_| EngineError::Unknown("session loop ended without a result".to_string()))?
            .map_err(EngineError::Unknown),
        LoopAcquisition::Owned(_) => {
            let result = run_loop(&runtime, &session_id, &host_factory).await;
            let broadcast_result = match &result {
                Ok(message) => Ok(message.clone()),
                Err(err) => Err(err.to_string()),
            };
            runtime.release_loop(&session_id, broadcast_result).await;
            result
        }
    }
}

async fn run_loop(runtime: &Arc<Runtime>, session_id: &str, host_factory: &HostFactory) -> Result<Message, EngineError> {
    let mut step = 0u32;

    loop {
        let messages = runtime.store.messages(session_id)?;

        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m, Message::User { .. }))
            .ok_or(EngineError::NoUserMessage)?
            .clone();
        let last_assistant = messages.iter().rev().find(|m| matches!(m, Message::Assistant { .. })).cloned();

        let (user_id, user_agent, user_model, user_system, user_tools) = match &last_user {
            Message::User { id, agent, model, system, tools, .. } => {
                (id.clone(), agent.clone(), model.clone(), system.clone(), tools.clone())
            }
            _ => unreachable!("last_user is always a User variant"),
        };

        // Termination check.
        if let Some(Message::Assistant { id: assistant_id, finish: Some(finish), .. }) = &last_assistant {
            if !finish.continues_loop() && user_id < *assistant_id {
                return Ok(last_assistant.clone().expect("matched Some above"));
            }
        }

        let provider = match runtime.resolve_provider(&user_model) {
            Ok(provider) => provider,
            Err(err @ EngineError::ModelNotFound { .. }) => {
                runtime.store.publish_session_error(session_id, err.to_string());
                let errored = finalize_model_not_found(runtime, session_id, &user_id, &user_agent, &user_model, err.to_string())?;
                return Ok(errored);
            }
            Err(other) => return Err(other),
        };

        let agent = runtime
            .agents
            .get(&user_agent)
            .cloned()
            .unwrap_or_else(|| default_agent(&user_agent, user_model.clone()));
        let max_steps = agent.steps;
        let is_last_step = max_steps.map(|max| step + 1 >= max).unwrap_or(false);

        let assistant_id = agentcore_ids::generate(agentcore_ids::prefix::MESSAGE);
        let mut assistant = Message::Assistant {
            id: assistant_id.clone(),
            session_id: session_id.to_string(),
            time: AssistantTime { created: now_millis(), completed: None },
            parent_id: user_id.clone(),
            model_id: user_model.model_id.clone(),
            provider_id: user_model.provider_id.clone(),
            mode: None,
            agent: user_agent.clone(),
            path: AssistantPath { cwd: ".".to_string(), root: ".".to_string() },
            cost: 0.0,
            tokens: Tokens::default(),
            finish: None,
            error: None,
            summary: None,
            variant: None,
        };
        runtime.store.write_message(&assistant)?;

        let tool_schemas = resolve_tools(runtime, &agent, &user_tools, &user_model);

        let prompt = system_prompt(agent.prompt.as_deref(), &assistant_cwd(&assistant), user_system.as_deref());

        let mut model_messages = materialize_history(runtime, &messages, &user_model)?;
        if is_last_step {
            model_messages.push(serde_json::json!({"role": "assistant", "content": SYNTHETIC_MAX_STEPS_NOTICE}));
        }

        let abort_signal = runtime
            .abort_signal(session_id)
            .await
            .ok_or_else(|| EngineError::Unknown("session loop state missing its own abort signal".to_string()))?;

        let request = agentcore_model::ModelRequest {
            system_prompt: prompt,
            messages: model_messages,
            tools: tool_schemas,
            options: agentcore_model::RequestOptions::default(),
            abort: abort_signal.clone(),
        };

        let stream = match provider.complete(request).await {
            Ok(stream) => stream,
            Err(err) => {
                finalize_error(runtime, &mut assistant, AssistantError::Unknown { message: err.to_string() }, FinishReason::Error)?;
                return Ok(assistant);
            }
        };

        let make_host = {
            let runtime = runtime.clone();
            let session_id = session_id.to_string();
            let assistant_id = assistant_id.clone();
            let model = user_model.clone();
            let host_factory = host_factory.clone();
            move |part_id: &str| -> Arc<dyn ToolHost> {
                host_factory(runtime.clone(), session_id.clone(), assistant_id.clone(), part_id.to_string(), model.clone())
            }
        };
        let outcome = run_step(&runtime.store, &runtime.tools, &make_host, session_id, &assistant_id, &agent.name, stream, abort_signal).await;

        // Step budget is a hard cap: even a model that ignores the synthetic
        // max-steps notice and keeps calling tools must terminate once the
        // agent's step budget is exhausted.
        let effective_finish =
            if is_last_step && outcome.finish.continues_loop() { FinishReason::Length } else { outcome.finish };

        if let Message::Assistant { tokens, cost, finish, error, time, .. } = &mut assistant {
            tokens.input += outcome.tokens.input;
            tokens.output += outcome.tokens.output;
            tokens.reasoning += outcome.tokens.reasoning;
            tokens.cache.read += outcome.tokens.cache.read;
            tokens.cache.write += outcome.tokens.cache.write;
            *cost += provider.catalog_entry().map(|entry| usage_from_tokens(&outcome.tokens).cost(&entry.rates)).unwrap_or(0.0);
            *finish = Some(effective_finish);
            *error = outcome.error.clone();
            time.completed = Some(now_millis());
        }
        runtime.store.write_message(&assistant)?;

        if effective_finish.continues_loop() {
            step += 1;
            continue;
        }
        return Ok(assistant);
    }
}

fn usage_from_tokens(tokens: &Tokens) -> agentcore_model::Usage {
    agentcore_model::Usage {
        input_tokens: tokens.input,
        output_tokens: tokens.output,
        reasoning_tokens: tokens.reasoning,
        cache_read_tokens: tokens.cache.read,
        cache_write_tokens: tokens.cache.write,
    }
}

fn assistant_cwd(message: &Message) -> String {
    match message {
        Message::Assistant { path, .. } => path.cwd.clone(),
        _ => ".".to_string(),
    }
}

fn default_agent(name: &str, default_model: ModelRef) -> Agent {
    Agent {
        name: name.to_string(),
        prompt: None,
        permission: Vec::new(),
        steps: None,
        default_model,
        question_rejection_cascades: true,
    }
}

/// Start from the registry's model-scoped tool set, remove
/// tools the agent or the user's per-turn overlay deny, remove tools whose
/// permission rule evaluates to `deny` on pattern `*`.
fn resolve_tools(
    runtime: &Runtime,
    agent: &Agent,
    overlay: &Option<ToolsOverlay>,
    model: &ModelRef,
) -> Vec<agentcore_tools::ToolSchema> {
    let mut schemas = runtime.tools.schemas_for_model(&model.provider_id, &model.model_id);

    if let Some(overlay) = overlay {
        if let Some(allow) = &overlay.allow {
            schemas.retain(|s| allow.contains(&s.id));
        }
        if let Some(deny) = &overlay.deny {
            schemas.retain(|s| !deny.contains(&s.id));
        }
    }

    schemas.retain(|schema| evaluate(&agent.permission, &schema.id, "*").0 != Action::Deny);
    schemas
}

fn materialize_history(
    runtime: &Runtime,
    messages: &[Message],
    current_model: &ModelRef,
) -> Result<Vec<serde_json::Value>, EngineError> {
    let mut with_parts = Vec::with_capacity(messages.len());
    for message in messages {
        let parts = runtime.store.parts(message.id())?;
        with_parts.push((message.clone(), parts));
    }
    let turns: Vec<MaterializeTurn<'_>> =
        with_parts.iter().map(|(message, parts)| MaterializeTurn { message, parts }).collect();
    Ok(materialize(&turns, current_model))
}

fn finalize_model_not_found(
    runtime: &Runtime,
    session_id: &str,
    user_id: &str,
    agent: &str,
    model: &ModelRef,
    message: String,
) -> Result<Message, EngineError> {
    let assistant = Message::Assistant {
        id: agentcore_ids::generate(agentcore_ids::prefix::MESSAGE),
        session_id: session_id.to_string(),
        time: AssistantTime { created: now_millis(), completed: Some(now_millis()) },
        parent_id: user_id.to_string(),
        model_id: model.model_id.clone(),
        provider_id: model.provider_id.clone(),
        mode: None,
        agent: agent.to_string(),
        path: AssistantPath { cwd: ".".to_string(), root: ".".to_string() },
        cost: 0.0,
        tokens: Tokens::default(),
        finish: Some(FinishReason::Error),
        error: Some(AssistantError::Unknown { message }),
        summary: None,
        variant: None,
    };
    runtime.store.write_message(&assistant)?;
    Ok(assistant)
}

fn finalize_error(
    runtime: &Runtime,
    assistant: &mut Message,
    error: AssistantError,
    finish: FinishReason,
) -> Result<(), EngineError> {
    if let Message::Assistant { finish: f, error: e, time, .. } = assistant {
        *f = Some(finish);
        *e = Some(error);
        time.completed = Some(now_millis());
    }
    runtime.store.write_message(assistant)
}
