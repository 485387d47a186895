//! End-to-end scenarios over the real `Runtime`/`run_turn` stack: a session
//! is created, a user message is persisted, the turn engine runs a scripted
//! provider through to completion, and the resulting messages/parts are
//! asserted against storage. No HTTP layer involved — these exercise the
//! engine directly, the same path `agentcore-http`'s handlers drive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use serde_json::{json, Value};

use agentcore_engine::{Agent, AgentCatalog, EngineToolHost, HostFactory, Message, ModelRef, Part, Runtime};
use agentcore_model::{
    FinishReason as ModelFinishReason, ModelEvent, ModelEventStream, ModelProvider, ModelRequest, ScriptedMockProvider,
    Usage,
};
use agentcore_permission::{Action, AskRequest, PermissionError, Reply, Rule};
use agentcore_storage::Storage;
use agentcore_tools::{Tool, ToolContext, ToolExecuteOutput, ToolHost, ToolPartState, ToolRegistry};

fn host_factory() -> HostFactory {
    Arc::new(|runtime, session_id, message_id, part_id, model| {
        Arc::new(EngineToolHost::new(runtime, session_id, message_id, part_id, model)) as Arc<dyn ToolHost>
    })
}

fn agent_with(name: &str, model: ModelRef, permission: Vec<Rule>, steps: Option<u32>) -> Agent {
    Agent { name: name.to_string(), prompt: None, permission, steps, default_model: model, question_rejection_cascades: true }
}

/// A tool that runs immediately with no permission check.
struct BashTool;

#[async_trait]
impl Tool for BashTool {
    fn id(&self) -> &str {
        "bash"
    }
    fn description(&self) -> &str {
        "runs a shell command"
    }
    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {"command": {"type": "string"}}})
    }
    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolExecuteOutput, String> {
        Ok(ToolExecuteOutput::text("bash", format!("ran: {}", args["command"].as_str().unwrap_or(""))))
    }
}

/// A tool that asks the permission arbiter before running, under a fixed
/// ruleset (standing in for the agent-level ruleset a real tool would read
/// from its own config).
struct GuardedTool {
    ruleset: Vec<Rule>,
}

#[async_trait]
impl Tool for GuardedTool {
    fn id(&self) -> &str {
        "read_env"
    }
    fn description(&self) -> &str {
        "reads an environment file"
    }
    fn parameter_schema(&self) -> Value {
        json!({"type": "object", "properties": {"path": {"type": "string"}}})
    }
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolExecuteOutput, String> {
        let path = args["path"].as_str().unwrap_or(".env").to_string();
        ctx.ask(AskRequest {
            session_id: ctx.session_id.clone(),
            permission: "read_env".to_string(),
            patterns: vec![path.clone()],
            always: vec![path.clone()],
            metadata: json!({}),
            tool: Some("read_env".to_string()),
            ruleset: self.ruleset.clone(),
        })
        .await
        .map_err(|err| err.to_string())?;
        Ok(ToolExecuteOutput::text("read_env", format!("contents of {path}")))
    }
}

/// A provider whose stream never resolves, so a turn can be cancelled
/// mid-flight deterministically instead of racing real timing.
struct HangingProvider;

#[async_trait]
impl ModelProvider for HangingProvider {
    fn name(&self) -> &str {
        "hang"
    }
    fn model_name(&self) -> &str {
        "hang-model"
    }
    async fn complete(&self, _req: ModelRequest) -> anyhow::Result<ModelEventStream> {
        Ok(Box::pin(stream::pending()))
    }
}

fn runtime_with(
    tools: ToolRegistry,
    providers: Vec<Arc<dyn ModelProvider>>,
    agents: AgentCatalog,
) -> (tempfile::TempDir, Arc<Runtime>) {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Runtime::new(Storage::new(dir.path()), tools, providers, agents, 0);
    (dir, runtime)
}

fn user_text_message(runtime: &Runtime, session_id: &str, agent: &str, model: ModelRef, text: &str) -> Message {
    let message = Message::User {
        id: agentcore_ids::generate(agentcore_ids::prefix::MESSAGE),
        session_id: session_id.to_string(),
        time: agentcore_engine::UserTime { created: 0 },
        agent: agent.to_string(),
        model,
        system: None,
        tools: None,
        variant: None,
    };
    runtime.store.write_message(&message).unwrap();
    let part = Part::Text {
        id: agentcore_ids::generate(agentcore_ids::prefix::PART),
        message_id: message.id().to_string(),
        session_id: session_id.to_string(),
        text: text.to_string(),
        synthetic: false,
        ignored: false,
        time: None,
        metadata: None,
    };
    runtime.store.write_part(&part, None).unwrap();
    message
}

// ── S1: echo turn ───────────────────────────────────────────────────────

#[tokio::test]
async fn s1_echo_turn_persists_user_and_assistant_messages() {
    let model = ModelRef { provider_id: "mock".into(), model_id: "mock-model".into() };
    let mut agents = AgentCatalog::new();
    agents.register(agent_with("default", model.clone(), vec![], None));
    let (_dir, runtime) =
        runtime_with(ToolRegistry::new(), vec![Arc::new(agentcore_model::MockProvider)], agents);

    let session = runtime.store.create_session("s1".into(), None, None);
    user_text_message(&runtime, &session.id, "default", model, "hi");

    let assistant = agentcore_engine::run_turn(runtime.clone(), session.id.clone(), host_factory()).await.unwrap();
    assert!(matches!(assistant, Message::Assistant { finish: Some(agentcore_engine::FinishReason::Stop), .. }));

    let messages = runtime.store.messages(&session.id).unwrap();
    assert_eq!(messages.len(), 2);
    assert!(matches!(messages[0], Message::User { .. }));
    let parts = runtime.store.parts(assistant.id()).unwrap();
    assert!(parts.iter().any(|p| matches!(p, Part::Text { text, .. } if text.contains("hi"))));
}

// ── S2: tool call then text reply ───────────────────────────────────────

#[tokio::test]
async fn s2_tool_call_then_text_runs_two_steps() {
    let model = ModelRef { provider_id: "scripted-mock".into(), model_id: "scripted-mock-model".into() };
    let mut agents = AgentCatalog::new();
    agents.register(agent_with("default", model.clone(), vec![], None));

    let provider = ScriptedMockProvider::tool_then_text("call-1", "bash", json!({"command": "ls"}), "done");
    let mut tools = ToolRegistry::new();
    tools.register(BashTool);
    let (_dir, runtime) = runtime_with(tools, vec![Arc::new(provider)], agents);

    let session = runtime.store.create_session("s2".into(), None, None);
    user_text_message(&runtime, &session.id, "default", model, "run ls");

    let last = agentcore_engine::run_turn(runtime.clone(), session.id.clone(), host_factory()).await.unwrap();
    assert!(matches!(last, Message::Assistant { finish: Some(agentcore_engine::FinishReason::Stop), .. }));

    let messages = runtime.store.messages(&session.id).unwrap();
    let assistants: Vec<&Message> = messages.iter().filter(|m| matches!(m, Message::Assistant { .. })).collect();
    assert_eq!(assistants.len(), 2, "tool-call step and text step each produce their own assistant message");

    let mut saw_completed_tool = false;
    let mut saw_done_text = false;
    for assistant in &assistants {
        for part in runtime.store.parts(assistant.id()).unwrap() {
            match part {
                Part::Tool { state: ToolPartState::Completed { output, .. }, .. } => {
                    assert!(output.contains("ls"));
                    saw_completed_tool = true;
                }
                Part::Text { text, .. } if text == "done" => saw_done_text = true,
                _ => {}
            }
        }
    }
    assert!(saw_completed_tool, "expected a completed bash tool part");
    assert!(saw_done_text, "expected the final text part \"done\"");
}

// ── S3: permission ask, once reply unblocks the tool ────────────────────

#[tokio::test]
async fn s3_permission_ask_unblocks_on_reply() {
    let model = ModelRef { provider_id: "scripted-mock".into(), model_id: "scripted-mock-model".into() };
    let mut agents = AgentCatalog::new();
    agents.register(agent_with("default", model.clone(), vec![], None));

    let provider =
        ScriptedMockProvider::tool_then_text("call-1", "read_env", json!({"path": ".env"}), "done");
    let mut tools = ToolRegistry::new();
    tools.register(GuardedTool { ruleset: vec![] }); // empty ruleset => Ask
    let (_dir, runtime) = runtime_with(tools, vec![Arc::new(provider)], agents);

    let session = runtime.store.create_session("s3".into(), None, None);
    user_text_message(&runtime, &session.id, "default", model, "read my env file");

    let runtime_for_turn = runtime.clone();
    let session_id = session.id.clone();
    let handle = tokio::spawn(async move { agentcore_engine::run_turn(runtime_for_turn, session_id, host_factory()).await });

    let permission_id = wait_for_pending_permission(&runtime).await;
    runtime.arbiter.reply(&permission_id, Reply::Once).unwrap();

    let last = handle.await.unwrap().unwrap();
    assert!(matches!(last, Message::Assistant { finish: Some(agentcore_engine::FinishReason::Stop), .. }));

    let messages = runtime.store.messages(&session.id).unwrap();
    let completed = messages
        .iter()
        .filter(|m| matches!(m, Message::Assistant { .. }))
        .flat_map(|m| runtime.store.parts(m.id()).unwrap())
        .any(|p| matches!(p, Part::Tool { state: ToolPartState::Completed { .. }, .. }));
    assert!(completed, "tool should complete once the permission is replied to");
}

async fn wait_for_pending_permission(runtime: &Runtime) -> String {
    for _ in 0..200 {
        let pending = runtime.arbiter.list();
        if let Some(first) = pending.into_iter().next() {
            return first.id;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no pending permission appeared in time");
}

// ── S4: permission deny ─────────────────────────────────────────────────

#[tokio::test]
async fn s4_permission_deny_fails_the_tool_directly() {
    let model = ModelRef { provider_id: "scripted-mock".into(), model_id: "scripted-mock-model".into() };
    let mut agents = AgentCatalog::new();
    agents.register(agent_with("default", model.clone(), vec![], None));

    let provider =
        ScriptedMockProvider::tool_then_text("call-1", "read_env", json!({"path": ".env"}), "done");
    let mut tools = ToolRegistry::new();
    tools.register(GuardedTool { ruleset: vec![Rule::new("read_env", "*", Action::Deny)] });
    let (_dir, runtime) = runtime_with(tools, vec![Arc::new(provider)], agents);

    let session = runtime.store.create_session("s4".into(), None, None);
    user_text_message(&runtime, &session.id, "default", model, "read my env file");

    let _last = agentcore_engine::run_turn(runtime.clone(), session.id.clone(), host_factory()).await.unwrap();

    assert!(runtime.arbiter.list().is_empty(), "a denied ask never creates a pending request");

    let messages = runtime.store.messages(&session.id).unwrap();
    let errored_tool = messages
        .iter()
        .filter(|m| matches!(m, Message::Assistant { .. }))
        .flat_map(|m| runtime.store.parts(m.id()).unwrap())
        .find_map(|p| match p {
            Part::Tool { state: ToolPartState::Error { error, .. }, .. } => Some(error),
            _ => None,
        });
    let error = errored_tool.expect("tool part should transition directly to error");
    assert!(error.contains("read_env"), "error message should mention the matched rule: {error}");
}

// ── S5: max steps ────────────────────────────────────────────────────────

/// Emits the same tool-call step forever, never stopping on its own — the
/// engine's step budget must force termination.
struct AlwaysToolCallsProvider;

#[async_trait]
impl ModelProvider for AlwaysToolCallsProvider {
    fn name(&self) -> &str {
        "always-tools"
    }
    fn model_name(&self) -> &str {
        "always-tools-model"
    }
    async fn complete(&self, _req: ModelRequest) -> anyhow::Result<ModelEventStream> {
        let events: Vec<anyhow::Result<ModelEvent>> = vec![
            Ok(ModelEvent::ToolCallStart { tool_call_id: "c".into(), tool_name: "bash".into() }),
            Ok(ModelEvent::ToolCall { tool_call_id: "c".into(), tool_name: "bash".into(), args: json!({"command": "ls"}) }),
            Ok(ModelEvent::StepFinish {
                finish_reason: ModelFinishReason::ToolCalls,
                usage: Usage::default(),
                metadata: None,
            }),
        ];
        Ok(Box::pin(stream::iter(events)))
    }
}

#[tokio::test]
async fn s5_max_steps_forces_termination() {
    let model = ModelRef { provider_id: "always-tools".into(), model_id: "always-tools-model".into() };
    let mut agents = AgentCatalog::new();
    agents.register(agent_with("default", model.clone(), vec![], Some(2)));

    let mut tools = ToolRegistry::new();
    tools.register(BashTool);
    let (_dir, runtime) = runtime_with(tools, vec![Arc::new(AlwaysToolCallsProvider)], agents);

    let session = runtime.store.create_session("s5".into(), None, None);
    user_text_message(&runtime, &session.id, "default", model, "loop forever");

    let last = agentcore_engine::run_turn(runtime.clone(), session.id.clone(), host_factory()).await.unwrap();

    let messages = runtime.store.messages(&session.id).unwrap();
    let assistants: Vec<&Message> = messages.iter().filter(|m| matches!(m, Message::Assistant { .. })).collect();
    assert_eq!(assistants.len(), 2, "exactly 2 assistant messages for a 2-step budget");

    match last {
        Message::Assistant { finish: Some(f), .. } => {
            assert!(
                matches!(f, agentcore_engine::FinishReason::Stop | agentcore_engine::FinishReason::Length),
                "final finish should be stop or length, got {f:?}"
            );
        }
        other => panic!("expected a finished assistant message, got {other:?}"),
    }
}

// ── S6: abort mid-turn ──────────────────────────────────────────────────

#[tokio::test]
async fn s6_abort_mid_turn_marks_finish_abort_and_leaves_no_pending_requests() {
    let model = ModelRef { provider_id: "hang".into(), model_id: "hang-model".into() };
    let mut agents = AgentCatalog::new();
    agents.register(agent_with("default", model.clone(), vec![], None));
    let (_dir, runtime) = runtime_with(ToolRegistry::new(), vec![Arc::new(HangingProvider)], agents);

    let session = runtime.store.create_session("s6".into(), None, None);
    user_text_message(&runtime, &session.id, "default", model, "hang please");

    let runtime_for_turn = runtime.clone();
    let session_id = session.id.clone();
    let handle = tokio::spawn(async move { agentcore_engine::run_turn(runtime_for_turn, session_id, host_factory()).await });

    // Give the loop a moment to acquire the session and start the hanging call.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(runtime.abort_session(&session.id).await);

    let last = handle.await.unwrap().unwrap();
    assert!(matches!(last, Message::Assistant { finish: Some(agentcore_engine::FinishReason::Abort), .. }));
    assert!(runtime.arbiter.list().is_empty());
    assert!(runtime.arbiter.list_questions().is_empty());
}
