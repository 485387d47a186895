//! Route handlers: sessions, messages/parts, permissions, questions.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use agentcore_engine::{run_turn, Message, ModelRef, Part, Session, ToolsOverlay};
use agentcore_permission::{Reply, Ruleset};

use crate::error::HttpError;
use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn path(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "data": state.paths.data,
        "config": state.paths.config,
        "storage": state.paths.storage,
        "directory": state.paths.directory,
        "worktree": state.paths.worktree,
    }))
}

pub async fn agents(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.runtime.agents.list()))
}

// ── Sessions ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListSessionsQuery {
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub roots: Option<bool>,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<Vec<Session>>, HttpError> {
    let mut sessions = state.runtime.store.list_sessions()?;
    sessions.sort_by(|a, b| b.id.cmp(&a.id));
    if let Some(true) = query.roots {
        sessions.retain(|s| s.parent_id.is_none());
    }
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        sessions.retain(|s| s.title.to_lowercase().contains(&needle));
    }
    if let Some(limit) = query.limit {
        sessions.truncate(limit);
    }
    Ok(Json(sessions))
}

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "parentID")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub permission: Option<Ruleset>,
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Json<Session> {
    let session = state.runtime.store.create_session(body.title.unwrap_or_default(), body.parent_id, body.permission);
    Json(session)
}

pub async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Session>, HttpError> {
    Ok(Json(state.runtime.store.get_session(&id)?))
}

#[derive(Debug, Deserialize)]
pub struct PatchSessionBody {
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn patch_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchSessionBody>,
) -> Result<Json<Session>, HttpError> {
    let updated = state.runtime.store.update_session(&id, |mut session| {
        if let Some(title) = body.title {
            session.title = title;
        }
        session
    })?;
    Ok(Json(updated))
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<bool>, HttpError> {
    state.runtime.store.delete_session(&id)?;
    Ok(Json(true))
}

pub async fn session_children(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Session>>, HttpError> {
    Ok(Json(state.runtime.store.children(&id)?))
}

pub async fn abort_session(State(state): State<AppState>, Path(id): Path<String>) -> Json<bool> {
    Json(state.runtime.abort_session(&id).await)
}

// ── Messages & parts ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MessageWithParts {
    pub info: Message,
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<usize>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<MessageWithParts>>, HttpError> {
    let mut messages = state.runtime.store.messages(&session_id)?;
    if let Some(limit) = query.limit {
        let start = messages.len().saturating_sub(limit);
        messages = messages.split_off(start);
    }
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        let parts = state.runtime.store.parts(message.id())?;
        out.push(MessageWithParts { info: message, parts });
    }
    Ok(Json(out))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path((session_id, message_id)): Path<(String, String)>,
) -> Result<Json<MessageWithParts>, HttpError> {
    let info = state.runtime.store.get_message(&session_id, &message_id)?;
    let parts = state.runtime.store.parts(&message_id)?;
    Ok(Json(MessageWithParts { info, parts }))
}

pub async fn delete_part(
    State(state): State<AppState>,
    Path((session_id, message_id, part_id)): Path<(String, String, String)>,
) -> Result<Json<bool>, HttpError> {
    state.runtime.store.remove_part(&session_id, &message_id, &part_id)?;
    Ok(Json(true))
}

pub async fn patch_part(
    State(state): State<AppState>,
    Path((_session_id, _message_id, _part_id)): Path<(String, String, String)>,
    Json(part): Json<Part>,
) -> Result<Json<Part>, HttpError> {
    state.runtime.store.write_part(&part, None)?;
    Ok(Json(part))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PromptInputPart {
    Text { text: String },
    File { mime: String, url: String },
}

#[derive(Debug, Deserialize)]
pub struct PromptInput {
    pub parts: Vec<PromptInputPart>,
    #[serde(default)]
    pub model: Option<ModelRef>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub tools: Option<ToolsOverlay>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default, rename = "noReply")]
    pub no_reply: bool,
    #[serde(default, rename = "messageID")]
    pub message_id: Option<String>,
}

fn resolve_model(state: &AppState, agent: &str, requested: Option<ModelRef>) -> Result<ModelRef, HttpError> {
    requested
        .or_else(|| state.runtime.agents.get(agent).map(|a| a.default_model.clone()))
        .ok_or_else(|| HttpError::bad_request("ModelRequiredError", "no model given and agent has no default"))
}

fn persist_user_message(
    state: &AppState,
    session_id: &str,
    input: PromptInput,
) -> Result<Message, HttpError> {
    let agent = input.agent.clone().unwrap_or_else(|| "default".to_string());
    let model = resolve_model(state, &agent, input.model.clone())?;

    let message_id = input.message_id.clone().unwrap_or_else(|| agentcore_ids::generate(agentcore_ids::prefix::MESSAGE));
    let message = Message::User {
        id: message_id.clone(),
        session_id: session_id.to_string(),
        time: agentcore_engine::UserTime { created: now_millis() },
        agent,
        model,
        system: input.system.clone(),
        tools: input.tools.clone(),
        variant: input.variant.clone(),
    };
    state.runtime.store.write_message(&message)?;

    for part_input in input.parts {
        let part = match part_input {
            PromptInputPart::Text { text } => Part::Text {
                id: agentcore_ids::generate(agentcore_ids::prefix::PART),
                message_id: message_id.clone(),
                session_id: session_id.to_string(),
                text,
                synthetic: false,
                ignored: false,
                time: None,
                metadata: None,
            },
            PromptInputPart::File { mime, url } => Part::File {
                id: agentcore_ids::generate(agentcore_ids::prefix::PART),
                message_id: message_id.clone(),
                session_id: session_id.to_string(),
                mime,
                url,
            },
        };
        state.runtime.store.write_part(&part, None)?;
    }

    Ok(message)
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// `POST /session/:id/message`: persists the user turn and blocks until the
/// loop finishes, returning the final assistant message.
pub async fn post_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(input): Json<PromptInput>,
) -> Result<Json<MessageWithParts>, HttpError> {
    let no_reply = input.no_reply;
    persist_user_message(&state, &session_id, input)?;
    if no_reply {
        let last = state.runtime.store.messages(&session_id)?.into_iter().next_back().expect("just persisted");
        let parts = state.runtime.store.parts(last.id())?;
        return Ok(Json(MessageWithParts { info: last, parts }));
    }

    let assistant = run_turn(state.runtime.clone(), session_id.clone(), state.host_factory.clone()).await?;
    let parts = state.runtime.store.parts(assistant.id())?;
    Ok(Json(MessageWithParts { info: assistant, parts }))
}

/// `POST /session/:id/prompt_async`: persists the user turn and kicks off
/// the loop in the background.
pub async fn post_message_async(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(input): Json<PromptInput>,
) -> Result<(StatusCode, Json<bool>), HttpError> {
    let no_reply = input.no_reply;
    persist_user_message(&state, &session_id, input)?;
    if !no_reply {
        let runtime = state.runtime.clone();
        let host_factory = state.host_factory.clone();
        tokio::spawn(async move {
            if let Err(err) = run_turn(runtime, session_id, host_factory).await {
                tracing::error!(error = %err, "turn loop ended in error");
            }
        });
    }
    Ok((StatusCode::ACCEPTED, Json(true)))
}

// ── Permissions & questions ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PendingPermission {
    pub id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub permission: String,
    pub patterns: Vec<String>,
    pub tool: Option<String>,
    pub metadata: Value,
}

pub async fn list_permissions(State(state): State<AppState>) -> Json<Vec<PendingPermission>> {
    let pending = state
        .runtime
        .arbiter
        .list()
        .into_iter()
        .map(|p| PendingPermission {
            id: p.id,
            session_id: p.session_id,
            permission: p.permission,
            patterns: p.patterns,
            tool: p.tool,
            metadata: p.metadata,
        })
        .collect();
    Json(pending)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyChoice {
    Once,
    Always,
    Reject,
}

#[derive(Debug, Deserialize)]
pub struct ReplyPermissionBody {
    pub reply: ReplyChoice,
    #[serde(default)]
    pub message: Option<String>,
}

pub async fn reply_permission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReplyPermissionBody>,
) -> Result<Json<bool>, HttpError> {
    let reply = match body.reply {
        ReplyChoice::Once => Reply::Once,
        ReplyChoice::Always => Reply::Always,
        ReplyChoice::Reject => Reply::Reject { message: body.message },
    };
    state.runtime.arbiter.reply(&id, reply)?;
    Ok(Json(true))
}

#[derive(Debug, Deserialize)]
pub struct AnswerQuestionBody {
    pub answers: Vec<Vec<String>>,
}

pub async fn reply_question(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AnswerQuestionBody>,
) -> Result<Json<bool>, HttpError> {
    state.runtime.arbiter.reply_question(&id, body.answers)?;
    Ok(Json(true))
}

pub async fn reject_question(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<bool>, HttpError> {
    state.runtime.arbiter.reject_question(&id, true)?;
    Ok(Json(true))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use agentcore_engine::{FinishReason, Runtime};
    use agentcore_model::MockProvider;
    use agentcore_storage::Storage;
    use agentcore_tools::ToolRegistry;

    use super::*;
    use crate::state::{AppState, Paths};

    fn app_state() -> (tempfile::TempDir, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Runtime::new(
            Storage::new(dir.path()),
            ToolRegistry::new(),
            vec![Arc::new(MockProvider) as Arc<dyn agentcore_model::ModelProvider>],
            agentcore_engine::AgentCatalog::new(),
            0,
        );
        let paths = Paths {
            data: dir.path().to_path_buf(),
            config: None,
            storage: dir.path().to_path_buf(),
            directory: dir.path().to_path_buf(),
            worktree: None,
        };
        (dir, AppState::new(runtime, paths))
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn create_and_fetch_session_round_trips() {
        let (_dir, state) = app_state();
        let Json(created) = create_session(
            State(state.clone()),
            Json(CreateSessionBody { title: Some("hello".into()), parent_id: None, permission: None }),
        )
        .await;
        let Json(fetched) = get_session(State(state), Path(created.id.clone())).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.title, "hello");
    }

    #[tokio::test]
    async fn missing_session_is_not_found_error() {
        let (_dir, state) = app_state();
        let err = get_session(State(state), Path("ses_missing".into())).await.unwrap_err();
        let response = axum::response::IntoResponse::into_response(err);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// S1 — echo turn: a blocking `POST /session/:id/message` with one text
    /// part persists a user message and a finished assistant message.
    #[tokio::test]
    async fn echo_turn_persists_user_and_assistant_messages() {
        let (_dir, state) = app_state();
        let Json(session) = create_session(
            State(state.clone()),
            Json(CreateSessionBody { title: None, parent_id: None, permission: None }),
        )
        .await;

        let input = PromptInput {
            parts: vec![PromptInputPart::Text { text: "hi".into() }],
            model: Some(ModelRef { provider_id: "mock".into(), model_id: "mock-model".into() }),
            agent: None,
            system: None,
            tools: None,
            variant: None,
            no_reply: false,
            message_id: None,
        };

        let Json(result) = post_message(State(state.clone()), Path(session.id.clone()), Json(input)).await.unwrap();
        assert!(matches!(result.info, Message::Assistant { finish: Some(FinishReason::Stop), .. }));
        assert_eq!(result.parts.len(), 1);
        assert!(matches!(&result.parts[0], Part::Text { text, .. } if text.contains("hi")));

        let history = list_messages(State(state), Path(session.id), Query(ListMessagesQuery { limit: None }))
            .await
            .unwrap()
            .0;
        assert_eq!(history.len(), 2);
        assert!(matches!(history[0].info, Message::User { .. }));
    }

    #[tokio::test]
    async fn no_reply_persists_only_the_user_message() {
        let (_dir, state) = app_state();
        let Json(session) = create_session(
            State(state.clone()),
            Json(CreateSessionBody { title: None, parent_id: None, permission: None }),
        )
        .await;

        let input = PromptInput {
            parts: vec![PromptInputPart::Text { text: "noted".into() }],
            model: Some(ModelRef { provider_id: "mock".into(), model_id: "mock-model".into() }),
            agent: None,
            system: None,
            tools: None,
            variant: None,
            no_reply: true,
            message_id: None,
        };

        let Json(result) = post_message(State(state.clone()), Path(session.id.clone()), Json(input)).await.unwrap();
        assert!(matches!(result.info, Message::User { .. }));

        let history = state.runtime.store.messages(&session.id).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn model_required_without_agent_default_is_bad_request() {
        let (_dir, state) = app_state();
        let Json(session) = create_session(
            State(state.clone()),
            Json(CreateSessionBody { title: None, parent_id: None, permission: None }),
        )
        .await;

        let input = PromptInput {
            parts: vec![PromptInputPart::Text { text: "hi".into() }],
            model: None,
            agent: None,
            system: None,
            tools: None,
            variant: None,
            no_reply: false,
            message_id: None,
        };

        let err = post_message(State(state), Path(session.id), Json(input)).await.unwrap_err();
        let response = axum::response::IntoResponse::into_response(err);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
