//! Bus events published by the permission arbiter, and the shapes carried
//! in `reply`/`ask` requests.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    Once,
    Always,
    Reject,
}

/// One multiple-choice question asked of the user as part of a question
/// prompt; a prompt may bundle several of these together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum PermissionEvent {
    #[serde(rename = "permission.asked")]
    PermissionAsked {
        id: String,
        session_id: String,
        permission: String,
        patterns: Vec<String>,
        tool: Option<String>,
        metadata: serde_json::Value,
    },
    #[serde(rename = "permission.replied")]
    PermissionReplied { id: String, session_id: String, reply: ReplyKind },
    #[serde(rename = "question.asked")]
    QuestionAsked { id: String, session_id: String, questions: Vec<Question> },
    #[serde(rename = "question.answered")]
    QuestionAnswered { id: String, session_id: String, answers: Vec<Vec<String>> },
}
