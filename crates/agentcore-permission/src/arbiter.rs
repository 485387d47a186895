//! The permission arbiter: rule evaluation, pending-permission and
//! pending-question bookkeeping, and cross-session unblocking.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use agentcore_bus::Bus;

use crate::event::{PermissionEvent, Question, ReplyKind};
use crate::rule::{self, Action, Rule, Ruleset};

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("denied by rule {{permission: {}, pattern: {}}}", rule.permission, rule.pattern)]
    Denied { rule: Rule },
    #[error("permission request rejected")]
    Rejected,
    #[error("permission request rejected: {0}")]
    Corrected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QuestionError {
    #[error("question rejected")]
    Rejected,
}

#[derive(Debug, thiserror::Error)]
#[error("no pending request with that id")]
pub struct NotFound;

/// Parameters for one `ask` call. `patterns` are evaluated in order;
/// `always` lists the patterns that get appended to the approved ruleset
/// if the caller eventually replies `always` to one of the asks raised
/// while evaluating this request.
pub struct AskRequest {
    pub session_id: String,
    pub permission: String,
    pub patterns: Vec<String>,
    pub always: Vec<String>,
    pub metadata: serde_json::Value,
    pub tool: Option<String>,
    pub ruleset: Ruleset,
}

/// Reply to a pending permission request.
pub enum Reply {
    Once,
    Always,
    Reject { message: Option<String> },
}

pub struct PendingPermissionInfo {
    pub id: String,
    pub session_id: String,
    pub permission: String,
    pub patterns: Vec<String>,
    pub tool: Option<String>,
    pub metadata: serde_json::Value,
}

enum PermissionOutcome {
    Resolved,
    Rejected,
    Corrected(String),
}

struct PendingPermission {
    session_id: String,
    permission: String,
    remaining_patterns: Vec<String>,
    always: Vec<String>,
    metadata: serde_json::Value,
    tool: Option<String>,
    ruleset: Ruleset,
    resolver: Option<oneshot::Sender<PermissionOutcome>>,
}

enum QuestionOutcome {
    Answered(Vec<Vec<String>>),
    Rejected,
}

struct PendingQuestion {
    session_id: String,
    questions: Vec<Question>,
    resolver: Option<oneshot::Sender<QuestionOutcome>>,
}

pub struct PendingQuestionInfo {
    pub id: String,
    pub session_id: String,
    pub questions: Vec<Question>,
}

/// Process-wide permission and question state: the approved ruleset
/// (monotonically grown by `always` replies) and the two pending maps.
/// Access to each map is serialized by its own lock; the arbiter never
/// holds more than one lock at a time.
pub struct Arbiter {
    approved: Mutex<Ruleset>,
    pending_permissions: Mutex<HashMap<String, PendingPermission>>,
    pending_questions: Mutex<HashMap<String, PendingQuestion>>,
    bus: Bus<PermissionEvent>,
}

impl Arbiter {
    pub fn new(bus: Bus<PermissionEvent>) -> Self {
        Arbiter {
            approved: Mutex::new(Vec::new()),
            pending_permissions: Mutex::new(HashMap::new()),
            pending_questions: Mutex::new(HashMap::new()),
            bus,
        }
    }

    pub fn bus(&self) -> &Bus<PermissionEvent> {
        &self.bus
    }

    pub fn approved_ruleset(&self) -> Ruleset {
        self.approved.lock().expect("approved ruleset mutex poisoned").clone()
    }

    /// Evaluate each pattern of `req` in order against `req.ruleset ∪
    /// approved`. A `deny` fails immediately. An `ask` suspends until the
    /// matching request is replied to, and later patterns are not
    /// evaluated until then. Returns `Ok(())` once every pattern has
    /// resolved to `allow`.
    pub async fn ask(&self, req: AskRequest) -> Result<(), PermissionError> {
        let AskRequest { session_id, permission, patterns, always, metadata, tool, ruleset } = req;

        let mut index = 0;
        while index < patterns.len() {
            let pattern = patterns[index].clone();
            let action_and_rule = {
                let approved = self.approved_ruleset();
                let combined = rule::combined(&ruleset, &approved);
                rule::evaluate(&combined, &permission, &pattern)
            };

            match action_and_rule {
                (Action::Deny, Some(rule)) => return Err(PermissionError::Denied { rule }),
                (Action::Deny, None) => unreachable!("deny action always carries the matching rule"),
                (Action::Allow, _) => {
                    index += 1;
                }
                (Action::Ask, _) => {
                    let id = agentcore_ids::generate(agentcore_ids::prefix::PERMISSION);
                    let (tx, rx) = oneshot::channel();
                    let remaining_patterns = patterns[index..].to_vec();

                    self.pending_permissions.lock().expect("pending permissions mutex poisoned").insert(
                        id.clone(),
                        PendingPermission {
                            session_id: session_id.clone(),
                            permission: permission.clone(),
                            remaining_patterns: remaining_patterns.clone(),
                            always: always.clone(),
                            metadata: metadata.clone(),
                            tool: tool.clone(),
                            ruleset: ruleset.clone(),
                            resolver: Some(tx),
                        },
                    );

                    tracing::info!(id = %id, session_id = %session_id, permission = %permission, "permission.asked");
                    self.bus.publish(PermissionEvent::PermissionAsked {
                        id: id.clone(),
                        session_id: session_id.clone(),
                        permission: permission.clone(),
                        patterns: remaining_patterns,
                        tool: tool.clone(),
                        metadata: metadata.clone(),
                    });

                    match rx.await.unwrap_or(PermissionOutcome::Rejected) {
                        PermissionOutcome::Resolved => index += 1,
                        PermissionOutcome::Rejected => return Err(PermissionError::Rejected),
                        PermissionOutcome::Corrected(message) => {
                            return Err(PermissionError::Corrected(message))
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn reply(&self, request_id: &str, reply: Reply) -> Result<(), NotFound> {
        match reply {
            Reply::Once => self.reply_once(request_id),
            Reply::Always => self.reply_always(request_id),
            Reply::Reject { message } => self.reply_reject(request_id, message),
        }
    }

    fn take_pending(&self, id: &str) -> Option<PendingPermission> {
        self.pending_permissions
            .lock()
            .expect("pending permissions mutex poisoned")
            .remove(id)
    }

    fn reply_once(&self, request_id: &str) -> Result<(), NotFound> {
        let mut pending = self.take_pending(request_id).ok_or(NotFound)?;
        let resolver = pending.resolver.take().expect("pending request always holds a resolver");
        let _ = resolver.send(PermissionOutcome::Resolved);
        self.bus.publish(PermissionEvent::PermissionReplied {
            id: request_id.to_string(),
            session_id: pending.session_id,
            reply: ReplyKind::Once,
        });
        Ok(())
    }

    fn reply_always(&self, request_id: &str) -> Result<(), NotFound> {
        let mut pending = self.take_pending(request_id).ok_or(NotFound)?;
        {
            let mut approved = self.approved.lock().expect("approved ruleset mutex poisoned");
            for pattern in &pending.always {
                approved.push(Rule::new(pending.permission.clone(), pattern.clone(), Action::Allow));
            }
        }
        let resolver = pending.resolver.take().expect("pending request always holds a resolver");
        let _ = resolver.send(PermissionOutcome::Resolved);
        self.bus.publish(PermissionEvent::PermissionReplied {
            id: request_id.to_string(),
            session_id: pending.session_id.clone(),
            reply: ReplyKind::Always,
        });
        self.auto_resolve_now_allowed(&pending.session_id);
        Ok(())
    }

    fn reply_reject(&self, request_id: &str, message: Option<String>) -> Result<(), NotFound> {
        let mut pending = self.take_pending(request_id).ok_or(NotFound)?;
        let outcome = match message {
            Some(message) => PermissionOutcome::Corrected(message),
            None => PermissionOutcome::Rejected,
        };
        let resolver = pending.resolver.take().expect("pending request always holds a resolver");
        let _ = resolver.send(outcome);
        let session_id = pending.session_id.clone();
        self.bus.publish(PermissionEvent::PermissionReplied {
            id: request_id.to_string(),
            session_id: session_id.clone(),
            reply: ReplyKind::Reject,
        });
        // A rejection signals the user wants to abandon the current turn,
        // not just this one call.
        self.cascade_reject_permissions(&session_id, Some(request_id));
        Ok(())
    }

    /// After an `always` reply grows the approved ruleset, check every
    /// other pending request of the same session: if every one of its
    /// remaining patterns now evaluates to `allow`, resolve it too.
    fn auto_resolve_now_allowed(&self, session_id: &str) {
        let approved = self.approved_ruleset();
        let mut pending = self.pending_permissions.lock().expect("pending permissions mutex poisoned");
        let ready: Vec<String> = pending
            .iter()
            .filter(|(_, p)| p.session_id == session_id)
            .filter(|(_, p)| {
                let combined = rule::combined(&p.ruleset, &approved);
                p.remaining_patterns
                    .iter()
                    .all(|pattern| rule::evaluate(&combined, &p.permission, pattern).0 == Action::Allow)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in ready {
            if let Some(mut p) = pending.remove(&id) {
                if let Some(resolver) = p.resolver.take() {
                    let _ = resolver.send(PermissionOutcome::Resolved);
                    tracing::debug!(id = %id, "permission auto-resolved by always reply");
                }
            }
        }
    }

    fn cascade_reject_permissions(&self, session_id: &str, exclude: Option<&str>) {
        let mut pending = self.pending_permissions.lock().expect("pending permissions mutex poisoned");
        let ids: Vec<String> = pending
            .iter()
            .filter(|(id, p)| p.session_id == session_id && Some(id.as_str()) != exclude)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Some(mut p) = pending.remove(&id) {
                if let Some(resolver) = p.resolver.take() {
                    let _ = resolver.send(PermissionOutcome::Rejected);
                }
            }
        }
    }

    pub fn list(&self) -> Vec<PendingPermissionInfo> {
        self.pending_permissions
            .lock()
            .expect("pending permissions mutex poisoned")
            .iter()
            .map(|(id, p)| PendingPermissionInfo {
                id: id.clone(),
                session_id: p.session_id.clone(),
                permission: p.permission.clone(),
                patterns: p.remaining_patterns.clone(),
                tool: p.tool.clone(),
                metadata: p.metadata.clone(),
            })
            .collect()
    }

    // ── Questions ──────────────────────────────────────────────────────

    pub async fn ask_question(
        &self,
        session_id: impl Into<String>,
        questions: Vec<Question>,
    ) -> Result<Vec<Vec<String>>, QuestionError> {
        let session_id = session_id.into();
        let id = agentcore_ids::generate(agentcore_ids::prefix::QUESTION);
        let (tx, rx) = oneshot::channel();

        self.pending_questions.lock().expect("pending questions mutex poisoned").insert(
            id.clone(),
            PendingQuestion { session_id: session_id.clone(), questions: questions.clone(), resolver: Some(tx) },
        );
        self.bus.publish(PermissionEvent::QuestionAsked { id: id.clone(), session_id, questions });

        match rx.await.unwrap_or(QuestionOutcome::Rejected) {
            QuestionOutcome::Answered(answers) => Ok(answers),
            QuestionOutcome::Rejected => Err(QuestionError::Rejected),
        }
    }

    pub fn reply_question(&self, id: &str, answers: Vec<Vec<String>>) -> Result<(), NotFound> {
        let mut pending = self
            .pending_questions
            .lock()
            .expect("pending questions mutex poisoned")
            .remove(id)
            .ok_or(NotFound)?;
        let resolver = pending.resolver.take().expect("pending question always holds a resolver");
        let _ = resolver.send(QuestionOutcome::Answered(answers.clone()));
        self.bus.publish(PermissionEvent::QuestionAnswered {
            id: id.to_string(),
            session_id: pending.session_id,
            answers,
        });
        Ok(())
    }

    /// Reject a pending question. When `cascade` is set (the agent's
    /// `question_rejection_cascades` flag), every other pending question
    /// *and* permission request of the same session is rejected too.
    pub fn reject_question(&self, id: &str, cascade: bool) -> Result<(), NotFound> {
        let session_id = {
            let mut pending = self.pending_questions.lock().expect("pending questions mutex poisoned");
            let mut entry = pending.remove(id).ok_or(NotFound)?;
            let resolver = entry.resolver.take().expect("pending question always holds a resolver");
            let _ = resolver.send(QuestionOutcome::Rejected);
            entry.session_id
        };

        if cascade {
            self.cascade_reject_permissions(&session_id, None);
            let mut pending = self.pending_questions.lock().expect("pending questions mutex poisoned");
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, p)| p.session_id == session_id)
                .map(|(id, _)| id.clone())
                .collect();
            for other_id in ids {
                if let Some(mut p) = pending.remove(&other_id) {
                    if let Some(resolver) = p.resolver.take() {
                        let _ = resolver.send(QuestionOutcome::Rejected);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn list_questions(&self) -> Vec<PendingQuestionInfo> {
        self.pending_questions
            .lock()
            .expect("pending questions mutex poisoned")
            .iter()
            .map(|(id, p)| PendingQuestionInfo {
                id: id.clone(),
                session_id: p.session_id.clone(),
                questions: p.questions.clone(),
            })
            .collect()
    }

    /// Reject every pending permission and question request belonging to
    /// `session_id`. Called on session abort so no suspended `ask` is ever
    /// left dangling.
    pub fn abort_session(&self, session_id: &str) {
        self.cascade_reject_permissions(session_id, None);
        let mut pending = self.pending_questions.lock().expect("pending questions mutex poisoned");
        let ids: Vec<String> = pending
            .iter()
            .filter(|(_, p)| p.session_id == session_id)
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Some(mut p) = pending.remove(&id) {
                if let Some(resolver) = p.resolver.take() {
                    let _ = resolver.send(QuestionOutcome::Rejected);
                }
            }
        }
    }
}
