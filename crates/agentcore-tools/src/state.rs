//! The tool-call state machine: `pending -> running -> completed|error`,
//! with no backward transitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolPartState {
    /// Input accumulating as raw JSON text arrives from the model.
    Pending { input: String },
    /// Input complete; `execute` in progress. `metadata` patches permitted.
    Running { input: Value, started_at: i64 },
    /// Terminal: `execute` returned a result.
    Completed {
        input: Value,
        title: String,
        output: String,
        metadata: Value,
        attachments: Vec<Attachment>,
        time: TimeRange,
    },
    /// Terminal: `execute` failed, or the tool was interrupted.
    Error { input: Value, error: String, metadata: Option<Value>, time: TimeRange },
}

#[derive(Debug, thiserror::Error)]
#[error("invalid tool state transition: {action} is not valid from state {from}")]
pub struct InvalidTransition {
    from: &'static str,
    action: &'static str,
}

impl ToolPartState {
    pub fn pending() -> Self {
        ToolPartState::Pending { input: String::new() }
    }

    fn tag(&self) -> &'static str {
        match self {
            ToolPartState::Pending { .. } => "pending",
            ToolPartState::Running { .. } => "running",
            ToolPartState::Completed { .. } => "completed",
            ToolPartState::Error { .. } => "error",
        }
    }

    fn invalid(&self, action: &'static str) -> InvalidTransition {
        InvalidTransition { from: self.tag(), action }
    }

    /// Accumulate a raw-text delta of the tool call's arguments. Only
    /// valid while `pending`.
    pub fn append_delta(&mut self, delta: &str) -> Result<(), InvalidTransition> {
        match self {
            ToolPartState::Pending { input } => {
                input.push_str(delta);
                Ok(())
            }
            other => Err(other.invalid("append_delta")),
        }
    }

    /// The input is complete; move to `running`. Only valid from `pending`.
    pub fn start_running(&mut self, input: Value, now: i64) -> Result<(), InvalidTransition> {
        match self {
            ToolPartState::Pending { .. } => {
                *self = ToolPartState::Running { input, started_at: now };
                Ok(())
            }
            other => Err(other.invalid("start_running")),
        }
    }

    /// `execute` succeeded; move to `completed`. Only valid from `running`.
    pub fn complete(
        &mut self,
        now: i64,
        title: String,
        output: String,
        metadata: Value,
        attachments: Vec<Attachment>,
    ) -> Result<(), InvalidTransition> {
        match self {
            ToolPartState::Running { input, started_at } => {
                *self = ToolPartState::Completed {
                    input: input.clone(),
                    title,
                    output,
                    metadata,
                    attachments,
                    time: TimeRange { start: *started_at, end: Some(now) },
                };
                Ok(())
            }
            other => Err(other.invalid("complete")),
        }
    }

    /// `execute` failed; move to `error`. Only valid from `running`.
    pub fn fail(&mut self, now: i64, error: String, metadata: Option<Value>) -> Result<(), InvalidTransition> {
        match self {
            ToolPartState::Running { input, started_at } => {
                *self = ToolPartState::Error {
                    input: input.clone(),
                    error,
                    metadata,
                    time: TimeRange { start: *started_at, end: Some(now) },
                };
                Ok(())
            }
            other => Err(other.invalid("fail")),
        }
    }

    /// The session was aborted while this tool was `pending` or `running`.
    /// Finalizes as `error` with message `"interrupted"`; the tool is not
    /// re-executed.
    pub fn interrupt(&mut self, now: i64) -> Result<(), InvalidTransition> {
        match self {
            ToolPartState::Pending { input } => {
                let parsed = serde_json::from_str(input).unwrap_or(Value::String(input.clone()));
                *self = ToolPartState::Error {
                    input: parsed,
                    error: "interrupted".to_string(),
                    metadata: None,
                    time: TimeRange { start: now, end: Some(now) },
                };
                Ok(())
            }
            ToolPartState::Running { input, started_at } => {
                *self = ToolPartState::Error {
                    input: input.clone(),
                    error: "interrupted".to_string(),
                    metadata: None,
                    time: TimeRange { start: *started_at, end: Some(now) },
                };
                Ok(())
            }
            other => Err(other.invalid("interrupt")),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ToolPartState::Completed { .. } | ToolPartState::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn happy_path_transitions_in_order() {
        let mut state = ToolPartState::pending();
        state.append_delta("{\"command\":").unwrap();
        state.append_delta("\"ls\"}").unwrap();
        state.start_running(json!({"command": "ls"}), 100).unwrap();
        state
            .complete(150, "ls".to_string(), "file1\nfile2".to_string(), json!({}), vec![])
            .unwrap();
        assert!(matches!(state, ToolPartState::Completed { .. }));
    }

    #[test]
    fn cannot_append_delta_once_running() {
        let mut state = ToolPartState::pending();
        state.start_running(json!({}), 1).unwrap();
        assert!(state.append_delta("x").is_err());
    }

    #[test]
    fn cannot_complete_twice() {
        let mut state = ToolPartState::pending();
        state.start_running(json!({}), 1).unwrap();
        state.complete(2, "t".into(), "o".into(), json!({}), vec![]).unwrap();
        assert!(state.complete(3, "t".into(), "o".into(), json!({}), vec![]).is_err());
    }

    #[test]
    fn cannot_transition_backward_from_error() {
        let mut state = ToolPartState::pending();
        state.start_running(json!({}), 1).unwrap();
        state.fail(2, "boom".into(), None).unwrap();
        assert!(state.start_running(json!({}), 3).is_err());
        assert!(state.append_delta("x").is_err());
    }

    #[test]
    fn interrupt_from_pending_is_error_interrupted() {
        let mut state = ToolPartState::pending();
        state.interrupt(10).unwrap();
        match state {
            ToolPartState::Error { error, .. } => assert_eq!(error, "interrupted"),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn interrupt_from_running_is_error_interrupted() {
        let mut state = ToolPartState::pending();
        state.start_running(json!({"a": 1}), 5).unwrap();
        state.interrupt(10).unwrap();
        match state {
            ToolPartState::Error { error, time, .. } => {
                assert_eq!(error, "interrupted");
                assert_eq!(time.start, 5);
                assert_eq!(time.end, Some(10));
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn interrupt_is_not_valid_once_terminal() {
        let mut state = ToolPartState::pending();
        state.start_running(json!({}), 1).unwrap();
        state.complete(2, "t".into(), "o".into(), json!({}), vec![]).unwrap();
        assert!(state.interrupt(3).is_err());
    }
}
