//! Permission arbiter: rule evaluation, pending-permission and
//! pending-question bookkeeping, and cross-session unblocking.

mod arbiter;
mod event;
mod glob;
mod rule;

pub use arbiter::{
    Arbiter, AskRequest, NotFound, PendingPermissionInfo, PendingQuestionInfo, PermissionError,
    QuestionError, Reply,
};
pub use event::{PermissionEvent, Question, ReplyKind};
pub use rule::{combined, evaluate, Action, Rule, Ruleset};
