//! Rules and ruleset evaluation. Rule matching compares both the
//! permission name and the pattern; the last matching rule wins. If no
//! rule matches, the implicit action is `ask`.

use serde::{Deserialize, Serialize};

use crate::glob;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Deny,
    Ask,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub permission: String,
    pub pattern: String,
    pub action: Action,
}

impl Rule {
    pub fn new(permission: impl Into<String>, pattern: impl Into<String>, action: Action) -> Self {
        Rule { permission: permission.into(), pattern: pattern.into(), action }
    }

    fn matches(&self, permission: &str, pattern: &str) -> bool {
        glob::matches(&self.permission, permission) && glob::matches(&self.pattern, pattern)
    }
}

pub type Ruleset = Vec<Rule>;

/// Evaluate `(permission, pattern)` against a ruleset. The last matching
/// rule wins; `Ask` if nothing matches.
pub fn evaluate(ruleset: &[Rule], permission: &str, pattern: &str) -> (Action, Option<Rule>) {
    let mut result = (Action::Ask, None);
    for rule in ruleset {
        if rule.matches(permission, pattern) {
            result = (rule.action, Some(rule.clone()));
        }
    }
    result
}

/// Concatenate a session/agent ruleset with the process-wide approved
/// ruleset, approved rules last so later `always` replies still observe
/// last-match-wins against any conflicting session rule of the same
/// specificity order they were declared in.
pub fn combined<'a>(ruleset: &'a [Rule], approved: &'a [Rule]) -> Vec<Rule> {
    ruleset.iter().chain(approved.iter()).cloned().collect()
}
