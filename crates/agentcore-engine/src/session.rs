use serde::{Deserialize, Serialize};

use agentcore_permission::Ruleset;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionTime {
    pub created: i64,
    pub updated: i64,
}

/// A session is either a root or a child (sub-agent turn); children
/// reference their parent. Deletion cascades to all messages and parts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub permission: Option<Ruleset>,
    pub time: SessionTime,
}
