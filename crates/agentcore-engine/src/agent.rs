//! Named agents: prompt, permission ruleset, step cap, default model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use agentcore_permission::Ruleset;

use crate::message::ModelRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub name: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub permission: Ruleset,
    /// `None` means unbounded steps.
    #[serde(default)]
    pub steps: Option<u32>,
    pub default_model: ModelRef,
    /// Whether rejecting a pending question cascades into rejecting the
    /// session's other pending permission requests too. The source reuses
    /// the pending-permission mechanism as a mutual-exclusion device for
    /// this; whether that's desired varies by agent.
    #[serde(default = "default_cascades")]
    pub question_rejection_cascades: bool,
}

fn default_cascades() -> bool {
    true
}

#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: HashMap<String, Agent>,
}

impl AgentCatalog {
    pub fn new() -> Self {
        AgentCatalog { agents: HashMap::new() }
    }

    pub fn register(&mut self, agent: Agent) {
        self.agents.insert(agent.name.clone(), agent);
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    pub fn list(&self) -> Vec<&Agent> {
        let mut agents: Vec<&Agent> = self.agents.values().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        agents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentcore_permission::{Action, Rule};

    fn sample(name: &str) -> Agent {
        Agent {
            name: name.into(),
            prompt: Some("You are a helpful coding agent.".into()),
            permission: vec![Rule::new("*", "*", Action::Ask)],
            steps: Some(10),
            default_model: ModelRef { provider_id: "mock".into(), model_id: "mock-model".into() },
            question_rejection_cascades: true,
        }
    }

    #[test]
    fn catalog_lists_agents_sorted_by_name() {
        let mut catalog = AgentCatalog::new();
        catalog.register(sample("zeta"));
        catalog.register(sample("alpha"));
        let names: Vec<&str> = catalog.list().into_iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn unknown_agent_is_none() {
        let catalog = AgentCatalog::new();
        assert!(catalog.get("missing").is_none());
    }
}
