//! Configuration shape. Mirrors `agentcore_engine::Agent` directly for the
//! `agents` map so a YAML agent definition deserializes straight into the
//! catalog the engine runs against.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use agentcore_engine::Agent;

fn default_bind() -> String {
    "127.0.0.1:4096".into()
}

fn default_max_retries() -> u32 {
    2
}

/// Name of the agent used when a prompt doesn't name one explicitly.
pub const DEFAULT_AGENT_NAME: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP/SSE surface binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Extra CORS origins allowed beyond `http://localhost`. `"*"` allows any.
    #[serde(default)]
    pub cors_whitelist: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig { bind: default_bind(), cors_whitelist: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Root directory for session/message/part storage. `None` means the
    /// loader falls back to a platform data directory.
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Retries attempted per model call before a turn fails.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Named agent definitions, keyed by agent name (also written into each
    /// `Agent.name` on load so the two never disagree).
    #[serde(default = "default_agents")]
    pub agents: HashMap<String, Agent>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            data_dir: None,
            max_retries: default_max_retries(),
            agents: default_agents(),
        }
    }
}

fn default_agents() -> HashMap<String, Agent> {
    let mut agents = HashMap::new();
    agents.insert(DEFAULT_AGENT_NAME.to_string(), default_agent());
    agents
}

fn default_agent() -> Agent {
    use agentcore_engine::ModelRef;
    use agentcore_permission::{Action, Rule};

    Agent {
        name: DEFAULT_AGENT_NAME.to_string(),
        prompt: Some("You are a careful, helpful coding agent.".into()),
        permission: vec![Rule::new("*", "*", Action::Ask)],
        steps: None,
        default_model: ModelRef { provider_id: "anthropic".into(), model_id: "claude-sonnet-4-5".into() },
        question_rejection_cascades: true,
    }
}

impl Config {
    /// Build an `AgentCatalog` from `agents`, filling in each entry's `name`
    /// from its map key so a YAML author doesn't have to repeat it.
    pub fn agent_catalog(&self) -> agentcore_engine::AgentCatalog {
        let mut catalog = agentcore_engine::AgentCatalog::new();
        for (name, agent) in &self.agents {
            let mut agent = agent.clone();
            agent.name = name.clone();
            catalog.register(agent);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_a_default_agent() {
        let config = Config::default();
        assert!(config.agents.contains_key(DEFAULT_AGENT_NAME));
    }

    #[test]
    fn agent_catalog_resolves_default_agent() {
        let config = Config::default();
        let catalog = config.agent_catalog();
        assert!(catalog.get(DEFAULT_AGENT_NAME).is_some());
    }

    #[test]
    fn agent_catalog_uses_map_key_as_name() {
        let mut config = Config::default();
        let mut agent = default_agent();
        agent.name = "stale".into();
        config.agents.insert("renamed".into(), agent);
        let catalog = config.agent_catalog();
        assert_eq!(catalog.get("renamed").unwrap().name, "renamed");
    }

    #[test]
    fn config_deserializes_server_block() {
        let yaml = "server:\n  bind: 0.0.0.0:9000\n  cors_whitelist:\n    - https://example.com\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.cors_whitelist, vec!["https://example.com".to_string()]);
    }

    #[test]
    fn config_partial_yaml_keeps_default_agent() {
        let yaml = "max_retries: 5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_retries, 5);
        assert!(config.agents.contains_key(DEFAULT_AGENT_NAME));
    }
}
