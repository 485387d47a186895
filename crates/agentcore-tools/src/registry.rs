//! Fixed, startup-augmentable registry of tools, with model-advisory
//! schema selection.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::tool::Tool;

#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub id: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: HashMap::new() }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.tools.insert(tool.id().to_string(), Arc::new(tool));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tools.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .map(|t| ToolSchema {
                id: t.id().to_string(),
                description: t.description().to_string(),
                parameters: t.parameter_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.id.cmp(&b.id));
        schemas
    }

    /// Schemas for tools advisory-scoped to `(provider, model)`, or to
    /// every model if a tool declares no restriction.
    pub fn schemas_for_model(&self, provider: &str, model: &str) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self
            .tools
            .values()
            .filter(|t| match t.models() {
                None => true,
                Some(allowed) => allowed.contains(&(provider, model)),
            })
            .map(|t| ToolSchema {
                id: t.id().to_string(),
                description: t.description().to_string(),
                parameters: t.parameter_schema(),
            })
            .collect();
        schemas.sort_by(|a, b| a.id.cmp(&b.id));
        schemas
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolContext, ToolExecuteOutput};
    use async_trait::async_trait;
    use serde_json::json;

    struct NoopTool(&'static str);

    #[async_trait]
    impl Tool for NoopTool {
        fn id(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "noop"
        }
        fn parameter_schema(&self) -> Value {
            json!({})
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolExecuteOutput, String> {
            Ok(ToolExecuteOutput::text("noop", ""))
        }
    }

    struct RestrictedTool;

    #[async_trait]
    impl Tool for RestrictedTool {
        fn id(&self) -> &str {
            "restricted"
        }
        fn description(&self) -> &str {
            "only for anthropic"
        }
        fn parameter_schema(&self) -> Value {
            json!({})
        }
        fn models(&self) -> Option<&[(&str, &str)]> {
            Some(&[("anthropic", "claude")])
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolExecuteOutput, String> {
            Ok(ToolExecuteOutput::text("restricted", ""))
        }
    }

    #[test]
    fn schemas_are_sorted_by_id() {
        let mut reg = ToolRegistry::new();
        reg.register(NoopTool("zeta"));
        reg.register(NoopTool("alpha"));
        let ids: Vec<String> = reg.schemas().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn model_filter_excludes_tools_restricted_to_other_models() {
        let mut reg = ToolRegistry::new();
        reg.register(NoopTool("general"));
        reg.register(RestrictedTool);

        let for_anthropic = reg.schemas_for_model("anthropic", "claude");
        assert_eq!(for_anthropic.len(), 2);

        let for_openai = reg.schemas_for_model("openai", "gpt");
        assert_eq!(for_openai.len(), 1);
        assert_eq!(for_openai[0].id, "general");
    }

    #[test]
    fn unknown_tool_id_returns_none() {
        let reg = ToolRegistry::new();
        assert!(reg.get("missing").is_none());
    }
}
