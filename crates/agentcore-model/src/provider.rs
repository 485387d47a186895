//! The adapter contract: `(model, systemPrompt[], modelMessages[], tools,
//! options, abort) -> event stream`.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;

use agentcore_tools::{AbortSignal, ToolSchema};

use crate::catalog::{self, InputModality, ModelCatalogEntry};
use crate::event::ModelEvent;

pub type ModelEventStream = Pin<Box<dyn Stream<Item = anyhow::Result<ModelEvent>> + Send>>;

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

/// A single model invocation. `messages` are already-rendered provider-shaped
/// message snapshots (`serde_json::Value`) rather than the engine's typed
/// `Message`/`Part` — this crate must not depend on `agentcore-engine`, which
/// depends on it.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: Vec<String>,
    pub messages: Vec<Value>,
    pub tools: Vec<ToolSchema>,
    pub options: RequestOptions,
    pub abort: AbortSignal,
}

/// Implemented once per provider; the core never sees wire formats. An
/// adapter is responsible for provider quirks (empty-message filtering,
/// tool-call-ID normalization, cache-control markers) as pure transformations
/// of the request before it hits the wire.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model_name(&self) -> &str;

    /// Cancellation: the returned stream must terminate promptly once
    /// `req.abort` fires.
    async fn complete(&self, req: ModelRequest) -> anyhow::Result<ModelEventStream>;

    fn catalog_entry(&self) -> Option<ModelCatalogEntry> {
        catalog::lookup(self.name(), self.model_name())
    }

    fn catalog_context_window(&self) -> Option<u32> {
        self.catalog_entry().map(|e| e.context_window)
    }

    fn catalog_max_output_tokens(&self) -> Option<u32> {
        self.catalog_entry().map(|e| e.max_output_tokens)
    }

    fn input_modalities(&self) -> Vec<InputModality> {
        self.catalog_entry().map(|e| e.input_modalities).unwrap_or_else(|| vec![InputModality::Text])
    }

    fn supports_images(&self) -> bool {
        self.input_modalities().contains(&InputModality::Image)
    }

    /// Models this provider can serve, from the static catalog.
    fn list_models(&self) -> Vec<ModelCatalogEntry> {
        catalog::static_catalog().into_iter().filter(|e| e.provider == self.name()).collect()
    }
}
