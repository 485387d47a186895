//! Static model catalog: context windows, output caps, input modalities, and
//! per-million-token rates used for cost accounting.

use serde::{Deserialize, Serialize};

/// Input modalities supported by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModality {
    Text,
    Image,
}

fn default_input_modalities() -> Vec<InputModality> {
    vec![InputModality::Text]
}

/// Per-million-token prices, in one currency unit, for a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub input: f64,
    pub output: f64,
    #[serde(default)]
    pub cache_read: f64,
    #[serde(default)]
    pub cache_write: f64,
}

/// Token counts accumulated over a completion (or a single step of one).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
    #[serde(default)]
    pub reasoning_tokens: u32,
    #[serde(default)]
    pub cache_read_tokens: u32,
    #[serde(default)]
    pub cache_write_tokens: u32,
}

impl Usage {
    /// `cost = (n_in·in + n_out·out + n_reason·out + n_cr·cache.read + n_cw·cache.write) / 1_000_000`.
    ///
    /// Reasoning tokens are billed at the output rate: the catalog carries no
    /// separate reasoning price, matching every provider's current billing.
    pub fn cost(&self, rates: &Rates) -> f64 {
        let billed = self.input_tokens as f64 * rates.input
            + self.output_tokens as f64 * rates.output
            + self.reasoning_tokens as f64 * rates.output
            + self.cache_read_tokens as f64 * rates.cache_read
            + self.cache_write_tokens as f64 * rates.cache_write;
        billed / 1_000_000.0
    }

    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.reasoning_tokens += other.reasoning_tokens;
        self.cache_read_tokens += other.cache_read_tokens;
        self.cache_write_tokens += other.cache_write_tokens;
    }
}

/// Metadata for a single model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelCatalogEntry {
    /// Provider-scoped model identifier (e.g. "gpt-4o", "claude-opus-4-6").
    pub id: String,
    pub name: String,
    /// Provider identifier: "openai" | "anthropic" | "mock".
    pub provider: String,
    pub context_window: u32,
    pub max_output_tokens: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_input_modalities")]
    pub input_modalities: Vec<InputModality>,
    #[serde(default)]
    pub rates: Rates,
}

impl ModelCatalogEntry {
    pub fn supports_images(&self) -> bool {
        self.input_modalities.contains(&InputModality::Image)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<ModelCatalogEntry>,
}

/// Return all entries from the bundled static catalog.
pub fn static_catalog() -> Vec<ModelCatalogEntry> {
    let yaml = include_str!("../models.yaml");
    let catalog: CatalogFile = serde_yaml::from_str(yaml).expect("bundled models.yaml must be valid");
    catalog.models
}

/// Look up a single model by provider and id (or name).
pub fn lookup(provider: &str, model_id: &str) -> Option<ModelCatalogEntry> {
    static_catalog()
        .into_iter()
        .find(|e| e.provider == provider && (e.id == model_id || e.name == model_id))
}

/// Look up a model by bare model name, checking `id` and `name` across every provider.
pub fn lookup_by_model_name(model_name: &str) -> Option<ModelCatalogEntry> {
    static_catalog().into_iter().find(|e| e.id == model_name || e.name == model_name)
}

pub fn supports_images(provider: &str, model_id: &str) -> bool {
    lookup(provider, model_id).map(|e| e.supports_images()).unwrap_or(false)
}

pub fn context_window(provider: &str, model_id: &str, default: u32) -> u32 {
    lookup(provider, model_id).map(|e| e.context_window).unwrap_or(default)
}

pub fn max_output_tokens(provider: &str, model_id: &str, default: u32) -> u32 {
    lookup(provider, model_id).map(|e| e.max_output_tokens).unwrap_or(default)
}
