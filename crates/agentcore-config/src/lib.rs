//! Layered YAML configuration for the `agentcored` binary: server bind/CORS,
//! the storage data directory, retry policy, and the agent catalog.

mod loader;
mod schema;

pub use loader::load;
pub use schema::{Config, ServerConfig, DEFAULT_AGENT_NAME};
