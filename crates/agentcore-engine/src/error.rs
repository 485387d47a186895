use agentcore_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("model not found: {provider_id}/{model_id}")]
    ModelNotFound { provider_id: String, model_id: String, suggestions: Vec<String> },
    #[error("no user message")]
    NoUserMessage,
    #[error("{0}")]
    Unknown(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl EngineError {
    pub fn not_found_from_storage(err: StorageError) -> EngineError {
        match err {
            StorageError::NotFound(key) => EngineError::NotFound(key.to_string()),
            other => EngineError::Storage(other),
        }
    }
}
