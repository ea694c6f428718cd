use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("authentication: {0}")]
    Authentication(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("inventory exhausted: requested {requested}, available {available}")]
    InventoryExhausted { requested: u32, available: u32 },

    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("config: {0}")]
    Config(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
