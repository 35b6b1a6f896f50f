use async_trait::async_trait;
use serde_json::Value;

/// Shared configuration/monitoring key-value store. Values are JSON objects.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    async fn get_dict(&self, key: &str) -> Result<Value, StoreError>;
    async fn put_dict(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization/deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid value under {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("store config error: {0}")]
    Config(String),
}
