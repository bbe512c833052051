use crate::model::FetchError;
use serde_json::Value;

/// Where one raw vendor payload comes from.
#[async_trait::async_trait]
pub trait PayloadSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, FetchError>;
}
