use crate::fetcher::traits::PayloadSource;
use crate::model::FetchError;

use serde_json::Value;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::info;

/// Reads a payload from a JSON file, or from stdin when the path is `-`.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl PayloadSource for FileSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        let content = if self.path.as_os_str() == "-" {
            info!("Reading offer payload from stdin");
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        } else {
            info!("Reading offer payload from {}", self.path.display());
            tokio::fs::read_to_string(&self.path).await?
        };
        Ok(serde_json::from_str(&content)?)
    }
}
