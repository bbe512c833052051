use serde::Deserialize;
use std::fs;
use tracing::Level;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: String,
    pub log_level: String,
    /// Used by `ingest` when neither a file nor a URL is given.
    pub feed_url: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "offers.db".to_string(),
            log_level: "info".to_string(),
            feed_url: None,
            request_timeout_seconds: 10,
        }
    }
}

impl AppConfig {
    pub fn max_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
