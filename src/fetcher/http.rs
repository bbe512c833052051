use crate::fetcher::traits::PayloadSource;
use crate::model::FetchError;

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

pub struct HttpSource {
    client: Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: &str, timeout_seconds: u64) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) BankOfferSniper/0.1")
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl PayloadSource for HttpSource {
    async fn fetch(&self) -> Result<Value, FetchError> {
        info!("Fetching offer payload from {}", self.url);
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Offer feed responded [{}]", status);
            return Err(FetchError::InvalidResponse(status.as_u16()));
        }

        Ok(response.json::<Value>().await?)
    }
}
