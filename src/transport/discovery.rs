// ABOUTME: Transport discovery via a plain HTTP GET returning the websocket URL
// The endpoint answers with the URL as plain text, surrounding whitespace is ignored

use crate::session::error::DiscoveryError;
use std::time::Duration;
use tracing::{debug, info};

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TransportDiscovery {
    client: reqwest::Client,
    url: String,
}

impl TransportDiscovery {
    /// Discovery against `base_url` + `path`, e.g. `http://localhost:8000` + `/api.url`
    pub fn new(base_url: &str, path: &str) -> Self {
        let url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let client = reqwest::Client::builder()
            .timeout(DISCOVERY_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self { client, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the websocket endpoint URL
    pub async fn fetch_url(&self) -> Result<String, DiscoveryError> {
        debug!("Fetching websocket URL from {}", self.url);

        let request_error = |source| DiscoveryError::Request {
            url: self.url.clone(),
            source,
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(request_error)?;

        let body = response.text().await.map_err(request_error)?;
        let ws_url = body.trim();

        if ws_url.is_empty() {
            return Err(DiscoveryError::EmptyUrl);
        }
        if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
            return Err(DiscoveryError::InvalidUrl(ws_url.to_string()));
        }

        info!("Discovered websocket URL {}", ws_url);
        Ok(ws_url.to_string())
    }
}
