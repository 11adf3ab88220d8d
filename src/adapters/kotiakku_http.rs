use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;

const HTTP_TIMEOUT_SECONDS: u64 = 10;
const API_KEY_HEADER: &str = "X-API-KEY";

/// One fetch of the battery telemetry endpoint.
pub trait KotiakkuClient: Send + 'static {
    fn fetch(&self) -> Result<Value, KotiakkuClientError>;
}

#[derive(Debug, Error)]
pub enum KotiakkuClientError {
    #[error("Invalid API Key - Authentication failed")]
    InvalidAuth,
    #[error("Error communicating with API: unexpected status {0}")]
    Status(StatusCode),
    #[error("Error communicating with API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Error communicating with API: {0}")]
    Io(#[from] std::io::Error),
    #[error("Error communicating with API: invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl KotiakkuClientError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::InvalidAuth)
    }
}

#[derive(Debug, Clone)]
pub struct KotiakkuHttpClient {
    http: Client,
    url: String,
    api_key: String,
}

impl KotiakkuHttpClient {
    pub fn new(url: &str, api_key: &str) -> Result<Self, KotiakkuClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .build()?;

        Ok(Self {
            http,
            url: url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl KotiakkuClient for KotiakkuHttpClient {
    fn fetch(&self) -> Result<Value, KotiakkuClientError> {
        let response = self
            .http
            .get(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(KotiakkuClientError::InvalidAuth);
        }
        if !status.is_success() {
            return Err(KotiakkuClientError::Status(status));
        }

        let body = response.text()?;
        let payload = serde_json::from_str(&body)?;
        tracing::debug!(bytes = body.len(), "kotiakku payload received");

        Ok(payload)
    }
}
