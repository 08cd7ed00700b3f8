use crate::constants;
use crate::models::transfer::TransferError;
use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::env;
use std::time::Duration;
use tracing::{debug, info};

pub mod transfer_api;

/// ERP API configuration
#[derive(Clone, Debug)]
pub struct ErpConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
}

impl ErpConfig {
    /// Load ERP configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("ERP_BASE_URL")
            .unwrap_or_else(|_| constants::DEFAULT_ERP_BASE_URL.to_string());
        let connect_timeout_secs = env::var("ERP_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::DEFAULT_ERP_CONNECT_TIMEOUT_SECS);

        let base_url = base_url.trim().trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .with_context(|| format!("Invalid ERP_BASE_URL: {base_url}"))?;

        Ok(Self {
            base_url,
            connect_timeout_secs,
        })
    }
}

/// Shared HTTP client for the ERP API
#[derive(Clone)]
pub struct ErpClient {
    http: reqwest::Client,
    config: ErpConfig,
}

impl std::fmt::Debug for ErpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpClient")
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl ErpClient {
    pub fn new(config: ErpConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .context("Failed to build ERP HTTP client")?;

        info!("✅ ERP client configured - Base URL: {}", config.base_url);

        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path.trim_start_matches('/'))
    }

    /// POST without a request body
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransferError> {
        let url = self.endpoint(path);
        debug!(%url, "ERP request");

        let response = self.http.post(&url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    /// POST a JSON body
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, TransferError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path);
        debug!(%url, "ERP request");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}
