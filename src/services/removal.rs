//! Background removal API client

use crate::config::RemovalApiConfig;
use crate::error::{ImaginariumError, Result, Upstream};
use crate::services::{ensure_success, http_client};
use crate::types::Dimensions;
use async_trait::async_trait;
use image::ImageFormat;
use reqwest::Client;
use std::time::Duration;

const SERVICE: Upstream = Upstream::BackgroundRemoval;

/// Removes the background from a hosted image
#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// Fetch `image_url` through the removal service and return PNG bytes
    async fn remove_background(&self, image_url: &str) -> Result<Vec<u8>>;
}

/// Decode `bytes` as PNG and return its size
///
/// # Errors
/// - Bytes are not a PNG (`UpstreamUnavailable`, the provider sent garbage)
/// - Decoded image has a zero dimension
pub fn validate_png(bytes: &[u8]) -> Result<Dimensions> {
    let image = image::load_from_memory_with_format(bytes, ImageFormat::Png).map_err(|e| {
        ImaginariumError::upstream(SERVICE, format!("response is not a readable PNG: {e}"))
    })?;
    let dimensions = Dimensions::new(image.width(), image.height());
    dimensions.validate()?;
    Ok(dimensions)
}

/// Client for a remove.bg-compatible API
#[derive(Debug, Clone)]
pub struct RemoveBgClient {
    client: Client,
    config: RemovalApiConfig,
}

impl RemoveBgClient {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(config: RemovalApiConfig, timeout: Duration) -> Result<Self> {
        let client = http_client(SERVICE, timeout)?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl BackgroundRemover for RemoveBgClient {
    async fn remove_background(&self, image_url: &str) -> Result<Vec<u8>> {
        tracing::debug!(image_url, "Requesting background removal");
        let response = self
            .client
            .post(&self.config.endpoint)
            .header("X-Api-Key", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "image/png")
            .json(&serde_json::json!({ "image_url": image_url, "size": "auto" }))
            .send()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "remove background", &e))?;

        let response = ensure_success(SERVICE, "remove background", response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "read result", &e))?;

        let dimensions = validate_png(&bytes)?;
        tracing::info!(
            width = dimensions.width,
            height = dimensions.height,
            "Background removed"
        );
        Ok(bytes.to_vec())
    }
}
