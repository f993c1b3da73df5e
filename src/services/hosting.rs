//! Image hosting provider client
//!
//! The hosting provider stores uploaded images and renders transformation
//! chains on delivery. Admin calls (metadata, delete, search) use basic auth;
//! uploads are signed with SHA-256 over the sorted parameters.

use crate::config::HostingConfig;
use crate::error::{ImaginariumError, Result, Upstream};
use crate::services::{ensure_success, http_client, read_json};
use crate::types::ImageAsset;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

const SERVICE: Upstream = Upstream::Hosting;

/// Operations the service needs from the image host
#[async_trait]
pub trait HostingProvider: Send + Sync {
    /// Metadata (natural size, delivery URL) for an uploaded image
    async fn resource(&self, public_id: &str) -> Result<ImageAsset>;

    /// Upload PNG bytes and return the new asset
    async fn upload_png(&self, png: &[u8]) -> Result<ImageAsset>;

    /// Delete uploaded images; unknown ids are ignored by the host
    async fn delete_resources(&self, public_ids: &[String]) -> Result<()>;

    /// Search with the host's expression language
    async fn search(&self, expression: &str) -> Result<Vec<ImageAsset>>;

    /// Delivery URL applying `transformation` to `public_id`
    fn build_url(&self, public_id: &str, transformation: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct ResourceBody {
    public_id: String,
    width: u32,
    height: u32,
    secure_url: String,
}

impl From<ResourceBody> for ImageAsset {
    fn from(body: ResourceBody) -> Self {
        Self {
            public_id: body.public_id,
            width: body.width,
            height: body.height,
            secure_url: body.secure_url,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    resources: Vec<ResourceBody>,
}

/// HTTP client for a Cloudinary-compatible host
#[derive(Debug, Clone)]
pub struct CloudinaryClient {
    client: Client,
    config: HostingConfig,
}

impl CloudinaryClient {
    /// Create a client for the configured cloud
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(config: HostingConfig, timeout: Duration) -> Result<Self> {
        let client = http_client(SERVICE, timeout)?;
        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            path
        )
    }

    /// Signature over `params` sorted by key, as the upload API expects
    fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let joined = sorted
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait]
impl HostingProvider for CloudinaryClient {
    async fn resource(&self, public_id: &str) -> Result<ImageAsset> {
        let url = self.api_url(&format!("resources/image/upload/{public_id}"));
        tracing::debug!(public_id, "Fetching resource metadata");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .send()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "resource lookup", &e))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ImaginariumError::not_found(format!("hosted image '{public_id}'")));
        }

        let body: ResourceBody = read_json(SERVICE, "resource lookup", response).await?;
        Ok(body.into())
    }

    async fn upload_png(&self, png: &[u8]) -> Result<ImageAsset> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signed = [
            ("folder", self.config.folder.clone()),
            ("timestamp", timestamp),
        ];
        let signature = self.sign(&signed);

        let data_uri = format!("data:image/png;base64,{}", STANDARD.encode(png));
        let mut form: Vec<(&str, String)> = signed.to_vec();
        form.push(("file", data_uri));
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature_algorithm", "sha256".to_string()));
        form.push(("signature", signature));

        tracing::debug!(bytes = png.len(), folder = %self.config.folder, "Uploading PNG");
        let response = self
            .client
            .post(self.api_url("image/upload"))
            .form(&form)
            .send()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "upload", &e))?;

        let body: ResourceBody = read_json(SERVICE, "upload", response).await?;
        tracing::info!(public_id = %body.public_id, "Uploaded image");
        Ok(body.into())
    }

    async fn delete_resources(&self, public_ids: &[String]) -> Result<()> {
        if public_ids.is_empty() {
            return Ok(());
        }
        let query: Vec<(&str, &str)> = public_ids
            .iter()
            .map(|id| ("public_ids[]", id.as_str()))
            .collect();

        let response = self
            .client
            .delete(self.api_url("resources/image/upload"))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .query(&query)
            .send()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "delete", &e))?;

        ensure_success(SERVICE, "delete", response).await?;
        tracing::info!(count = public_ids.len(), "Deleted hosted images");
        Ok(())
    }

    async fn search(&self, expression: &str) -> Result<Vec<ImageAsset>> {
        tracing::debug!(expression, "Searching hosted images");
        let response = self
            .client
            .post(self.api_url("resources/search"))
            .basic_auth(&self.config.api_key, Some(&self.config.api_secret))
            .json(&serde_json::json!({ "expression": expression, "max_results": 500 }))
            .send()
            .await
            .map_err(|e| ImaginariumError::network_error(SERVICE, "search", &e))?;

        let body: SearchBody = read_json(SERVICE, "search", response).await?;
        Ok(body.resources.into_iter().map(ImageAsset::from).collect())
    }

    fn build_url(&self, public_id: &str, transformation: &str) -> String {
        let base = format!(
            "{}/{}/image/upload",
            self.config.delivery_base.trim_end_matches('/'),
            self.config.cloud_name
        );
        if transformation.is_empty() {
            format!("{base}/{public_id}")
        } else {
            format!("{base}/{transformation}/{public_id}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CloudinaryClient {
        let config = HostingConfig {
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            ..HostingConfig::default()
        };
        CloudinaryClient::new(config, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_build_url() {
        let client = client();
        assert_eq!(
            client.build_url("imaginarium/bg", "c_scale,w_1280,h_853/e_blur:1"),
            "https://res.cloudinary.com/demo/image/upload/c_scale,w_1280,h_853/e_blur:1/imaginarium/bg"
        );
        assert_eq!(
            client.build_url("bg", ""),
            "https://res.cloudinary.com/demo/image/upload/bg"
        );
    }

    #[test]
    fn test_signature_ignores_param_order() {
        let client = client();
        let a = client.sign(&[("timestamp", "1".to_string()), ("folder", "x".to_string())]);
        let b = client.sign(&[("folder", "x".to_string()), ("timestamp", "1".to_string())]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut hasher = Sha256::new();
        hasher.update(b"folder=x&timestamp=1secret");
        assert_eq!(a, format!("{:x}", hasher.finalize()));
    }

    #[test]
    fn test_api_url() {
        assert_eq!(
            client().api_url("resources/search"),
            "https://api.cloudinary.com/v1_1/demo/resources/search"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_upstream_error() {
        let config = HostingConfig {
            cloud_name: "demo".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            ..HostingConfig::default()
        };
        let client = CloudinaryClient::new(config, Duration::from_secs(2)).unwrap();
        let err = client.resource("anything").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
