use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::core::config::{ContentBackend, Settings};

/// Immutable, content-addressed JSON storage.
#[async_trait]
pub(crate) trait ContentStore: Send + Sync {
    async fn upload_json(&self, name: &str, value: &Value) -> Result<String>;
    async fn fetch_json(&self, content_ref: &str) -> Result<Value>;
    fn resolve(&self, content_ref: &str) -> String;
}

pub(crate) fn from_settings(settings: &Settings) -> Result<Arc<dyn ContentStore>> {
    match settings.content().backend {
        ContentBackend::Pinata => Ok(Arc::new(PinataStore::from_settings(settings)?)),
        ContentBackend::Memory => {
            tracing::warn!("Using in-memory content storage; blobs are lost on restart");
            Ok(Arc::new(MemoryContentStore::new("memory://")))
        }
    }
}

pub(crate) fn validate_content_ref(content_ref: &str) -> Result<()> {
    let valid = !content_ref.is_empty()
        && content_ref.len() <= 128
        && content_ref.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(anyhow!("Invalid content reference: {content_ref}"))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PinataStore {
    client: Client,
    jwt: String,
    upload_url: String,
    gateway_base: String,
    gateway_token: String,
}

impl PinataStore {
    pub(crate) fn from_settings(settings: &Settings) -> Result<Self> {
        let content = settings.content();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(20))
            .timeout(Duration::from_secs(content.request_timeout))
            .build()
            .context("Failed to build Pinata HTTP client")?;

        Ok(Self {
            client,
            jwt: content.pinata_jwt.clone(),
            upload_url: content.pinata_upload_url.clone(),
            gateway_base: content.gateway_base(),
            gateway_token: content.pinata_gateway_token.clone(),
        })
    }
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn upload_json(&self, name: &str, value: &Value) -> Result<String> {
        let bytes = serde_json::to_vec(value).context("Failed to serialize blob")?;
        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str("application/json")
            .context("Invalid blob MIME type")?;
        let form = Form::new().text("network", "public").part("file", part);

        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(&self.jwt)
            .multipart(form)
            .send()
            .await
            .context("Failed to call Pinata upload API")?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        if !status.is_success() {
            bail!("Pinata upload failed (status {status}): {body}");
        }

        let cid = body
            .get("data")
            .and_then(|data| data.get("cid"))
            .or_else(|| body.get("IpfsHash"))
            .and_then(Value::as_str)
            .context("Pinata upload response missing cid")?
            .to_string();

        tracing::info!(name, cid = %cid, size, "Uploaded blob to IPFS");
        Ok(cid)
    }

    async fn fetch_json(&self, content_ref: &str) -> Result<Value> {
        validate_content_ref(content_ref)?;
        let mut request = self.client.get(self.resolve(content_ref));
        if !self.gateway_token.is_empty() {
            request = request.query(&[("pinataGatewayToken", self.gateway_token.as_str())]);
        }

        let response = request.send().await.context("Failed to call IPFS gateway")?;
        let status = response.status();
        if !status.is_success() {
            bail!("IPFS gateway returned status {status} for {content_ref}");
        }

        response.json().await.context("IPFS blob is not valid JSON")
    }

    fn resolve(&self, content_ref: &str) -> String {
        format!("{}/ipfs/{content_ref}", self.gateway_base)
    }
}

/// Local backend addressing blobs by the SHA-256 of their serialized form.
#[derive(Debug, Default)]
pub(crate) struct MemoryContentStore {
    base_url: String,
    blobs: RwLock<HashMap<String, Value>>,
}

impl MemoryContentStore {
    pub(crate) fn new(base_url: &str) -> Self {
        Self { base_url: base_url.to_string(), blobs: RwLock::new(HashMap::new()) }
    }

    pub(crate) fn content_ref_for(bytes: &[u8]) -> String {
        format!("sha256-{}", hex::encode(Sha256::digest(bytes)))
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload_json(&self, name: &str, value: &Value) -> Result<String> {
        let bytes = serde_json::to_vec(value).context("Failed to serialize blob")?;
        let content_ref = Self::content_ref_for(&bytes);

        let mut blobs = self.blobs.write().await;
        blobs.entry(content_ref.clone()).or_insert_with(|| value.clone());
        tracing::debug!(name, content_ref = %content_ref, "Stored blob in memory");

        Ok(content_ref)
    }

    async fn fetch_json(&self, content_ref: &str) -> Result<Value> {
        validate_content_ref(content_ref)?;
        self.blobs
            .read()
            .await
            .get(content_ref)
            .cloned()
            .ok_or_else(|| anyhow!("Content {content_ref} not found"))
    }

    fn resolve(&self, content_ref: &str) -> String {
        format!("{}{content_ref}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_is_content_addressed() {
        let store = MemoryContentStore::new("memory://");
        let blob = json!({"examTitle": "Quiz", "questions": []});

        let first = store.upload_json("a.json", &blob).await.unwrap();
        let second = store.upload_json("b.json", &blob).await.unwrap();
        let other = store.upload_json("c.json", &json!({"examTitle": "Other"})).await.unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(first.starts_with("sha256-"));
        assert_eq!(store.fetch_json(&first).await.unwrap(), blob);
        assert_eq!(store.resolve(&first), format!("memory://{first}"));
    }

    #[tokio::test]
    async fn memory_store_reports_missing_content() {
        let store = MemoryContentStore::new("memory://");
        assert!(store.fetch_json("sha256-deadbeef").await.is_err());
    }

    #[test]
    fn content_refs_reject_path_characters() {
        assert!(validate_content_ref("bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi")
            .is_ok());
        assert!(validate_content_ref("../etc/passwd").is_err());
        assert!(validate_content_ref("").is_err());
    }
}
