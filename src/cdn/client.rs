use super::{CdnService, RemoteUpload, RemoteUploadRequest};
use crate::selector::RemoteCredentials;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

/// HTTP client for the CDN's signed upload API.
///
/// Requests are signed with SHA-256, so the CDN account must be configured
/// for SHA-256 signatures.
pub struct CdnClient {
    client: Client,
    credentials: RemoteCredentials,
    api_base_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CdnClient {
    pub fn new(
        credentials: RemoteCredentials,
        api_base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(credentials, api_base_url, client))
    }

    pub fn new_with_client(
        credentials: RemoteCredentials,
        api_base_url: String,
        client: Client,
    ) -> Self {
        Self {
            client,
            credentials,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/v1_1/{}/image/{}",
            self.api_base_url, self.credentials.cloud_name, action
        )
    }

    /// Sign the sorted `key=value` pairs followed by the API secret.
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let to_sign = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.credentials.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    async fn read_body(response: reqwest::Response, action: &str) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            tracing::error!("CDN {} error (status {}): {}", action, status, message);
            return Err(Error::Cdn(format!(
                "{} failed (status {}): {}",
                action, status, message
            )));
        }
        Ok(body)
    }
}

#[async_trait]
impl CdnService for CdnClient {
    async fn upload(&self, request: &RemoteUploadRequest) -> Result<RemoteUpload> {
        let mut params = BTreeMap::new();
        params.insert("public_id", request.public_id.clone());
        params.insert("timestamp", Self::timestamp());
        params.insert("transformation", request.profile.to_param());
        let signature = self.sign(&params);

        let file = Part::bytes(request.bytes.to_vec())
            .file_name(request.original_name.clone())
            .mime_str(&request.mime_type)?;
        let mut form = Form::new()
            .text("api_key", self.credentials.api_key.clone())
            .text("signature", signature)
            .part("file", file);
        for (key, value) in params {
            form = form.text(key, value);
        }

        tracing::debug!("Uploading {} to CDN as {}", request.original_name, request.public_id);

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send upload to CDN: {}", e);
                e
            })?;

        let body = Self::read_body(response, "upload").await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("Failed to parse CDN upload response: {}\nBody: {}", e, body);
            Error::Cdn(format!("Malformed upload response: {}", e))
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<bool> {
        let mut params = BTreeMap::new();
        params.insert("invalidate", "true".to_string());
        params.insert("public_id", public_id.to_string());
        params.insert("timestamp", Self::timestamp());
        let signature = self.sign(&params);
        params.insert("api_key", self.credentials.api_key.clone());
        params.insert("signature", signature);

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send destroy to CDN: {}", e);
                e
            })?;

        let body = Self::read_body(response, "destroy").await?;
        let parsed: DestroyResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Cdn(format!("Malformed destroy response: {}", e)))?;
        if parsed.result != "ok" {
            tracing::warn!("CDN destroy of {} returned '{}'", public_id, parsed.result);
        }
        Ok(parsed.result == "ok")
    }
}
