//! CDN integration for image assets
//!
//! Handles uploading images to a transformation-capable CDN object store,
//! destroying them again, and converting between delivery URLs and the
//! CDN's public ids.

pub mod client;
pub mod codec;
pub mod mock;

pub use client::CdnClient;
pub use codec::{CdnUrlCodec, DeliveryOptions};
pub use mock::MockCdnClient;

use crate::models::TransformProfile;
use crate::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

pub struct RemoteUploadRequest {
    pub bytes: Bytes,
    pub mime_type: String,
    pub original_name: String,
    /// Full public id including folders, e.g. `gallery/hero/sunset_1a2b3c4d`.
    pub public_id: String,
    pub profile: TransformProfile,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RemoteUpload {
    pub public_id: String,
    pub secure_url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
}

#[async_trait]
pub trait CdnService: Send + Sync {
    async fn upload(&self, request: &RemoteUploadRequest) -> Result<RemoteUpload>;
    /// Returns `true` when the CDN confirmed the asset was removed.
    async fn destroy(&self, public_id: &str) -> Result<bool>;
}

/// Build a public id for a new upload under `{root}/{category folder}`.
///
/// The filename stem is reduced to `[a-z0-9_-]` and suffixed with a short
/// random token so repeated uploads of the same file do not collide.
pub fn public_id_for(root_folder: &str, folder: &str, original_name: &str) -> String {
    let stem = original_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original_name);
    let mut slug: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    slug.truncate(64);
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "image" } else { slug };

    let token = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}/{}/{}_{}",
        root_folder.trim_matches('/'),
        folder,
        slug,
        &token[..8]
    )
}
