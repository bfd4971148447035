//! Data models and structures
//!
//! Defines the asset record handed back to callers, upload inputs and
//! outputs, category transformation profiles, and environment configuration.

use crate::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Storage mechanism that owns an asset's bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Remote,
    Local,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Remote => write!(f, "remote"),
            Backend::Local => write!(f, "local"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Hero,
    Artwork,
    Artist,
    Exhibition,
    #[default]
    Gallery,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Hero,
        Category::Artwork,
        Category::Artist,
        Category::Exhibition,
        Category::Gallery,
    ];

    /// Map a free-form client string onto a known category, defaulting to
    /// [`Category::Gallery`].
    pub fn resolve(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "hero" | "heroes" => Category::Hero,
            "artwork" | "artworks" => Category::Artwork,
            "artist" | "artists" => Category::Artist,
            "exhibition" | "exhibitions" => Category::Exhibition,
            _ => Category::Gallery,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hero => "hero",
            Category::Artwork => "artwork",
            Category::Artist => "artist",
            Category::Exhibition => "exhibition",
            Category::Gallery => "gallery",
        }
    }

    /// Folder under the CDN root that holds assets of this category.
    pub fn folder(&self) -> &'static str {
        match self {
            Category::Hero => "hero",
            Category::Artwork => "artworks",
            Category::Artist => "artists",
            Category::Exhibition => "exhibitions",
            Category::Gallery => "gallery",
        }
    }

    pub fn profile(&self) -> TransformProfile {
        match self {
            Category::Hero => TransformProfile::new(1920, 1080, "fill", Some("auto")),
            Category::Artwork => TransformProfile::new(1600, 1600, "limit", None),
            Category::Artist => TransformProfile::new(800, 800, "fill", Some("face")),
            Category::Exhibition => TransformProfile::new(1200, 800, "fill", Some("auto")),
            Category::Gallery => TransformProfile::new(1200, 1200, "limit", None),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incoming transformation applied by the CDN when an asset is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformProfile {
    pub width: u32,
    pub height: u32,
    pub crop: &'static str,
    pub gravity: Option<&'static str>,
}

impl TransformProfile {
    const fn new(
        width: u32,
        height: u32,
        crop: &'static str,
        gravity: Option<&'static str>,
    ) -> Self {
        Self {
            width,
            height,
            crop,
            gravity,
        }
    }

    /// Render as a CDN transformation string, e.g. `w_1920,h_1080,c_fill,g_auto,q_auto,f_auto`.
    pub fn to_param(&self) -> String {
        let mut parts = vec![
            format!("w_{}", self.width),
            format!("h_{}", self.height),
            format!("c_{}", self.crop),
        ];
        if let Some(gravity) = self.gravity {
            parts.push(format!("g_{}", gravity));
        }
        parts.push("q_auto".to_string());
        parts.push("f_auto".to_string());
        parts.join(",")
    }
}

/// A stored media object tracked by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub identifier: String,
    pub backend: Backend,
    pub url: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

/// Reference to a previously stored asset.
///
/// `Stored` carries the backend tag recorded at creation time. `Url` exists
/// for legacy records that only kept the delivery URL; the backend is then
/// inferred from the URL's host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    Url(String),
    Stored { identifier: String, backend: Backend },
}

impl From<&Asset> for AssetRef {
    fn from(asset: &Asset) -> Self {
        AssetRef::Stored {
            identifier: asset.identifier.clone(),
            backend: asset.backend,
        }
    }
}

pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/avif",
    "image/svg+xml",
];

/// A parsed upload handed over by the multipart layer.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Bytes,
    pub mime_type: String,
    pub original_name: String,
}

impl UploadFile {
    pub fn new(bytes: impl Into<Bytes>, mime_type: &str, original_name: &str) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.to_string(),
            original_name: original_name.to_string(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn validate(&self, max_bytes: u64) -> Result<()> {
        if self.bytes.is_empty() {
            return Err(Error::NoFile);
        }
        if self.size() > max_bytes {
            return Err(Error::Validation(format!(
                "{} is {} bytes, limit is {} bytes",
                self.original_name,
                self.size(),
                max_bytes
            )));
        }
        let mime = self.mime_type.to_ascii_lowercase();
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(Error::Validation(format!(
                "{} has unsupported type {}",
                self.original_name, self.mime_type
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub category: Category,
    pub owner_id: Option<String>,
    /// Dimensions already known to the caller; used for local uploads.
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl UploadOptions {
    pub fn for_category(category: Category) -> Self {
        Self {
            category,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub backend: Backend,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub original_name: String,
    pub error: String,
}

/// Per-file results of a batch upload. Nothing is rolled back on partial failure.
#[derive(Debug, Clone, Serialize, Default)]
pub struct BatchUploadReport {
    pub uploaded: Vec<Asset>,
    pub failed: Vec<FailedUpload>,
}

impl BatchUploadReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub cdn_cloud_name: String,
    pub cdn_api_key: String,
    pub cdn_api_secret: String,
    pub cdn_api_base_url: String,
    pub cdn_delivery_host: String,
    pub cdn_root_folder: String,
    pub cdn_timeout_secs: u64,
    pub database_url: String,
    pub local_url_prefix: String,
    pub max_upload_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cdn_cloud_name: String::new(),
            cdn_api_key: String::new(),
            cdn_api_secret: String::new(),
            cdn_api_base_url: "https://api.cloudinary.com".to_string(),
            cdn_delivery_host: "res.cloudinary.com".to_string(),
            cdn_root_folder: "gallery".to_string(),
            cdn_timeout_secs: 60,
            database_url: "sqlite://gallery.db?mode=rwc".to_string(),
            local_url_prefix: "/api/uploads".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let config = Self {
            cdn_cloud_name: var("CDN_CLOUD_NAME").unwrap_or_default(),
            cdn_api_key: var("CDN_API_KEY").unwrap_or_default(),
            cdn_api_secret: var("CDN_API_SECRET").unwrap_or_default(),
            cdn_api_base_url: var("CDN_API_BASE_URL").unwrap_or(defaults.cdn_api_base_url),
            cdn_delivery_host: var("CDN_DELIVERY_HOST").unwrap_or(defaults.cdn_delivery_host),
            cdn_root_folder: var("CDN_ROOT_FOLDER").unwrap_or(defaults.cdn_root_folder),
            cdn_timeout_secs: parse_var(&var, "CDN_TIMEOUT_SECS", defaults.cdn_timeout_secs)?,
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            local_url_prefix: var("LOCAL_URL_PREFIX").unwrap_or(defaults.local_url_prefix),
            max_upload_bytes: parse_var(&var, "MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the URL codec cannot work with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.cdn_root_folder.trim_matches('/').trim().is_empty() {
            return Err(Error::Config(
                "CDN_ROOT_FOLDER must name at least one folder".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<T, F>(var: &F, name: &str, default: T) -> crate::Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", name, raw))),
        None => Ok(default),
    }
}
