//! Conversion between CDN delivery URLs and public ids.
//!
//! Delivery URLs have the shape
//! `https://{host}/{cloud}/image/upload/[{transformations}/][v{version}/]{public_id}.{ext}`.
//! Everything here is pure string work; no network calls are made.

use url::Url;

/// Delivery-time transformation options. Quality and format fall back to `auto`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub crop: Option<String>,
    pub gravity: Option<String>,
    pub quality: Option<String>,
    pub format: Option<String>,
}

impl DeliveryOptions {
    pub fn to_param(&self) -> String {
        let mut parts = Vec::new();
        if let Some(width) = self.width {
            parts.push(format!("w_{}", width));
        }
        if let Some(height) = self.height {
            parts.push(format!("h_{}", height));
        }
        if let Some(crop) = &self.crop {
            parts.push(format!("c_{}", crop));
        }
        if let Some(gravity) = &self.gravity {
            parts.push(format!("g_{}", gravity));
        }
        parts.push(format!("q_{}", self.quality.as_deref().unwrap_or("auto")));
        parts.push(format!("f_{}", self.format.as_deref().unwrap_or("auto")));
        parts.join(",")
    }
}

#[derive(Debug, Clone)]
pub struct CdnUrlCodec {
    delivery_host: String,
    cloud_name: String,
    root_folder: Vec<String>,
}

impl CdnUrlCodec {
    pub fn new(delivery_host: &str, cloud_name: &str, root_folder: &str) -> Self {
        Self {
            delivery_host: delivery_host.trim().trim_end_matches('/').to_ascii_lowercase(),
            cloud_name: cloud_name.to_string(),
            root_folder: root_folder
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn root_folder(&self) -> String {
        self.root_folder.join("/")
    }

    /// True iff `url` is absolute and served from the CDN host or one of its subdomains.
    pub fn is_remote_url(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        match parsed.host_str() {
            Some(host) => {
                let host = host.to_ascii_lowercase();
                host == self.delivery_host || host.ends_with(&format!(".{}", self.delivery_host))
            }
            None => false,
        }
    }

    /// Recover the public id from a delivery URL.
    ///
    /// Returns `None` for non-CDN URLs and for paths without the root folder.
    pub fn extract_public_id(&self, url: &str) -> Option<String> {
        if !self.is_remote_url(url) || self.root_folder.is_empty() {
            return None;
        }
        let parsed = Url::parse(url).ok()?;
        let segments: Vec<&str> = parsed
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .collect();

        // Start searching after `upload` so a cloud named like the root folder is skipped.
        let search_from = segments
            .iter()
            .position(|segment| *segment == "upload")
            .map(|i| i + 1)
            .unwrap_or(0);
        let width = self.root_folder.len();
        let start = (search_from..segments.len().saturating_sub(width))
            .find(|&i| {
                segments[i..i + width]
                    .iter()
                    .zip(&self.root_folder)
                    .all(|(a, b)| *a == b.as_str())
            })?;

        let mut tail: Vec<&str> = segments[start..].to_vec();
        let last = tail.pop()?;
        let stem = last.split('.').next().unwrap_or(last);
        if stem.is_empty() {
            return None;
        }
        tail.push(stem);
        Some(tail.join("/"))
    }

    /// Delivery URL for a public id with the given transformations applied.
    pub fn build_url(&self, public_id: &str, options: &DeliveryOptions) -> String {
        format!(
            "https://{}/{}/image/upload/{}/{}",
            self.delivery_host,
            self.cloud_name,
            options.to_param(),
            public_id.trim_start_matches('/')
        )
    }

    /// Delivery URL for the stored original, without transformations.
    pub fn build_plain_url(&self, public_id: &str) -> String {
        format!(
            "https://{}/{}/image/upload/{}",
            self.delivery_host,
            self.cloud_name,
            public_id.trim_start_matches('/')
        )
    }
}
