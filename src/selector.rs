//! Backend selection
//!
//! Decides once, from configuration, whether the CDN backend is usable. The
//! decision is a plain value handed to the gateway at construction.

use crate::models::{Backend, Config};

/// The three credential fields the CDN backend needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl RemoteCredentials {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cloud_name: config.cdn_cloud_name.trim().to_string(),
            api_key: config.cdn_api_key.trim().to_string(),
            api_secret: config.cdn_api_secret.trim().to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendSelection {
    remote_available: bool,
}

impl BackendSelection {
    pub fn new(remote_available: bool) -> Self {
        Self { remote_available }
    }

    pub fn from_credentials(credentials: &RemoteCredentials) -> Self {
        Self::new(credentials.is_complete())
    }

    pub fn remote_available(&self) -> bool {
        self.remote_available
    }

    pub fn preferred(&self) -> Backend {
        if self.remote_available {
            Backend::Remote
        } else {
            Backend::Local
        }
    }
}
