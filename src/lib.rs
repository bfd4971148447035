//! Media asset gateway for the gallery CMS
//!
//! Routes uploaded images to a transformation-capable CDN when credentials are
//! configured, falls back to a local SQLite byte store otherwise, and handles
//! deletion, delivery URLs, and later migration of local files to the CDN.

pub mod cdn;
pub mod error;
pub mod gateway;
pub mod image;
pub mod models;
pub mod selector;
pub mod store;

pub use error::{Error, Result};
pub use gateway::{GatewayServices, GatewaySettings, MediaGateway};
