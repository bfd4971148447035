//! Image inspection
//!
//! Reads dimensions and container format from an image header without
//! decoding pixel data. Used to fill in metadata for local uploads, which
//! get no report back from a CDN.

use image::ImageReader;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: String,
}

/// Best-effort probe; returns `None` for unknown or truncated data.
pub fn probe(data: &[u8]) -> Option<ImageInfo> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?;
    let format = reader.format()?;
    let extension = format.extensions_str().first()?.to_string();

    match reader.into_dimensions() {
        Ok((width, height)) => Some(ImageInfo {
            width,
            height,
            format: extension,
        }),
        Err(e) => {
            tracing::debug!("Could not read image dimensions: {}", e);
            None
        }
    }
}
