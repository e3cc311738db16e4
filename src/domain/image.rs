//! Binary asset references stored in snapshots.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Largest attachment that is inlined as base64 during capture (8 MiB).
pub const MAX_INLINE_ATTACHMENT_BYTES: usize = 8 * 1024 * 1024;

/// Raster image extensions eligible for inlining.
pub const RASTER_EXTENSIONS: [&str; 9] = [
    "png", "jpg", "jpeg", "jpe", "jif", "jfif", "jfi", "gif", "webp",
];

/// Image payload handed to the remote platform: either a URL the platform
/// downloads itself or raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageData {
    /// Remote URL.
    Url(String),
    /// Decoded binary content.
    Bytes(Vec<u8>),
}

/// An image captured as its remote URL and, optionally, its inlined bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// URL at capture time.
    pub url: String,
    /// Base64 content when images were inlined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
}

impl ImageRecord {
    /// Creates a URL-only record.
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            base64: None,
        }
    }

    /// Returns the payload to upload: inlined bytes when present and
    /// decodable, the URL otherwise.
    #[must_use]
    pub fn to_image_data(&self) -> ImageData {
        self.base64
            .as_deref()
            .and_then(decode_base64)
            .map_or_else(|| ImageData::Url(self.url.clone()), ImageData::Bytes)
    }
}

/// Encodes bytes with the standard base64 alphabet.
#[must_use]
pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard base64, returning `None` on malformed input.
#[must_use]
pub fn decode_base64(encoded: &str) -> Option<Vec<u8>> {
    STANDARD.decode(encoded).ok()
}

/// Returns `true` if the URL (query string ignored) ends in a raster image
/// extension.
#[must_use]
pub fn is_raster_image_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        let ext = ext.to_ascii_lowercase();
        RASTER_EXTENSIONS.contains(&ext.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_inlined_bytes() {
        let record = ImageRecord {
            url: "https://cdn.example/icon.png".into(),
            base64: Some(encode_base64(b"png-bytes")),
        };
        assert_eq!(record.to_image_data(), ImageData::Bytes(b"png-bytes".to_vec()));
    }

    #[test]
    fn falls_back_to_url_on_bad_base64() {
        let record = ImageRecord {
            url: "https://cdn.example/icon.png".into(),
            base64: Some("***".into()),
        };
        assert_eq!(
            record.to_image_data(),
            ImageData::Url("https://cdn.example/icon.png".into())
        );
    }

    #[test]
    fn raster_detection() {
        assert!(is_raster_image_url("https://cdn.example/a/b.JPG"));
        assert!(is_raster_image_url("https://cdn.example/a/b.webp?size=64"));
        assert!(!is_raster_image_url("https://cdn.example/a/b.pdf"));
        assert!(!is_raster_image_url("https://cdn.example/a/noext"));
    }
}
