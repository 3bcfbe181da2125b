//! Delivery URLs for finished artifacts.
//!
//! Artifacts are served from the store's delivery host under
//! `{base}/{cloud}/video/upload/{artifact}.{ext}`. When a signing secret is
//! configured, a short signature segment `s--XXXXXXXX--` is inserted so the
//! delivery host can reject tampered paths.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use vshorts_models::{ContentId, OutputFormat};

/// Length of the signature embedded in signed URLs.
pub const SIGNATURE_LEN: usize = 8;

/// Delivery configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Base URL of the delivery host.
    pub base_url: String,
    /// Account identifier in the store.
    pub cloud_name: String,
    /// Secret for URL signatures; unsigned URLs when absent.
    pub signing_secret: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            base_url: "https://res.cloudinary.com".to_string(),
            cloud_name: "demo".to_string(),
            signing_secret: None,
        }
    }
}

impl DeliveryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("MEDIA_DELIVERY_BASE_URL").unwrap_or(defaults.base_url),
            cloud_name: std::env::var("MEDIA_CLOUD_NAME").unwrap_or(defaults.cloud_name),
            signing_secret: std::env::var("DELIVERY_SIGNING_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }
}

/// A resolved delivery URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryUrl {
    /// The URL to download the artifact from.
    pub url: String,
    /// Content type hint.
    pub content_type: String,
    /// Whether the URL carries a signature.
    pub signed: bool,
}

/// Builds delivery URLs for artifacts in the store.
#[derive(Debug, Clone)]
pub struct DeliveryUrlBuilder {
    config: DeliveryConfig,
}

impl DeliveryUrlBuilder {
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(DeliveryConfig::from_env())
    }

    /// URL for an artifact rendered in `format`.
    pub fn url_for(&self, artifact: &ContentId, format: OutputFormat) -> DeliveryUrl {
        let path = format!("{}.{}", encode_path(artifact.as_str()), format.extension());

        let prefix = format!(
            "{}/{}/video/upload",
            self.config.base_url.trim_end_matches('/'),
            self.config.cloud_name
        );

        let (url, signed) = match &self.config.signing_secret {
            Some(secret) => (
                format!("{}/s--{}--/{}", prefix, sign(&path, secret), path),
                true,
            ),
            None => (format!("{}/{}", prefix, path), false),
        };

        DeliveryUrl {
            url,
            content_type: format.content_type().to_string(),
            signed,
        }
    }
}

/// Short URL-safe signature over a delivery path.
pub fn sign(path: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(secret.as_bytes());
    let digest = URL_SAFE_NO_PAD.encode(hasher.finalize());
    digest[..SIGNATURE_LEN].to_string()
}

/// Percent-encode each path segment; folder separators are kept.
fn encode_path(id: &str) -> String {
    id.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_url() {
        let builder = DeliveryUrlBuilder::new(DeliveryConfig::default());
        let url = builder.url_for(&ContentId::from("final_abc"), OutputFormat::Mp4);
        assert_eq!(url.url, "https://res.cloudinary.com/demo/video/upload/final_abc.mp4");
        assert_eq!(url.content_type, "video/mp4");
        assert!(!url.signed);
    }

    #[test]
    fn test_signed_url_is_deterministic() {
        let builder = DeliveryUrlBuilder::new(DeliveryConfig {
            signing_secret: Some("s3cret".to_string()),
            ..Default::default()
        });
        let a = builder.url_for(&ContentId::from("out"), OutputFormat::Webm);
        let b = builder.url_for(&ContentId::from("out"), OutputFormat::Webm);
        assert_eq!(a, b);
        assert!(a.signed);

        let sig = sign("out.webm", "s3cret");
        assert_eq!(sig.len(), SIGNATURE_LEN);
        assert!(a.url.ends_with(&format!("/s--{}--/out.webm", sig)));
    }

    #[test]
    fn test_signature_depends_on_secret() {
        assert_ne!(sign("out.mp4", "one"), sign("out.mp4", "two"));
    }

    #[test]
    fn test_folder_ids_keep_separators() {
        let builder = DeliveryUrlBuilder::new(DeliveryConfig::default());
        let url = builder.url_for(&ContentId::from("shorts/my clip"), OutputFormat::Mp4);
        assert!(url.url.ends_with("/video/upload/shorts/my%20clip.mp4"));
    }
}
