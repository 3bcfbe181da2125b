//! Media store client implementation.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use vshorts_models::{Asset, AssetSource, ContentId, UploadReceipt};

use crate::error::{StorageError, StorageResult};
use crate::progress::UploadProgress;

/// Default maximum asset size (100 MiB).
pub const DEFAULT_MAX_ASSET_BYTES: u64 = 100 * 1024 * 1024;

/// Default size of the chunks handed to the transport.
pub const DEFAULT_CHUNK_BYTES: usize = 256 * 1024;

/// Configuration for the media store client.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upload API base URL
    pub api_base_url: String,
    /// Account identifier in the store
    pub cloud_name: String,
    /// API key, only needed for signed requests
    pub api_key: Option<String>,
    /// API secret, only needed for signed requests
    pub api_secret: Option<String>,
    /// Unsigned upload preset
    pub upload_preset: String,
    /// Assets above this size are rejected locally
    pub max_asset_bytes: u64,
    /// Chunk size used when streaming the payload
    pub chunk_bytes: usize,
    /// Whole-request timeout for an upload
    pub timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.cloudinary.com".to_string(),
            cloud_name: "demo".to_string(),
            api_key: None,
            api_secret: None,
            upload_preset: "ml_default".to_string(),
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            timeout: Duration::from_secs(600),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: std::env::var("MEDIA_API_BASE_URL").unwrap_or(defaults.api_base_url),
            cloud_name: std::env::var("MEDIA_CLOUD_NAME").unwrap_or(defaults.cloud_name),
            api_key: std::env::var("MEDIA_API_KEY").ok(),
            api_secret: std::env::var("MEDIA_API_SECRET").ok(),
            upload_preset: std::env::var("MEDIA_UPLOAD_PRESET").unwrap_or(defaults.upload_preset),
            max_asset_bytes: std::env::var("MAX_ASSET_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_asset_bytes),
            chunk_bytes: std::env::var("UPLOAD_CHUNK_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.chunk_bytes),
            timeout: Duration::from_secs(
                std::env::var("UPLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/v1_1/{}/video/upload",
            self.api_base_url.trim_end_matches('/'),
            self.cloud_name
        )
    }
}

/// Store response to a successful upload.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    bytes: Option<u64>,
}

type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Client for the remote media store.
#[derive(Clone)]
pub struct StoreClient {
    http: Client,
    config: StoreConfig,
}

impl StoreClient {
    /// Create a new store client from configuration.
    pub fn new(config: StoreConfig) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::config_error(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(StoreConfig::from_env())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Reject assets the store must never see.
    ///
    /// Runs without touching the payload or the network.
    pub fn check_asset(&self, asset: &Asset) -> StorageResult<()> {
        if matches!(asset.source(), AssetSource::Text(_)) {
            return Err(StorageError::UnsupportedAsset(
                "text assets are rendered, not uploaded".to_string(),
            ));
        }
        if asset.size_bytes() > self.config.max_asset_bytes {
            return Err(StorageError::too_large(
                asset.size_bytes(),
                self.config.max_asset_bytes,
            ));
        }
        Ok(())
    }

    /// Upload a video asset and return the store's identifier for it.
    ///
    /// `on_progress` receives strictly increasing percentages; 100 is only
    /// reported after the store answered with a success status. No retry is
    /// attempted on failure.
    pub async fn upload<F>(&self, asset: &Asset, on_progress: F) -> StorageResult<UploadReceipt>
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.check_asset(asset)?;

        let started = Instant::now();
        let (payload, total) = self.payload_stream(asset).await?;
        let progress = Arc::new(Mutex::new(UploadProgress::new(total, on_progress)));
        if let Ok(mut p) = progress.lock() {
            p.start();
        }

        debug!(
            "Uploading {} ({:.1}MB) to {}",
            asset.name(),
            asset.size_mb(),
            self.config.upload_url()
        );

        let tracker = Arc::clone(&progress);
        let body = payload.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                if let Ok(mut p) = tracker.lock() {
                    p.advance(bytes.len() as u64);
                }
            }
            chunk
        });

        let part = Part::stream_with_length(Body::wrap_stream(body), total)
            .file_name(asset.name().to_string())
            .mime_str(asset.content_type())
            .map_err(|e| StorageError::config_error(e.to_string()))?;

        let form = Form::new()
            .text("upload_preset", self.config.upload_preset.clone())
            .text("resource_type", "video")
            .part("file", part);

        let response = self
            .http
            .post(self.config.upload_url())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Upload of {} rejected by store: {}", asset.name(), status);
            return Err(StorageError::upload_failed(
                Some(status.as_u16()),
                format!("Store returned {}: {}", status, body),
            ));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(e.to_string()))?;

        if let Ok(mut p) = progress.lock() {
            p.complete();
        }

        info!(
            "Uploaded {} as {} in {}ms",
            asset.name(),
            parsed.public_id,
            started.elapsed().as_millis()
        );

        Ok(UploadReceipt {
            content_id: ContentId::from(parsed.public_id),
            secure_url: parsed.secure_url,
            bytes: parsed.bytes,
        })
    }

    /// Open the payload and return it with its length.
    ///
    /// File assets are measured again through the opened handle; a file whose
    /// length no longer matches the size it was loaded with is rejected rather
    /// than sent truncated.
    async fn payload_stream(&self, asset: &Asset) -> StorageResult<(ByteStream, u64)> {
        let chunk = self.config.chunk_bytes.max(1);
        match asset.source() {
            AssetSource::Memory(data) => {
                let chunks: Vec<io::Result<Bytes>> = (0..data.len())
                    .step_by(chunk)
                    .map(|start| Ok(data.slice(start..(start + chunk).min(data.len()))))
                    .collect();
                Ok((Box::pin(stream::iter(chunks)), data.len() as u64))
            }
            AssetSource::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                let len = file.metadata().await?.len();
                if len > self.config.max_asset_bytes {
                    return Err(StorageError::too_large(len, self.config.max_asset_bytes));
                }
                if len != asset.size_bytes() {
                    return Err(StorageError::UnsupportedAsset(format!(
                        "{} changed size since it was loaded ({} bytes, now {})",
                        asset.name(),
                        asset.size_bytes(),
                        len
                    )));
                }
                let reader = file.take(len);
                Ok((Box::pin(ReaderStream::with_capacity(reader, chunk)), len))
            }
            AssetSource::Text(_) => Err(StorageError::UnsupportedAsset(
                "text assets are rendered, not uploaded".to_string(),
            )),
        }
    }
}

/// Build a video asset from a file, reading only its metadata.
pub async fn load_video_asset(path: impl AsRef<Path>) -> StorageResult<Asset> {
    let path = path.as_ref();
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(StorageError::UnsupportedAsset(format!(
            "{} is not a file",
            path.display()
        )));
    }
    Ok(Asset::video_file(path, metadata.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> StoreConfig {
        StoreConfig {
            api_base_url: server.uri(),
            cloud_name: "demo".to_string(),
            chunk_bytes: 1024,
            ..Default::default()
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<u8>>>, impl FnMut(u8) + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |p| sink.lock().unwrap().push(p))
    }

    #[test]
    fn test_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.max_asset_bytes, 100 * 1024 * 1024);
        assert_eq!(config.upload_url(), "https://api.cloudinary.com/v1_1/demo/video/upload");
    }

    #[tokio::test]
    async fn test_upload_success_reports_progress_to_hundred() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1_1/demo/video/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "abc123",
                "secure_url": "https://cdn.example.com/abc123.mp4",
                "bytes": 8192
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = StoreClient::new(config_for(&server)).unwrap();
        let asset = Asset::video_bytes("clip.mp4", vec![7u8; 8192]);
        let (seen, on_progress) = recorder();

        let receipt = client.upload(&asset, on_progress).await.unwrap();
        assert_eq!(receipt.content_id.as_str(), "abc123");
        assert_eq!(receipt.bytes, Some(8192));

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&0));
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_upload_non_2xx_is_upload_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1_1/demo/video/upload"))
            .respond_with(ResponseTemplate::new(500).set_body_string("store exploded"))
            .expect(1)
            .mount(&server)
            .await;

        let client = StoreClient::new(config_for(&server)).unwrap();
        let asset = Asset::video_bytes("clip.mp4", vec![1u8; 4096]);
        let (seen, on_progress) = recorder();

        let err = client.upload(&asset, on_progress).await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("store exploded"));
        assert!(!seen.lock().unwrap().contains(&100));
    }

    #[tokio::test]
    async fn test_oversized_asset_never_reaches_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.max_asset_bytes = 1024;
        let client = StoreClient::new(config).unwrap();
        let asset = Asset::video_bytes("big.mp4", vec![0u8; 2048]);
        let (seen, on_progress) = recorder();

        let err = client.upload(&asset, on_progress).await.unwrap_err();
        assert!(matches!(err, StorageError::AssetTooLarge { .. }));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_text_asset_rejected() {
        let client = StoreClient::new(StoreConfig::default()).unwrap();
        let err = client
            .upload(&Asset::text("hello world"), |_| {})
            .await
            .unwrap_err();
        assert!(err.is_rejected_locally());
    }

    #[tokio::test]
    async fn test_upload_streams_file_asset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1_1/demo/video/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "public_id": "from_disk"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
        file.write_all(&vec![3u8; 5000]).unwrap();
        file.flush().unwrap();

        let asset = load_video_asset(file.path()).await.unwrap();
        assert_eq!(asset.size_bytes(), 5000);
        assert_eq!(asset.content_type(), "video/mp4");

        let client = StoreClient::new(config_for(&server)).unwrap();
        let receipt = client.upload(&asset, |_| {}).await.unwrap();
        assert_eq!(receipt.content_id.as_str(), "from_disk");
        assert_eq!(receipt.secure_url, None);
    }

    #[tokio::test]
    async fn test_file_grown_past_limit_is_rejected_at_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "public_id": "x" })))
            .expect(0)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![1u8; 2000]).unwrap();
        file.flush().unwrap();
        let asset = load_video_asset(file.path()).await.unwrap();

        file.write_all(&vec![2u8; 8000]).unwrap();
        file.flush().unwrap();

        let mut config = config_for(&server);
        config.max_asset_bytes = 4000;
        let client = StoreClient::new(config).unwrap();
        let (seen, on_progress) = recorder();

        let err = client.upload(&asset, on_progress).await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::AssetTooLarge { size_bytes: 10_000, max_bytes: 4000, .. }
        ));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_size_mismatch_is_not_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "public_id": "x" })))
            .expect(0)
            .mount(&server)
            .await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![1u8; 3000]).unwrap();
        file.flush().unwrap();
        // Declared size disagrees with the file on disk.
        let asset = Asset::video_file(file.path(), 1000);

        let client = StoreClient::new(config_for(&server)).unwrap();
        let err = client.upload(&asset, |_| {}).await.unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedAsset(ref msg) if msg.contains("changed size")));
    }

    #[tokio::test]
    async fn test_load_video_asset_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_video_asset(dir.path().join("nope.mp4")).await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
