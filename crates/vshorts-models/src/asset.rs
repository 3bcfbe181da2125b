//! Submitted assets and the identifiers the remote store hands back.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Kind of media carried by an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Binary video payload
    Video,
    /// Free-form text for the text rendering stage
    Text,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Text => "text",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an asset's payload lives.
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Payload held in memory.
    Memory(Bytes),
    /// Payload on disk, streamed at upload time.
    File(PathBuf),
    /// Free-form text.
    Text(String),
}

/// Raw input submitted by a user.
///
/// The size is fixed at construction so that size limits can be enforced
/// without touching the payload.
#[derive(Debug, Clone)]
pub struct Asset {
    name: String,
    kind: MediaKind,
    size_bytes: u64,
    source: AssetSource,
}

impl Asset {
    /// Create a video asset from bytes already in memory.
    pub fn video_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            kind: MediaKind::Video,
            size_bytes: data.len() as u64,
            source: AssetSource::Memory(data),
        }
    }

    /// Create a video asset backed by a file.
    ///
    /// `size_bytes` must come from the file's metadata.
    pub fn video_file(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Self {
            name,
            kind: MediaKind::Video,
            size_bytes,
            source: AssetSource::File(path),
        }
    }

    /// Create a text asset.
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            name: "text".to_string(),
            kind: MediaKind::Text,
            size_bytes: text.len() as u64,
            source: AssetSource::Text(text),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Size in mebibytes, for log and status messages.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    /// Best-effort MIME type derived from the asset name.
    pub fn content_type(&self) -> &'static str {
        if self.kind == MediaKind::Text {
            return "text/plain";
        }

        let ext = Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "mp4" | "m4v" => "video/mp4",
            "mov" => "video/quicktime",
            "webm" => "video/webm",
            "avi" => "video/x-msvideo",
            "mkv" => "video/x-matroska",
            _ => "application/octet-stream",
        }
    }
}

/// Opaque handle referencing an asset inside the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl ContentId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What the remote store reports after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UploadReceipt {
    /// Identifier to hand to the planner
    pub content_id: ContentId,
    /// Direct URL of the uploaded original
    pub secure_url: Option<String>,
    /// Stored size in bytes as reported by the store
    pub bytes: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_bytes_size() {
        let asset = Asset::video_bytes("clip.mp4", vec![0u8; 2048]);
        assert_eq!(asset.kind(), MediaKind::Video);
        assert_eq!(asset.size_bytes(), 2048);
        assert_eq!(asset.content_type(), "video/mp4");
    }

    #[test]
    fn test_video_file_name_from_path() {
        let asset = Asset::video_file("/tmp/uploads/holiday.MOV", 10);
        assert_eq!(asset.name(), "holiday.MOV");
        assert_eq!(asset.content_type(), "video/quicktime");
        assert!(matches!(asset.source(), AssetSource::File(_)));
    }

    #[test]
    fn test_text_asset() {
        let asset = Asset::text("hello world");
        assert_eq!(asset.kind(), MediaKind::Text);
        assert_eq!(asset.content_type(), "text/plain");
        assert_eq!(asset.size_bytes(), 11);
    }

    #[test]
    fn test_content_id_serializes_transparently() {
        let id = ContentId::from("user_video_123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"user_video_123\"");
    }
}
