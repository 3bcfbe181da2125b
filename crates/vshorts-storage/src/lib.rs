//! Media store transport client.
//!
//! This crate provides:
//! - Size-guarded, progress-tracked upload of video assets
//! - Loading of on-disk assets without reading their payload
//! - Delivery URL construction for finished artifacts

pub mod client;
pub mod delivery;
pub mod error;
pub mod progress;

pub use client::{load_video_asset, StoreClient, StoreConfig};
pub use delivery::{DeliveryConfig, DeliveryUrl, DeliveryUrlBuilder};
pub use error::{StorageError, StorageResult};
pub use progress::UploadProgress;
