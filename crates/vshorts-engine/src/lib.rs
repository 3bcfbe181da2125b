//! Client for the remote video transformation engine.
//!
//! The engine performs the actual transcoding. This crate exposes the
//! [`TransformEngine`] seam the pipeline executor drives, and the HTTP
//! implementation used in production. Each stage is submitted once and then
//! observed through its ticket until the engine reports a terminal status.

pub mod client;
pub mod engine;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use client::{EngineConfig, HttpEngine};
pub use engine::TransformEngine;
pub use error::{EngineError, EngineResult};
pub use types::{RemoteStatus, StageState, StageSubmission};
