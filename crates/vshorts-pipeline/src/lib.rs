//! Vertical short orchestration.
//!
//! This crate wires the transport client and the transformation engine into
//! one submission flow:
//! - `planner`: builds declarative transformation plans per processing mode
//! - `executor`: walks a plan's stage graph against the engine
//! - `resolver`: turns a terminal run into a download URL or a classified failure
//! - `orchestrator`: upload -> plan -> execute -> resolve, with status reporting

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod planner;
pub mod resolver;
pub mod session;

pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use executor::{ExecutorSettings, PipelineExecutor};
pub use logging::RunLogger;
pub use orchestrator::Orchestrator;
pub use planner::Planner;
pub use resolver::ResultResolver;
pub use session::Session;
