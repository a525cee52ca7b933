//! # baton-core — configuration, errors, and artifact storage
//!
//! Foundation crate for the Baton pipeline: layered run configuration
//! (defaults -> TOML file -> environment), the error types shared across
//! the workspace, and the object-store abstraction that pipeline stages
//! persist their artifacts through.

pub mod config;
pub mod error;
pub mod storage;

pub use config::PipelineConfig;
pub use error::{ConfigError, StorageError};
pub use storage::{LocalStore, ObjectStore};
