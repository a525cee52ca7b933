//! # baton-ml — staged train/evaluate/promote pipeline
//!
//! The pipeline ingests raw records, validates them against a declared
//! schema and a train/test drift gate, fits a preprocessing transformer on
//! the train partition only, trains a challenger classifier, scores it
//! against the deployed champion on the same held-out test set, and
//! promotes it into a single-slot registry only when it beats the champion
//! by strictly more than the configured threshold.
//!
//! Stages exchange immutable typed artifacts; the registry slot is the
//! only persistent cross-run mutable state.

pub mod data;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod inference;
pub mod model;
pub mod pipeline;
pub mod push;
pub mod registry;
pub mod train;

pub use error::PipelineError;
pub use pipeline::{Pipeline, PipelineStage, RunReport};
