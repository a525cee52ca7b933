//! Feature engineering: the fitted preprocessing transformer.

pub mod transformer;

pub use transformer::{FeatureArtifact, FittedTransformer};
