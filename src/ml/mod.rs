//! Self-contained MLP inference (deploy-safe, no training framework at runtime).
//!
//! `store` loads and validates exported weights; `engine` runs the forward
//! pass over them.

pub mod activation;
pub mod engine;
pub mod store;

pub use activation::{ActivationPolicy, HiddenActivation, OutputActivation};
pub use engine::{
    argmax, predict, predict_probabilities, predict_probabilities_batch,
    predict_with_confidence, predict_with_confidence_batch, PredictionResult,
};
pub use store::{
    resolve_features, ClassLabel, FeatureInput, Layer, ModelArtifact, ModelExport, ModelSummary,
};
