pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod ml;
pub mod services;

pub use config::AppConfig;
pub use error::{AgingWellError, Result};
pub use ml::{
    predict_probabilities, predict_probabilities_batch, predict_with_confidence, resolve_features,
    ActivationPolicy, ClassLabel, FeatureInput, ModelArtifact, PredictionResult,
};
pub use services::{create_router, AppState, PredictionServer};
