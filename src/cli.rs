use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::ml::{
    predict_with_confidence, resolve_features, ActivationPolicy, FeatureInput, ModelArtifact,
    ModelSummary, PredictionResult,
};

#[derive(Parser)]
#[command(name = "agingwell")]
#[command(author = "AgingWell Team")]
#[command(version = "0.1.0")]
#[command(about = "Nutritional-risk classifier service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config directory (default.toml, <AGINGWELL_ENV>.toml)
    #[arg(short, long, default_value = "config")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the prediction HTTP server (default)
    Serve {
        /// Model export path (overrides model.path)
        #[arg(short, long)]
        model: Option<PathBuf>,
        /// Listen port (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Classify one sample and print the result as JSON
    Predict {
        /// Model export path
        #[arg(short, long)]
        model: PathBuf,
        /// Comma-separated feature vector, e.g. 3,85.5
        #[arg(
            long,
            value_delimiter = ',',
            allow_hyphen_values = true,
            conflicts_with_all = ["named", "zeros"]
        )]
        features: Vec<f64>,
        /// Named feature, repeatable: --named Meals_per_day=3
        #[arg(long, value_parser = parse_named_feature, conflicts_with = "zeros")]
        named: Vec<(String, f64)>,
        /// Classify an all-zero vector of the model's input width
        #[arg(long)]
        zeros: bool,
        /// Reject unknown activation identifiers
        #[arg(long)]
        strict: bool,
    },
    /// Print the model's shapes, classes and feature order as JSON
    Inspect {
        /// Model export path
        #[arg(short, long)]
        model: PathBuf,
        /// Reject unknown activation identifiers
        #[arg(long)]
        strict: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Serve {
            model: None,
            port: None,
        }
    }
}

fn parse_named_feature(s: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{s}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty feature name in `{s}`"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("`{value}` is not a number: {e}"))?;
    Ok((name.to_string(), value))
}

/// Sample passed on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum CliSample {
    Vector(Vec<f64>),
    Named(Vec<(String, f64)>),
    Zeros,
}

impl CliSample {
    pub fn from_args(features: Vec<f64>, named: Vec<(String, f64)>, zeros: bool) -> Self {
        if zeros || (features.is_empty() && named.is_empty()) {
            Self::Zeros
        } else if !named.is_empty() {
            Self::Named(named)
        } else {
            Self::Vector(features)
        }
    }

    fn into_input(self, model: &ModelArtifact) -> FeatureInput {
        match self {
            Self::Vector(v) => FeatureInput::Vector(v),
            Self::Named(pairs) => FeatureInput::Named(pairs.into_iter().collect::<BTreeMap<_, _>>()),
            Self::Zeros => FeatureInput::Vector(vec![0.0; model.n_features_in()]),
        }
    }
}

pub fn run_predict(
    model_path: &Path,
    sample: CliSample,
    policy: ActivationPolicy,
) -> Result<PredictionResult> {
    let model = ModelArtifact::from_file(model_path, policy)?;
    let input = sample.into_input(&model);
    let features = resolve_features(&model, &input)?;
    predict_with_confidence(&model, &features)
}

pub fn run_inspect(model_path: &Path, policy: ActivationPolicy) -> Result<ModelSummary> {
    Ok(ModelArtifact::from_file(model_path, policy)?.summary())
}
