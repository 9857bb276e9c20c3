//! Closed activation sets for the hidden layers and the output layer.
//!
//! Exports carry activations as free-form identifiers. Only `relu` (hidden)
//! and `softmax` (output) have defined behavior; anything else either falls
//! back to those under [`ActivationPolicy::Legacy`] or is rejected under
//! [`ActivationPolicy::Strict`].

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AgingWellError, Result};

/// How unknown activation identifiers are treated at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPolicy {
    /// Unknown identifiers collapse to relu/softmax (logged).
    #[default]
    Legacy,
    /// Unknown identifiers fail the load.
    Strict,
}

impl ActivationPolicy {
    pub fn from_strict_flag(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Legacy
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiddenActivation {
    #[default]
    Relu,
}

impl HiddenActivation {
    pub fn parse(name: &str, policy: ActivationPolicy) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "relu" => Ok(Self::Relu),
            _ => fallback("hidden", name, policy).map(|()| Self::Relu),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relu => "relu",
        }
    }

    pub fn apply_in_place(&self, values: &mut [f64]) {
        match self {
            Self::Relu => {
                for v in values.iter_mut() {
                    *v = v.max(0.0);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputActivation {
    #[default]
    Softmax,
}

impl OutputActivation {
    pub fn parse(name: &str, policy: ActivationPolicy) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "softmax" => Ok(Self::Softmax),
            _ => fallback("output", name, policy).map(|()| Self::Softmax),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Softmax => "softmax",
        }
    }

    /// Turn final-layer logits into a probability distribution.
    pub fn normalize(&self, logits: &[f64]) -> Vec<f64> {
        match self {
            Self::Softmax => softmax(logits),
        }
    }
}

fn fallback(kind: &'static str, name: &str, policy: ActivationPolicy) -> Result<()> {
    match policy {
        ActivationPolicy::Strict => Err(AgingWellError::UnsupportedActivation {
            kind,
            name: name.to_string(),
        }),
        ActivationPolicy::Legacy => {
            warn!(
                kind,
                activation = name,
                "unsupported activation in export; using legacy fallback"
            );
            Ok(())
        }
    }
}

/// Numerically-stable softmax: the max logit is subtracted before `exp`.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
