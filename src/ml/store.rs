//! Weight store: loads a portable MLP export and validates its shapes.
//!
//! The export is the sklearn-style document produced by the training side:
//!
//! ```json
//! {
//!   "coefs": [[[...], ...], ...],     // per layer, shape [in_dim][out_dim]
//!   "intercepts": [[...], ...],       // per layer, length out_dim (optional)
//!   "classes": [0, 1, 2],             // optional
//!   "n_outputs": 3,                   // optional
//!   "n_features_in": 2,               // optional
//!   "activation": "relu",             // optional
//!   "out_activation": "softmax",      // optional
//!   "feature_order": ["a", "b"]       // optional
//! }
//! ```
//!
//! A [`ModelArtifact`] is only ever handed out after every dimensional
//! invariant has been checked, so the engine can index without re-validating.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use super::activation::{ActivationPolicy, HiddenActivation, OutputActivation};
use crate::error::{AgingWellError, Result};

/// Raw export document, exactly as found on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelExport {
    #[serde(default)]
    pub coefs: Option<Vec<Vec<Vec<f64>>>>,
    #[serde(default)]
    pub intercepts: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub classes: Option<Vec<ClassLabel>>,
    #[serde(default)]
    pub n_outputs: Option<usize>,
    #[serde(default)]
    pub n_features_in: Option<usize>,
    #[serde(default)]
    pub activation: Option<String>,
    #[serde(default)]
    pub out_activation: Option<String>,
    #[serde(default)]
    pub feature_order: Option<Vec<String>>,
}

/// Output class identifier. Exports use either numbers or strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ClassLabel {
    /// Integer class id, when the label denotes one (`2`, `2.0`, `"2"`).
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) => integral(*f),
            Self::Text(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral))
            }
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// One fully-connected layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Weights shape: [in_dim][out_dim]
    weights: Vec<Vec<f64>>,
    /// Bias shape: [out_dim]
    bias: Vec<f64>,
}

impl Layer {
    pub fn in_dim(&self) -> usize {
        self.weights.len()
    }

    pub fn out_dim(&self) -> usize {
        self.bias.len()
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }

    pub fn bias(&self) -> &[f64] {
        &self.bias
    }
}

/// Validated, immutable model. Share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    layers: Vec<Layer>,
    class_labels: Vec<ClassLabel>,
    n_features_in: usize,
    hidden_activation: HiddenActivation,
    output_activation: OutputActivation,
    feature_order: Option<Vec<String>>,
}

impl ModelArtifact {
    pub fn from_file<P: AsRef<Path>>(path: P, policy: ActivationPolicy) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let model = Self::from_json_str(&content, policy)?;
        info!(
            model_path = %path.display(),
            n_features_in = model.n_features_in,
            n_layers = model.layers.len(),
            n_classes = model.class_labels.len(),
            "loaded model export"
        );
        Ok(model)
    }

    pub fn from_json_str(content: &str, policy: ActivationPolicy) -> Result<Self> {
        let export: ModelExport = serde_json::from_str(content)
            .map_err(|e| AgingWellError::MalformedModel(format!("unparsable export: {e}")))?;
        Self::from_export(export, policy)
    }

    pub fn from_export(export: ModelExport, policy: ActivationPolicy) -> Result<Self> {
        let coefs = export
            .coefs
            .ok_or_else(|| malformed("missing required field `coefs`"))?;
        if coefs.is_empty() {
            return Err(malformed("`coefs` must contain at least one layer"));
        }

        for (idx, w) in coefs.iter().enumerate() {
            validate_matrix(idx, w)?;
        }
        for idx in 1..coefs.len() {
            let prev_out = matrix_cols(&coefs[idx - 1]);
            let next_in = coefs[idx].len();
            if prev_out != next_in {
                return Err(malformed(format!(
                    "layer[{}] outputs {prev_out} but layer[{idx}] expects {next_in} inputs",
                    idx - 1
                )));
            }
        }

        let classes = match export.classes {
            Some(classes) => classes,
            None => fallback_class_labels(export.n_outputs, &coefs),
        };

        let intercepts = export.intercepts.unwrap_or_default();
        if intercepts.len() > coefs.len() {
            return Err(malformed(format!(
                "{} intercept vectors for {} layers",
                intercepts.len(),
                coefs.len()
            )));
        }

        let mut intercepts = intercepts.into_iter();
        let mut layers = Vec::with_capacity(coefs.len());
        for (idx, weights) in coefs.into_iter().enumerate() {
            let out_dim = matrix_cols(&weights);
            let bias = intercepts.next().unwrap_or_else(|| vec![0.0; out_dim]);
            if bias.len() != out_dim {
                return Err(malformed(format!(
                    "layer[{idx}] bias len {} != out_dim {out_dim}",
                    bias.len()
                )));
            }
            if bias.iter().any(|v| !v.is_finite()) {
                return Err(malformed(format!(
                    "layer[{idx}] bias contains non-finite values"
                )));
            }
            layers.push(Layer { weights, bias });
        }

        let first_in = layers[0].in_dim();
        let n_features_in = match export.n_features_in {
            Some(n) if n != first_in => {
                return Err(malformed(format!(
                    "n_features_in {n} != first layer input dim {first_in}"
                )))
            }
            _ => first_in,
        };

        let final_out = layers[layers.len() - 1].out_dim();
        if classes.len() != final_out {
            return Err(malformed(format!(
                "{} class labels for final layer width {final_out}",
                classes.len()
            )));
        }

        if let Some(order) = &export.feature_order {
            if order.len() != n_features_in {
                return Err(malformed(format!(
                    "feature_order has {} names but n_features_in is {n_features_in}",
                    order.len()
                )));
            }
            let mut seen = HashSet::with_capacity(order.len());
            if let Some(dup) = order.iter().find(|name| !seen.insert(name.as_str())) {
                return Err(malformed(format!("duplicate feature name `{dup}`")));
            }
        }

        let hidden_activation = match export.activation.as_deref() {
            Some(name) => HiddenActivation::parse(name, policy)?,
            None => HiddenActivation::default(),
        };
        let output_activation = match export.out_activation.as_deref() {
            Some(name) => OutputActivation::parse(name, policy)?,
            None => OutputActivation::default(),
        };

        Ok(Self {
            layers,
            class_labels: classes,
            n_features_in,
            hidden_activation,
            output_activation,
            feature_order: export.feature_order,
        })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn class_labels(&self) -> &[ClassLabel] {
        &self.class_labels
    }

    pub fn n_features_in(&self) -> usize {
        self.n_features_in
    }

    pub fn n_classes(&self) -> usize {
        self.class_labels.len()
    }

    pub fn hidden_activation(&self) -> HiddenActivation {
        self.hidden_activation
    }

    pub fn output_activation(&self) -> OutputActivation {
        self.output_activation
    }

    pub fn feature_order(&self) -> Option<&[String]> {
        self.feature_order.as_deref()
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            n_features_in: self.n_features_in,
            layers: self
                .layers
                .iter()
                .map(|l| LayerShape {
                    inputs: l.in_dim(),
                    outputs: l.out_dim(),
                })
                .collect(),
            classes: self.class_labels.clone(),
            activation: self.hidden_activation,
            out_activation: self.output_activation,
            feature_order: self.feature_order.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerShape {
    pub inputs: usize,
    pub outputs: usize,
}

/// Serializable description of a loaded model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    pub n_features_in: usize,
    pub layers: Vec<LayerShape>,
    pub classes: Vec<ClassLabel>,
    pub activation: HiddenActivation,
    pub out_activation: OutputActivation,
    pub feature_order: Option<Vec<String>>,
}

/// Labels used when the export has no `classes`: `0..n_outputs`, else
/// `0..final_width`, else nothing.
pub fn fallback_class_labels(
    n_outputs: Option<usize>,
    coefs: &[Vec<Vec<f64>>],
) -> Vec<ClassLabel> {
    let n = n_outputs
        .or_else(|| coefs.last().map(|w| matrix_cols(w)))
        .unwrap_or(0);
    (0..n as i64).map(ClassLabel::Integer).collect()
}

fn matrix_cols(w: &[Vec<f64>]) -> usize {
    w.first().map(|r| r.len()).unwrap_or(0)
}

fn validate_matrix(idx: usize, w: &[Vec<f64>]) -> Result<()> {
    if w.is_empty() {
        return Err(malformed(format!("layer[{idx}] weight matrix has no rows")));
    }
    let cols = matrix_cols(w);
    if cols == 0 {
        return Err(malformed(format!(
            "layer[{idx}] weight matrix has no columns"
        )));
    }
    for (r, row) in w.iter().enumerate() {
        if row.len() != cols {
            return Err(malformed(format!(
                "layer[{idx}] weights row {r} len {} != {cols}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(malformed(format!(
                "layer[{idx}] weights contain non-finite values"
            )));
        }
    }
    Ok(())
}

fn malformed(msg: impl Into<String>) -> AgingWellError {
    AgingWellError::MalformedModel(msg.into())
}

/// Caller-supplied sample: a flat vector or a name → value map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureInput {
    Vector(Vec<f64>),
    Named(BTreeMap<String, f64>),
}

impl From<Vec<f64>> for FeatureInput {
    fn from(v: Vec<f64>) -> Self {
        Self::Vector(v)
    }
}

impl From<BTreeMap<String, f64>> for FeatureInput {
    fn from(m: BTreeMap<String, f64>) -> Self {
        Self::Named(m)
    }
}

/// Project caller input onto the model's feature vector.
///
/// Vectors pass through untouched; length checks happen in the engine.
/// Named maps follow `feature_order` (absent names become 0.0). Without a
/// feature order, keys must be decimal indices `"0".."n_features_in-1"`.
pub fn resolve_features<'a>(
    artifact: &ModelArtifact,
    input: &'a FeatureInput,
) -> Result<Cow<'a, [f64]>> {
    match input {
        FeatureInput::Vector(v) => Ok(Cow::Borrowed(v.as_slice())),
        FeatureInput::Named(map) => match artifact.feature_order() {
            Some(order) => Ok(Cow::Owned(resolve_by_order(order, map))),
            None => resolve_by_index(artifact.n_features_in(), map).map(Cow::Owned),
        },
    }
}

fn resolve_by_order(order: &[String], map: &BTreeMap<String, f64>) -> Vec<f64> {
    let ignored: Vec<&str> = map
        .keys()
        .filter(|k| !order.contains(*k))
        .map(String::as_str)
        .collect();
    if !ignored.is_empty() {
        debug!(?ignored, "named features not in feature_order were ignored");
    }
    order
        .iter()
        .map(|name| map.get(name).copied().unwrap_or(0.0))
        .collect()
}

fn resolve_by_index(n_features_in: usize, map: &BTreeMap<String, f64>) -> Result<Vec<f64>> {
    let mut out = vec![0.0; n_features_in];
    let mut bad = Vec::new();
    let mut resolved = 0usize;
    for (key, value) in map {
        match parse_index(key) {
            Some(i) if i < n_features_in => {
                out[i] = *value;
                resolved += 1;
            }
            _ => bad.push(key.as_str()),
        }
    }
    if !bad.is_empty() {
        return Err(AgingWellError::UnresolvableNamedFeatures(format!(
            "model has no feature_order and keys {bad:?} are not indices in 0..{n_features_in}"
        )));
    }
    if resolved == 0 {
        return Err(AgingWellError::UnresolvableNamedFeatures(
            "no features supplied".to_string(),
        ));
    }
    Ok(out)
}

/// Plain decimal index: ASCII digits only, no sign or padding.
fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}
