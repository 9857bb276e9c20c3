use thiserror::Error;

/// Main error type for the classifier service
#[derive(Error, Debug)]
pub enum AgingWellError {
    // Model load errors (fatal at startup)
    #[error("Malformed model: {0}")]
    MalformedModel(String),

    #[error("Unsupported {kind} activation: {name}")]
    UnsupportedActivation { kind: &'static str, name: String },

    // Request-level inference errors
    #[error("Feature count mismatch: expected {expected}, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("Non-finite feature value at index {index}")]
    NonFiniteFeature { index: usize },

    #[error("Non-finite activation in layer {layer}: input values are out of range")]
    NonFiniteActivation { layer: usize },

    #[error("Unresolvable named features: {0}")]
    UnresolvableNamedFeatures(String),

    #[error("Row {row}: {source}")]
    BatchRow {
        row: usize,
        #[source]
        source: Box<AgingWellError>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Tabular data error: {0}")]
    Csv(#[from] csv::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AgingWellError {
    /// True when the error was caused by the caller's input rather than the
    /// service itself. Such errors fail a single request and map to 400.
    pub fn is_request_error(&self) -> bool {
        match self {
            Self::FeatureCountMismatch { .. }
            | Self::NonFiniteFeature { .. }
            | Self::NonFiniteActivation { .. }
            | Self::UnresolvableNamedFeatures(_)
            | Self::InvalidInput(_)
            | Self::Csv(_) => true,
            Self::BatchRow { source, .. } => source.is_request_error(),
            _ => false,
        }
    }

    /// True for errors raised while loading a model export.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedModel(_) | Self::UnsupportedActivation { .. }
        )
    }

    pub(crate) fn in_row(self, row: usize) -> Self {
        Self::BatchRow {
            row,
            source: Box::new(self),
        }
    }
}

/// Result type alias for AgingWellError
pub type Result<T> = std::result::Result<T, AgingWellError>;
