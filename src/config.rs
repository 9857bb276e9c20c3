use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ml::ActivationPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// HTTP port (default: 8000)
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Path to the exported weights (JSON)
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
    /// Reject unknown activation identifiers instead of falling back
    #[serde(default)]
    pub strict_activations: bool,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/nn_export.json")
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            strict_activations: false,
        }
    }
}

impl ModelConfig {
    pub fn activation_policy(&self) -> ActivationPolicy {
        ActivationPolicy::from_strict_flag(self.strict_activations)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Columns a tab-separated upload must carry
    #[serde(default = "default_required_columns")]
    pub required_columns: Vec<String>,
    /// Request body limit in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_required_columns() -> Vec<String> {
    vec![
        "Meals_per_day".to_string(),
        "Food_Intake_Percentage".to_string(),
    ]
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            required_columns: default_required_columns(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily-rolling log files (console only when unset)
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("model.strict_activations", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("AGINGWELL_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (AGINGWELL__MODEL__PATH, etc.)
            .add_source(
                Environment::with_prefix("AGINGWELL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("service.required_columns"),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("server.port must be non-zero".to_string());
        }

        if self.model.path.as_os_str().is_empty() {
            errors.push("model.path must be set".to_string());
        }

        if self.service.max_body_bytes == 0 {
            errors.push("service.max_body_bytes must be positive".to_string());
        }

        if self
            .service
            .required_columns
            .iter()
            .any(|c| c.trim().is_empty())
        {
            errors.push("service.required_columns must not contain blank names".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // `load_from` reads process-wide AGINGWELL__* variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8000);
        assert_eq!(cfg.model.activation_policy(), ActivationPolicy::Legacy);
        assert_eq!(
            cfg.service.required_columns,
            vec!["Meals_per_day", "Food_Intake_Percentage"]
        );
    }

    #[test]
    fn validate_collects_all_errors() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        cfg.service.max_body_bytes = 0;
        cfg.service.required_columns = vec![" ".to_string()];
        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn environment_overrides_files() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = std::env::temp_dir().join(format!("agingwell-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("default.toml"), "[server]\nport = 9100\n").unwrap();

        std::env::set_var("AGINGWELL__SERVER__PORT", "9200");
        std::env::set_var("AGINGWELL__SERVICE__REQUIRED_COLUMNS", "Age,Weight_kg");
        let loaded = AppConfig::load_from(&dir);
        std::env::remove_var("AGINGWELL__SERVER__PORT");
        std::env::remove_var("AGINGWELL__SERVICE__REQUIRED_COLUMNS");
        let _ = std::fs::remove_dir_all(&dir);

        let cfg = loaded.unwrap();
        assert_eq!(cfg.server.port, 9200);
        assert_eq!(cfg.service.required_columns, vec!["Age", "Weight_kg"]);
    }

    #[test]
    fn loads_from_toml_directory() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = std::env::temp_dir().join(format!("agingwell-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("default.toml"),
            r#"
[server]
port = 9100

[model]
path = "/srv/models/export.json"
strict_activations = true

[service]
required_columns = ["Age"]
"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&dir).unwrap();
        assert_eq!(cfg.server.port, 9100);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.model.path, PathBuf::from("/srv/models/export.json"));
        assert_eq!(cfg.model.activation_policy(), ActivationPolicy::Strict);
        assert_eq!(cfg.service.required_columns, vec!["Age"]);
        assert_eq!(cfg.service.max_body_bytes, 1024 * 1024);
        assert_eq!(cfg.logging.level, "info");

        let _ = std::fs::remove_dir_all(&dir);
    }
}
