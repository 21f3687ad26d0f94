//! Configuration loader with layered sources
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: <config dir>/git-llm-review/config.yaml
//! 3. Project-level config: <repo>/.git-llm-review.yaml
//! 4. An explicit file passed on the command line
//!
//! Later layers override earlier ones key by key, so a file that only sets
//! `retry.max_retries` keeps every other retry default. Files ending in
//! `.toml` are read as TOML, everything else as YAML.

use crate::config::schema::ReviewConfig;
use crate::error::{Result, ReviewError};
use serde_yaml::{Mapping, Value};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Project-level config file name, looked up in the repository root.
pub const PROJECT_CONFIG_FILE: &str = ".git-llm-review.yaml";

/// Configuration loader that stacks user, project and explicit configs
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader for the repository at `repo_root`
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        Self {
            user_config_path: Self::user_config_path(),
            project_config_path: Some(repo_root.as_ref().join(PROJECT_CONFIG_FILE)),
            explicit_path: None,
        }
    }

    /// Loader that reads no files at all.
    pub fn empty() -> Self {
        Self {
            user_config_path: None,
            project_config_path: None,
            explicit_path: None,
        }
    }

    /// Add an explicit config file; unlike the other layers it must exist
    pub fn with_explicit(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    pub fn with_user_config(mut self, path: Option<PathBuf>) -> Self {
        self.user_config_path = path;
        self
    }

    pub fn with_project_config(mut self, path: Option<PathBuf>) -> Self {
        self.project_config_path = path;
        self
    }

    /// Get user-level config path (<config dir>/git-llm-review/config.yaml)
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("git-llm-review").join("config.yaml"))
    }

    pub fn get_user_config_path(&self) -> Option<&PathBuf> {
        self.user_config_path.as_ref()
    }

    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Load, merge, resolve and validate every layer.
    pub async fn load(&self) -> Result<ReviewConfig> {
        let mut merged = serde_yaml::to_value(ReviewConfig::default())
            .map_err(|e| ReviewError::Serialization(e.to_string()))?;
        info!("Loading configuration with defaults");

        for (label, path) in [
            ("user", &self.user_config_path),
            ("project", &self.project_config_path),
        ] {
            let Some(path) = path else { continue };
            if !path.exists() {
                debug!(path = %path.display(), layer = label, "Config file not found, skipping");
                continue;
            }
            let layer = Self::load_value(path).await?;
            debug!(path = %path.display(), layer = label, "Loaded config layer");
            merge_values(&mut merged, layer);
        }

        if let Some(path) = &self.explicit_path {
            if !path.exists() {
                return Err(ReviewError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            let layer = Self::load_value(path).await?;
            debug!(path = %path.display(), layer = "explicit", "Loaded config layer");
            merge_values(&mut merged, layer);
        }

        let mut config: ReviewConfig = serde_yaml::from_value(merged)
            .map_err(|e| ReviewError::Config(format!("Invalid configuration: {}", e)))?;
        config.resolve_env_vars();
        config.validate()?;

        info!(
            provider = %config.llm.provider,
            model = %config.llm.model,
            max_tasks = config.concurrency.max_tasks,
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    /// Read one file into a generic value tree
    async fn load_value(path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            ReviewError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        parse_layer(path, &content)
    }
}

/// Parse config text by file extension. An empty document is an empty layer.
pub fn parse_layer(path: &Path, content: &str) -> Result<Value> {
    let is_toml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("toml"));

    let value = if is_toml {
        let table: toml::Value = toml::from_str(content).map_err(|e| {
            ReviewError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        serde_yaml::to_value(table).map_err(|e| ReviewError::Serialization(e.to_string()))?
    } else {
        serde_yaml::from_str(content).map_err(|e| {
            ReviewError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?
    };

    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

/// Overlay `layer` onto `base`: mappings merge recursively, anything else
/// replaces.
pub fn merge_values(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Mapping(base_map), Value::Mapping(layer_map)) => {
            for (key, value) in layer_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, layer) => *base = layer,
    }
}
