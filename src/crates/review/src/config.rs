//! Configuration management for git-llm-review
//!
//! Supports layered configuration:
//! - User-level: <config dir>/git-llm-review/config.yaml
//! - Project-level: <repo>/.git-llm-review.yaml
//! - Explicit: `--config <file>` (YAML or TOML)
//!
//! Later layers override earlier ones.

mod loader;
mod schema;

pub use loader::{merge_values, parse_layer, ConfigLoader, PROJECT_CONFIG_FILE};
pub use schema::{
    ConcurrencyConfig, LlmConfig, LoggingConfig, RetrySettings, ReviewConfig, API_KEY_ENV,
};

use crate::Result;
use std::path::Path;

/// Load configuration for the repository at `repo_root`
///
/// Priority order:
/// 1. Default values
/// 2. User-level config
/// 3. Project-level config
/// 4. `explicit`, when given
pub async fn load_config(repo_root: &Path, explicit: Option<&Path>) -> Result<ReviewConfig> {
    let mut loader = ConfigLoader::new(repo_root);
    if let Some(path) = explicit {
        loader = loader.with_explicit(path);
    }
    loader.load().await
}
