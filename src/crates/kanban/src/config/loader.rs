//! Configuration loader with dual-location support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.kanban/kanban.toml
//! 3. Project-level config: ./.kanban/kanban.toml
//!
//! Later files override earlier ones key by key, so a project file only
//! needs the settings it changes. Environment overrides apply last.

use crate::config::schema::KanbanConfig;
use crate::error::{KanbanError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use toml::Value;
use tracing::{debug, info};

const CONFIG_DIR: &str = ".kanban";
const CONFIG_FILE: &str = "kanban.toml";

/// Configuration loader that handles both user and project configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
}

impl ConfigLoader {
    /// Loader for the standard locations
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE)),
            project_config_path: std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(CONFIG_DIR)
                .join(CONFIG_FILE),
        }
    }

    /// Loader for explicit locations
    pub fn with_paths(user_config_path: Option<PathBuf>, project_config_path: PathBuf) -> Self {
        Self {
            user_config_path,
            project_config_path,
        }
    }

    /// Load configuration from both locations with project taking precedence
    ///
    /// Missing files are skipped; a file that exists but does not parse is
    /// an error.
    pub async fn load(&self) -> Result<KanbanConfig> {
        let mut merged = Value::Table(Default::default());
        info!("Loading configuration with defaults");

        let paths = self
            .user_config_path
            .iter()
            .chain(std::iter::once(&self.project_config_path));
        for path in paths {
            match Self::read_table(path).await? {
                Some(layer) => {
                    debug!(path = %path.display(), "Loaded config file");
                    merge_values(&mut merged, layer);
                }
                None => debug!(path = %path.display(), "Config file not found, skipping"),
            }
        }

        let mut config: KanbanConfig = merged
            .try_into()
            .map_err(|e| KanbanError::Config(format!("Invalid configuration: {}", e)))?;
        config.resolve_env_vars();

        info!(base_url = %config.api.base_url, "Configuration loaded successfully");
        Ok(config)
    }

    /// Load a single file on top of the defaults
    pub async fn load_file(path: &Path) -> Result<KanbanConfig> {
        let layer = Self::read_table(path).await?.ok_or_else(|| {
            KanbanError::Config(format!("Config file not found: {}", path.display()))
        })?;
        let mut config: KanbanConfig = layer
            .try_into()
            .map_err(|e| KanbanError::Config(format!("Invalid configuration: {}", e)))?;
        config.resolve_env_vars();
        Ok(config)
    }

    async fn read_table(path: &Path) -> Result<Option<Value>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| KanbanError::Config(format!("Failed to read config: {}", e)))?;

        let value: Value = utils::parse_toml_config(&content).map_err(|e| {
            KanbanError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    /// Get user config path
    pub fn user_config_path(&self) -> Option<&Path> {
        self.user_config_path.as_deref()
    }

    /// Get project config path
    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base), Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
