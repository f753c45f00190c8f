//! Configuration management utilities.
//!
//! This module provides utilities for loading configuration including:
//! - Environment variable loading with type parsing
//! - `${VAR_NAME}` expansion inside configuration values
//! - TOML config file loading
//!
//! # Example
//!
//! ```rust,ignore
//! use utils::config::{get_env_or, load_toml_config};
//!
//! let url = get_env_or("KANBAN_API_URL", "http://localhost:5147");
//! let config: AppConfig = load_toml_config("kanban.toml")?;
//! ```

use crate::error::{Result, UtilsError};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Get an environment variable as a string.
pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|e| {
        UtilsError::ConfigError(format!("Environment variable '{}' not found: {}", key, e))
    })
}

/// Get an environment variable and parse it to the specified type.
pub fn get_env_parse<T: std::str::FromStr>(key: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let value = get_env(key)?;
    value.parse::<T>().map_err(|e| {
        UtilsError::ConfigError(format!(
            "Failed to parse environment variable '{}': {}",
            key, e
        ))
    })
}

/// Get an environment variable with a default value.
pub fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an environment variable if it is set and non-empty.
pub fn get_env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Expand a whole-value `${VAR_NAME}` reference.
///
/// Values that are not of that form, or that name an unset variable,
/// are returned unchanged.
pub fn expand_env_var(value: &str) -> String {
    match value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        Some(var_name) if !var_name.is_empty() => {
            std::env::var(var_name).unwrap_or_else(|_| value.to_string())
        }
        _ => value.to_string(),
    }
}

/// Load a TOML configuration file.
pub fn load_toml_config<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        UtilsError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    parse_toml_config(&content)
}

/// Parse TOML configuration from a string.
pub fn parse_toml_config<T: DeserializeOwned>(content: &str) -> Result<T> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        #[serde(default)]
        port: u16,
    }

    #[test]
    fn test_get_env_missing_is_config_error() {
        let result = get_env("UTILS_TEST_DEFINITELY_UNSET_VAR");
        assert!(matches!(result, Err(UtilsError::ConfigError(_))));
    }

    #[test]
    fn test_get_env_or_default() {
        assert_eq!(get_env_or("UTILS_TEST_UNSET_WITH_DEFAULT", "fallback"), "fallback");
    }

    #[test]
    fn test_get_env_parse() {
        std::env::set_var("UTILS_TEST_PORT", "8080");
        assert_eq!(get_env_parse::<u16>("UTILS_TEST_PORT").unwrap(), 8080);

        std::env::set_var("UTILS_TEST_BAD_PORT", "eighty");
        assert!(get_env_parse::<u16>("UTILS_TEST_BAD_PORT").is_err());
    }

    #[test]
    fn test_get_env_opt_ignores_blank() {
        std::env::set_var("UTILS_TEST_BLANK", "   ");
        assert_eq!(get_env_opt("UTILS_TEST_BLANK"), None);

        std::env::set_var("UTILS_TEST_PRESENT", "value");
        assert_eq!(get_env_opt("UTILS_TEST_PRESENT"), Some("value".to_string()));
    }

    #[test]
    fn test_expand_env_var() {
        std::env::set_var("UTILS_TEST_API_URL", "http://api.internal:8080");
        assert_eq!(expand_env_var("${UTILS_TEST_API_URL}"), "http://api.internal:8080");

        // Not a reference
        assert_eq!(expand_env_var("http://localhost"), "http://localhost");

        // Unset variable stays as written
        assert_eq!(
            expand_env_var("${UTILS_TEST_NOT_SET_ANYWHERE}"),
            "${UTILS_TEST_NOT_SET_ANYWHERE}"
        );

        assert_eq!(expand_env_var("${}"), "${}");
    }

    #[test]
    fn test_parse_toml_config() {
        let sample: Sample = parse_toml_config("name = \"board\"\nport = 5147\n").unwrap();
        assert_eq!(
            sample,
            Sample {
                name: "board".to_string(),
                port: 5147
            }
        );
    }

    #[test]
    fn test_parse_toml_config_invalid() {
        let result: Result<Sample> = parse_toml_config("name = ");
        assert!(matches!(result, Err(UtilsError::ConfigError(_))));
    }

    #[test]
    fn test_load_toml_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name = \"from-file\"").unwrap();

        let sample: Sample = load_toml_config(file.path()).unwrap();
        assert_eq!(sample.name, "from-file");
        assert_eq!(sample.port, 0);
    }

    #[test]
    fn test_load_toml_config_missing_file() {
        let result: Result<Sample> = load_toml_config("/nonexistent/kanban.toml");
        assert!(matches!(result, Err(UtilsError::ConfigError(_))));
    }
}
