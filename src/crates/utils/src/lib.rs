//! Transport and configuration helpers for the kanban client.
//!
//! # Modules
//!
//! ## Client (`client`)
//!
//! JSON-over-HTTP client bound to a base URL, with error-payload
//! normalization:
//!
//! ```rust,ignore
//! use utils::client::{ClientConfig, HttpClient};
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("http://localhost:5147")
//!     .with_timeout(Duration::from_secs(30))
//!     .with_user_agent("kanban-cli");
//!
//! let client = HttpClient::new(config)?;
//! let tasks: Vec<Task> = client.get_json("/tasks").await?;
//! ```
//!
//! ## Config (`config`)
//!
//! Environment variable and TOML file helpers:
//!
//! ```rust,ignore
//! use utils::config::{expand_env_var, get_env_or, load_toml_config};
//!
//! let base_url = expand_env_var(&get_env_or("KANBAN_API_URL", "${API_URL}"));
//! let config: AppConfig = load_toml_config("kanban.toml")?;
//! ```
//!
//! # Features
//!
//! - `client` - HTTP client utilities (enabled by default)
//! - `config` - Configuration utilities (enabled by default)

pub mod error;

#[cfg(feature = "client")]
pub mod client;

#[cfg(feature = "config")]
pub mod config;

// Re-export commonly used types
pub use error::{Result, UtilsError};

#[cfg(feature = "client")]
pub use client::{normalize_error_body, ClientConfig, HttpClient};

#[cfg(feature = "config")]
pub use config::{
    expand_env_var, get_env, get_env_opt, get_env_or, get_env_parse, load_toml_config,
    parse_toml_config,
};
