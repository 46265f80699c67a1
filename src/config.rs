//! Configuration management for the epub-cfi tool

use clap::ValueEnum;
use std::collections::HashMap;
use std::env;
use std::path::Path;
use thiserror::Error;

const DEFAULT_LOG_FILTER: &str = "epub_cfi=info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Class of injected elements (highlights) excluded from addressing
    pub ignore_class: Option<String>,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_filter: String,
    pub output: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ignore_class: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            output: OutputFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings from a dotenv-style file without touching the process
    /// environment
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path)? {
            let (key, value) = item?;
            vars.insert(key, value);
        }
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let output = match lookup("EPUB_CFI_OUTPUT") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "text" => OutputFormat::Text,
                "json" => OutputFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "EPUB_CFI_OUTPUT",
                        value,
                    })
                }
            },
            None => OutputFormat::Text,
        };

        Ok(Config {
            ignore_class: lookup("EPUB_CFI_IGNORE_CLASS").filter(|class| !class.trim().is_empty()),
            log_filter: lookup("EPUB_CFI_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            output,
        })
    }
}
