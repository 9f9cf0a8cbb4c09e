// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration management for Kea-Forge

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ForgeError, Result};

/// Main configuration structure for Forge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Forge instance name
    pub name: String,

    /// Version of the configuration format
    #[serde(default = "default_version")]
    pub version: String,

    /// Output location defaults
    #[serde(default)]
    pub output: OutputConfig,

    /// Template generator defaults
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Localization settings
    #[serde(default)]
    pub i18n: I18nConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where generated artifacts land
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root under which per-cluster directories are derived
    #[serde(default = "default_output_root")]
    pub root: PathBuf,
}

/// Template generator defaults, overridable from the command line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Emit classic parameters and outputs
    #[serde(default)]
    pub classic_mode: bool,

    /// Pretty print the template and parameters
    #[serde(default = "default_true")]
    pub pretty_print: bool,

    /// Only write the parameters file
    #[serde(default)]
    pub parameters_only: bool,
}

/// Localization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct I18nConfig {
    /// Language tag, e.g. en_US
    #[serde(default = "default_language")]
    pub language: String,

    /// Directory holding `<language>.toml` message catalogs
    pub translations_dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            classic_mode: false,
            pretty_print: true,
            parameters_only: false,
        }
    }
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            translations_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "forge".to_string(),
            version: default_version(),
            output: OutputConfig::default(),
            generator: GeneratorConfig::default(),
            i18n: I18nConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The parsed configuration or an error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ForgeError::NotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ForgeError::configuration("Forge name cannot be empty"));
        }

        if self.output.root.as_os_str().is_empty() {
            return Err(ForgeError::configuration("Output root cannot be empty"));
        }

        if self.i18n.language.is_empty() {
            return Err(ForgeError::configuration("i18n language cannot be empty"));
        }

        match self.logging.format.as_str() {
            "text" | "json" => Ok(()),
            other => Err(ForgeError::configuration(format!(
                "Unknown logging format '{}', expected 'text' or 'json'",
                other
            ))),
        }
    }
}

// Default value functions

fn default_version() -> String {
    "1.0".to_string()
}

fn default_output_root() -> PathBuf {
    PathBuf::from("_output")
}

fn default_true() -> bool {
    true
}

fn default_language() -> String {
    "en_US".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}
