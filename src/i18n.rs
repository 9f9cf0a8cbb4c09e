// SPDX-License-Identifier: AGPL-3.0-or-later
//! Message catalogs for user-facing text
//!
//! A `Translator` is resolved once per run and handed to every component
//! that produces user-facing messages.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::config::I18nConfig;
use crate::error::{ForgeError, Result};

/// Message catalog for one language
#[derive(Debug, Clone)]
pub struct Translator {
    language: String,
    messages: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    messages: HashMap<String, String>,
}

impl Default for Translator {
    fn default() -> Self {
        Self {
            language: "en_US".to_string(),
            messages: HashMap::new(),
        }
    }
}

impl Translator {
    /// Resolve the translator described by the configuration
    ///
    /// Without a translations directory the built-in identity catalog is used.
    pub fn load(config: &I18nConfig) -> Result<Self> {
        match &config.translations_dir {
            None => Ok(Self {
                language: config.language.clone(),
                messages: HashMap::new(),
            }),
            Some(dir) => Self::from_dir(dir, &config.language),
        }
    }

    fn from_dir(dir: &Path, language: &str) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ForgeError::configuration(format!(
                "error loading translation files: directory {} does not exist",
                dir.display()
            )));
        }

        let path = dir.join(format!("{}.toml", language));
        if !path.exists() {
            return Err(ForgeError::configuration(format!(
                "error loading translation files: no catalog for '{}' at {}",
                language,
                path.display()
            )));
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| ForgeError::ReadFailure {
            path: path.display().to_string(),
            source: e,
        })?;
        let catalog: Catalog = toml::from_str(&contents).map_err(|e| {
            ForgeError::configuration(format!(
                "error loading translation files: {}: {}",
                path.display(),
                e
            ))
        })?;

        Ok(Self {
            language: language.to_string(),
            messages: catalog.messages,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Look up a message, falling back to the message id itself
    pub fn t<'a>(&'a self, msgid: &'a str) -> &'a str {
        self.messages.get(msgid).map(String::as_str).unwrap_or(msgid)
    }
}
