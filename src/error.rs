// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for Kea-Forge

use std::fmt;

use thiserror::Error;

/// Result type alias for Kea-Forge operations
pub type Result<T> = std::result::Result<T, ForgeError>;

/// Pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Localize,
    Load,
    Merge,
    Validate,
    Generate,
    PostProcess,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Localize => "localize",
            Stage::Load => "load",
            Stage::Merge => "merge",
            Stage::Validate => "validate",
            Stage::Generate => "generate",
            Stage::PostProcess => "post-process",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while generating cluster artifacts
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Input file does not exist
    #[error("File not found: {path}")]
    NotFound { path: String },

    /// Input file exists but could not be read
    #[error("Failed to read {path}: {source}")]
    ReadFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Document does not deserialize against its declared version
    #[error("Schema error at '{field}': {message}")]
    SchemaError { field: String, message: String },

    /// Cross-field invariant violated
    #[error("Validation error: {message}")]
    ValidationError { message: String },

    /// Missing configuration or derivation source
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Template engine failure
    #[error("Error generating template {document}: {message}")]
    EngineError { document: String, message: String },

    /// Pretty printing failure
    #[error("Error pretty printing {payload}: {message}")]
    FormatError { payload: String, message: String },

    /// Artifact writer failure
    #[error("Error writing artifacts to {path}: {message}")]
    PersistError { path: String, message: String },

    /// Stage context wrapper
    #[error("{stage} failed for {document}: {source}")]
    Stage {
        stage: Stage,
        document: String,
        #[source]
        source: Box<ForgeError>,
    },

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ForgeError {
    pub fn validation(message: impl Into<String>) -> Self {
        ForgeError::ValidationError {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        ForgeError::ConfigurationError {
            message: message.into(),
        }
    }

    /// Wrap this error with the stage and document it occurred in
    pub fn in_stage(self, stage: Stage, document: impl Into<String>) -> Self {
        ForgeError::Stage {
            stage,
            document: document.into(),
            source: Box::new(self),
        }
    }

    /// The underlying error with any stage context removed
    pub fn root(&self) -> &ForgeError {
        match self {
            ForgeError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage this error was raised in, if known
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ForgeError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
