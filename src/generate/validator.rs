// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pre-generation validation
//!
//! Turns a merged [`ApiModel`] into a [`ValidatedModel`]. Nothing else can
//! construct a `ValidatedModel`, so the template engine never sees a model
//! that skipped these checks.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::apimodel::{ApiModel, ApiVersion, CertificateProfile};
use crate::error::{ForgeError, Result};

/// Pool names that collide with control plane parameters
const RESERVED_POOL_NAMES: &[&str] = &["master"];

/// Run-time options for one generation run
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Cluster definition document
    pub api_model_path: PathBuf,

    /// Explicit output directory; derived from the DNS prefix when unset
    pub output_directory: Option<PathBuf>,

    /// Root for derived output directories
    pub output_root: PathBuf,

    /// CA certificate to use for PKI assets
    pub ca_certificate_path: Option<PathBuf>,

    /// CA private key to use for PKI assets
    pub ca_private_key_path: Option<PathBuf>,

    /// Emit classic parameters and outputs
    pub classic_mode: bool,

    /// Pretty print the template and parameters
    pub pretty_print: bool,

    /// Only write the parameters file
    pub parameters_only: bool,
}

impl GenerateOptions {
    pub fn new(api_model_path: impl Into<PathBuf>) -> Self {
        Self {
            api_model_path: api_model_path.into(),
            output_directory: None,
            output_root: PathBuf::from("_output"),
            ca_certificate_path: None,
            ca_private_key_path: None,
            classic_mode: false,
            pretty_print: true,
            parameters_only: false,
        }
    }
}

/// A model that passed validation, with its resolved output location
#[derive(Debug, Clone)]
pub struct ValidatedModel {
    model: ApiModel,
    output_directory: PathBuf,
    source: PathBuf,
}

impl ValidatedModel {
    pub fn model(&self) -> &ApiModel {
        &self.model
    }

    pub fn api_version(&self) -> ApiVersion {
        self.model.api_version
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Document the model was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }
}

/// Validate a merged model against the run options
pub fn validate(options: &GenerateOptions, mut model: ApiModel) -> Result<ValidatedModel> {
    let source = &options.api_model_path;
    if !source.exists() {
        return Err(ForgeError::NotFound {
            path: source.display().to_string(),
        });
    }

    let output_directory = resolve_output_directory(options, &model)?;

    match (
        non_empty(&options.ca_certificate_path),
        non_empty(&options.ca_private_key_path),
    ) {
        (Some(cert_path), Some(key_path)) => {
            let ca_certificate = read_file(cert_path, "CA certificate")?;
            let ca_private_key = read_file(key_path, "CA private key")?;

            let profile = model
                .properties
                .certificate_profile
                .get_or_insert_with(CertificateProfile::default);
            profile.ca_certificate = ca_certificate;
            profile.ca_private_key = ca_private_key;
            debug!(certificate = %cert_path.display(), "Using supplied CA material");
        }
        (None, None) => {}
        _ => {
            return Err(ForgeError::validation(
                "--ca-certificate-path and --ca-private-key-path must be specified together",
            ))
        }
    }

    check_certificate_profile(&mut model)?;
    check_linux_profile(&model)?;
    check_service_principal(&model)?;
    check_agent_pools(&model)?;

    Ok(ValidatedModel {
        model,
        output_directory,
        source: source.clone(),
    })
}

fn resolve_output_directory(options: &GenerateOptions, model: &ApiModel) -> Result<PathBuf> {
    if let Some(dir) = non_empty(&options.output_directory) {
        return Ok(dir.clone());
    }

    let prefix = model.dns_prefix();
    if prefix.is_empty() {
        return Err(ForgeError::configuration(
            "cannot derive output directory: master profile has no DNS prefix",
        ));
    }
    Ok(options.output_root.join(prefix))
}

/// CA material is either complete or absent; an empty profile is dropped
fn check_certificate_profile(model: &mut ApiModel) -> Result<()> {
    let profile = match &model.properties.certificate_profile {
        Some(profile) => profile,
        None => return Ok(()),
    };

    if profile.is_empty() {
        model.properties.certificate_profile = None;
        return Ok(());
    }
    if !profile.is_complete() {
        return Err(ForgeError::validation(
            "certificateProfile requires both caCertificate and caPrivateKey",
        ));
    }
    Ok(())
}

fn check_linux_profile(model: &ApiModel) -> Result<()> {
    let has_key = model
        .properties
        .linux_profile
        .as_ref()
        .map(|linux| linux.ssh.public_keys.iter().any(|k| !k.key_data.is_empty()))
        .unwrap_or(false);

    if !has_key {
        return Err(ForgeError::validation(
            "linuxProfile must contain at least one SSH public key",
        ));
    }
    Ok(())
}

fn check_service_principal(model: &ApiModel) -> Result<()> {
    if let Some(sp) = &model.properties.service_principal_profile {
        if sp.client_id.is_empty() || sp.secret.is_empty() {
            return Err(ForgeError::validation(
                "servicePrincipalProfile requires both clientId and secret",
            ));
        }
    }
    Ok(())
}

/// Pool names prefix template parameters, compared case-insensitively
fn check_agent_pools(model: &ApiModel) -> Result<()> {
    let mut seen = HashSet::new();

    for pool in &model.properties.agent_pool_profiles {
        if pool.name.is_empty() {
            return Err(ForgeError::validation("agent pool name cannot be empty"));
        }

        let key = pool.name.to_ascii_lowercase();
        if RESERVED_POOL_NAMES.contains(&key.as_str()) {
            return Err(ForgeError::validation(format!(
                "agent pool name '{}' is reserved",
                pool.name
            )));
        }
        if !seen.insert(key) {
            return Err(ForgeError::validation(format!(
                "duplicate agent pool name '{}'",
                pool.name
            )));
        }
    }
    Ok(())
}

fn non_empty(path: &Option<PathBuf>) -> Option<&PathBuf> {
    path.as_ref().filter(|p| !p.as_os_str().is_empty())
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| ForgeError::ReadFailure {
        path: format!("{} file {}", what, path.display()),
        source: e,
    })
}
