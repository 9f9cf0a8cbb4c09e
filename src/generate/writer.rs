// SPDX-License-Identifier: AGPL-3.0-or-later
//! Artifact persistence

use std::path::Path;

use tracing::{debug, info};

use crate::apimodel::{ApiModel, ApiVersion, CertificateProfile};
use crate::error::{ForgeError, Result};
use crate::i18n::Translator;

pub const APIMODEL_FILE: &str = "apimodel.json";
pub const TEMPLATE_FILE: &str = "azuredeploy.json";
pub const PARAMETERS_FILE: &str = "azuredeploy.parameters.json";
pub const CA_CERTIFICATE_FILE: &str = "ca.crt";
pub const CA_PRIVATE_KEY_FILE: &str = "ca.key";

/// Everything produced by one generation run
#[derive(Debug, Clone, Copy)]
pub struct ArtifactSet<'a> {
    pub model: &'a ApiModel,
    pub api_version: ApiVersion,
    pub template: &'a str,
    pub parameters: &'a str,
    pub output_directory: &'a Path,
    pub certs_generated: bool,
    pub parameters_only: bool,
    /// CA material created by the generator
    pub generated_pki: Option<&'a CertificateProfile>,
}

/// Persists an artifact set
pub trait ArtifactWriter {
    fn write(&self, artifacts: &ArtifactSet<'_>) -> Result<()>;
}

/// Writes artifacts into the output directory
pub struct FileArtifactWriter {
    translator: Translator,
}

impl FileArtifactWriter {
    pub fn new(translator: Translator) -> Self {
        Self { translator }
    }

    fn persist_error(
        &self,
        path: &Path,
        msgid: &str,
        detail: impl std::fmt::Display,
    ) -> ForgeError {
        ForgeError::PersistError {
            path: path.display().to_string(),
            message: format!("{}: {}", self.translator.t(msgid), detail),
        }
    }

    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::write(path, contents)
            .map_err(|e| self.persist_error(path, "error writing file", e))?;
        debug!(file = %path.display(), "Wrote artifact");
        Ok(())
    }

    fn write_private_file(&self, path: &Path, contents: &str) -> Result<()> {
        self.write_file(path, contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.persist_error(path, "error setting file permissions", e))?;
        }

        Ok(())
    }

    /// The model as it should be persisted, with generated CA material merged in
    fn persisted_model(&self, artifacts: &ArtifactSet<'_>) -> Result<String> {
        let mut model = artifacts.model.clone();
        if let Some(pki) = artifacts.generated_pki {
            model.properties.certificate_profile = Some(pki.clone());
        }
        model.api_version = artifacts.api_version;

        let mut json = serde_json::to_string_pretty(&model).map_err(|e| {
            self.persist_error(artifacts.output_directory, "error serializing api model", e)
        })?;
        json.push('\n');
        Ok(json)
    }
}

impl ArtifactWriter for FileArtifactWriter {
    fn write(&self, artifacts: &ArtifactSet<'_>) -> Result<()> {
        let dir = artifacts.output_directory;
        std::fs::create_dir_all(dir)
            .map_err(|e| self.persist_error(dir, "error creating output directory", e))?;

        if !artifacts.parameters_only {
            self.write_file(&dir.join(APIMODEL_FILE), &self.persisted_model(artifacts)?)?;
            self.write_file(&dir.join(TEMPLATE_FILE), artifacts.template)?;
        }

        self.write_file(&dir.join(PARAMETERS_FILE), artifacts.parameters)?;

        if artifacts.certs_generated {
            let pki = artifacts
                .generated_pki
                .or(artifacts.model.properties.certificate_profile.as_ref())
                .ok_or_else(|| ForgeError::PersistError {
                    path: dir.display().to_string(),
                    message: self
                        .translator
                        .t("certificates were generated but none were returned")
                        .to_string(),
                })?;
            self.write_file(&dir.join(CA_CERTIFICATE_FILE), &pki.ca_certificate)?;
            self.write_private_file(&dir.join(CA_PRIVATE_KEY_FILE), &pki.ca_private_key)?;
        }

        info!(
            output_directory = %dir.display(),
            parameters_only = artifacts.parameters_only,
            certs = artifacts.certs_generated,
            "Artifacts written"
        );
        Ok(())
    }
}
