// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster definition documents
//!
//! Loading, normalization and runtime overrides for the api model that
//! describes a cluster.

mod overrides;
mod parser;

pub use overrides::Overrides;
pub use parser::{
    strip_empty_subnet, AgentPoolProfile, ApiModel, ApiVersion, CertificateProfile,
    HostedMasterProfile, LinuxProfile, MasterProfile, MasterTopology, OrchestratorProfile,
    Properties, PublicKey, ServicePrincipalProfile, SshConfiguration, Subnet,
};

use std::path::Path;
use tracing::info;

use crate::error::Result;

/// Load a cluster definition from a file
///
/// # Arguments
///
/// * `path` - Path to the api model
///
/// # Returns
///
/// The normalized model or an error
pub fn load_api_model<P: AsRef<Path>>(path: P) -> Result<ApiModel> {
    let path = path.as_ref();
    let model = ApiModel::from_file(path)?;

    info!(
        document = %path.display(),
        api_version = model.api_version.as_str(),
        "Loaded api model"
    );
    Ok(model)
}
