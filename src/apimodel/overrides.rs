// SPDX-License-Identifier: AGPL-3.0-or-later
//! Runtime overrides applied on top of a loaded cluster definition

use tracing::debug;

use super::parser::{ApiModel, LinuxProfile, PublicKey, ServicePrincipalProfile};

/// Values supplied at run time that replace their document counterparts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    /// Replaces the document's service principal, including with none
    pub service_principal: Option<ServicePrincipalProfile>,

    /// DNS prefix for whichever control plane topology is present
    pub dns_prefix: String,

    /// Sole SSH public key for the linux profile
    pub ssh_public_key: String,
}

impl Overrides {
    /// Apply the overrides to a model
    ///
    /// Every field is replaced unconditionally. Applying the same overrides
    /// more than once yields the same model.
    pub fn apply(&self, model: &mut ApiModel) {
        let props = &mut model.properties;

        props.service_principal_profile = self.service_principal.clone();
        props.master.set_dns_prefix(self.dns_prefix.clone());

        let linux = props.linux_profile.get_or_insert_with(LinuxProfile::default);
        linux.ssh.public_keys = vec![PublicKey {
            key_data: self.ssh_public_key.clone(),
        }];

        debug!(
            dns_prefix = %self.dns_prefix,
            service_principal = self.service_principal.is_some(),
            "Applied runtime overrides"
        );
    }
}
