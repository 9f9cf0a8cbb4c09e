// SPDX-License-Identifier: AGPL-3.0-or-later
//! Template generation
//!
//! [`TemplateGenerator`] is the seam between the pipeline and whatever
//! renders a deployment template. [`ArmTemplateGenerator`] is the built-in
//! renderer: it emits a compact ARM deployment template skeleton and
//! synthesizes a CA when the model carries none.

use std::fmt;

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    KeyUsagePurpose,
};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use super::validator::ValidatedModel;
use crate::apimodel::{ApiModel, CertificateProfile, MasterTopology};
use crate::error::{ForgeError, Result};
use crate::i18n::Translator;

const DEPLOYMENT_TEMPLATE_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2015-01-01/deploymentTemplate.json#";

/// CA validity in years
const CA_VALIDITY_YEARS: i64 = 10;

/// Rendering profile requested from the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorCode {
    /// Classic parameters and outputs
    Classic,
    /// Current output shape
    Modern,
}

impl GeneratorCode {
    pub fn from_classic_mode(classic_mode: bool) -> Self {
        if classic_mode {
            GeneratorCode::Classic
        } else {
            GeneratorCode::Modern
        }
    }
}

impl fmt::Display for GeneratorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorCode::Classic => f.write_str("classic"),
            GeneratorCode::Modern => f.write_str("modern"),
        }
    }
}

/// Output of a template generator
#[derive(Debug, Clone)]
pub struct GeneratedTemplate {
    /// Rendered deployment template
    pub template: String,
    /// Rendered parameter values
    pub parameters: String,
    /// CA material created during generation, if any
    pub generated_pki: Option<CertificateProfile>,
}

impl GeneratedTemplate {
    pub fn certs_generated(&self) -> bool {
        self.generated_pki.is_some()
    }
}

/// Renders a validated model into a deployment template
pub trait TemplateGenerator {
    fn generate(&self, model: &ValidatedModel, code: GeneratorCode) -> Result<GeneratedTemplate>;
}

/// Built-in ARM template renderer
pub struct ArmTemplateGenerator {
    translator: Translator,
}

impl ArmTemplateGenerator {
    pub fn new(translator: Translator) -> Self {
        Self { translator }
    }

    fn engine_error(
        &self,
        validated: &ValidatedModel,
        msgid: &str,
        detail: impl fmt::Display,
    ) -> ForgeError {
        ForgeError::EngineError {
            document: validated.source().display().to_string(),
            message: format!("{}: {}", self.translator.t(msgid), detail),
        }
    }

    /// Create a self-signed CA for the cluster
    fn generate_ca(&self, validated: &ValidatedModel) -> Result<CertificateProfile> {
        let mut params = CertificateParams::new(Vec::<String>::new())
            .map_err(|e| self.engine_error(validated, "failed to create CA parameters", e))?;

        params.distinguished_name = DistinguishedName::new();
        params
            .distinguished_name
            .push(DnType::CommonName, format!("{}-ca", validated.model().dns_prefix()));
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];

        let now = time::OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + time::Duration::days(CA_VALIDITY_YEARS * 365);

        let key_pair = KeyPair::generate()
            .map_err(|e| self.engine_error(validated, "failed to generate CA key pair", e))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| self.engine_error(validated, "failed to generate CA certificate", e))?;

        debug!(dns_prefix = validated.model().dns_prefix(), "Generated cluster CA");
        Ok(CertificateProfile {
            ca_certificate: cert.pem(),
            ca_private_key: key_pair.serialize_pem(),
        })
    }
}

impl TemplateGenerator for ArmTemplateGenerator {
    fn generate(
        &self,
        validated: &ValidatedModel,
        code: GeneratorCode,
    ) -> Result<GeneratedTemplate> {
        let model = validated.model();

        let existing = model
            .properties
            .certificate_profile
            .as_ref()
            .filter(|profile| profile.is_complete());
        let generated_pki = match existing {
            Some(_) => None,
            None => Some(self.generate_ca(validated)?),
        };
        let ca = existing.or(generated_pki.as_ref());

        let template = render_template(model, code);
        let parameters = render_parameters(model, ca, code);

        let template = serde_json::to_string(&template)
            .map_err(|e| self.engine_error(validated, "failed to serialize template", e))?;
        let parameters = serde_json::to_string(&parameters)
            .map_err(|e| self.engine_error(validated, "failed to serialize parameters", e))?;

        info!(
            code = %code,
            certs_generated = generated_pki.is_some(),
            "Rendered deployment template"
        );

        Ok(GeneratedTemplate {
            template,
            parameters,
            generated_pki,
        })
    }
}

fn parameter_definition(kind: &str, description: &str) -> Value {
    json!({
        "type": kind,
        "metadata": { "description": description }
    })
}

fn render_template(model: &ApiModel, code: GeneratorCode) -> Value {
    let props = &model.properties;
    let mut parameters = Map::new();
    let mut resources = Vec::new();
    let mut outputs = Map::new();

    parameters.insert(
        "dnsNamePrefix".into(),
        parameter_definition("string", "DNS prefix for the cluster endpoints"),
    );
    parameters.insert(
        "linuxAdminUsername".into(),
        parameter_definition("string", "User name for the Linux virtual machines"),
    );
    parameters.insert(
        "sshRSAPublicKey".into(),
        parameter_definition("string", "SSH public key for the admin user"),
    );
    parameters.insert(
        "caCertificate".into(),
        parameter_definition("securestring", "Cluster CA certificate"),
    );
    parameters.insert(
        "caPrivateKey".into(),
        parameter_definition("securestring", "Cluster CA private key"),
    );
    if props.service_principal_profile.is_some() {
        parameters.insert(
            "servicePrincipalClientId".into(),
            parameter_definition("securestring", "Service principal client id"),
        );
        parameters.insert(
            "servicePrincipalClientSecret".into(),
            parameter_definition("securestring", "Service principal client secret"),
        );
    }
    if code == GeneratorCode::Classic {
        parameters.insert(
            "orchestratorVersion".into(),
            parameter_definition("string", "Orchestrator release"),
        );
    }

    match &props.master {
        MasterTopology::Managed(_) => {
            parameters.insert(
                "masterCount".into(),
                parameter_definition("int", "Number of control plane nodes"),
            );
            parameters.insert(
                "masterVMSize".into(),
                parameter_definition("string", "Size of the control plane nodes"),
            );
            resources.push(json!({
                "type": "Microsoft.Compute/virtualMachines",
                "apiVersion": "2017-03-30",
                "name": "[concat('k8s-master-', parameters('dnsNamePrefix'), '-', copyIndex())]",
                "location": "[resourceGroup().location]",
                "copy": { "name": "masterLoop", "count": "[parameters('masterCount')]" },
                "properties": {
                    "hardwareProfile": { "vmSize": "[parameters('masterVMSize')]" },
                    "osProfile": {
                        "adminUsername": "[parameters('linuxAdminUsername')]",
                        "computerName": "[concat('k8s-master-', copyIndex())]"
                    }
                }
            }));
        }
        MasterTopology::Hosted(_) => {
            resources.push(json!({
                "type": "Microsoft.ContainerService/managedClusters",
                "apiVersion": "2017-08-31",
                "name": "[parameters('dnsNamePrefix')]",
                "location": "[resourceGroup().location]",
                "properties": { "dnsPrefix": "[parameters('dnsNamePrefix')]" }
            }));
        }
    }

    for pool in &props.agent_pool_profiles {
        parameters.insert(
            format!("{}Count", pool.name),
            parameter_definition("int", "Number of agent nodes in the pool"),
        );
        parameters.insert(
            format!("{}VMSize", pool.name),
            parameter_definition("string", "Size of the agent nodes in the pool"),
        );
        resources.push(json!({
            "type": "Microsoft.Compute/virtualMachineScaleSets",
            "apiVersion": "2017-03-30",
            "name": format!("[concat(parameters('dnsNamePrefix'), '-{}')]", pool.name),
            "location": "[resourceGroup().location]",
            "sku": {
                "name": format!("[parameters('{}VMSize')]", pool.name),
                "capacity": format!("[parameters('{}Count')]", pool.name)
            }
        }));
        if code == GeneratorCode::Classic {
            outputs.insert(
                format!("{}FQDN", pool.name),
                json!({
                    "type": "string",
                    "value": format!(
                        "[concat(parameters('dnsNamePrefix'), '-{}.', resourceGroup().location, '.cloudapp.azure.com')]",
                        pool.name
                    )
                }),
            );
        }
    }

    outputs.insert(
        "masterFQDN".into(),
        json!({
            "type": "string",
            "value": "[concat(parameters('dnsNamePrefix'), '.', resourceGroup().location, '.cloudapp.azure.com')]"
        }),
    );

    let orchestrator = props
        .orchestrator_profile
        .as_ref()
        .map(|o| o.orchestrator_type.as_str())
        .unwrap_or("Kubernetes");

    json!({
        "$schema": DEPLOYMENT_TEMPLATE_SCHEMA,
        "contentVersion": "1.0.0.0",
        "parameters": parameters,
        "variables": {
            "orchestratorType": orchestrator,
            "apiModelVersion": model.api_version.as_str()
        },
        "resources": resources,
        "outputs": outputs
    })
}

fn render_parameters(
    model: &ApiModel,
    ca: Option<&CertificateProfile>,
    code: GeneratorCode,
) -> Value {
    let props = &model.properties;
    let mut values = Map::new();
    let mut set = |name: String, value: Value| {
        values.insert(name, json!({ "value": value }));
    };

    set("dnsNamePrefix".into(), json!(model.dns_prefix()));

    if let Some(linux) = &props.linux_profile {
        set("linuxAdminUsername".into(), json!(linux.admin_username));
        if let Some(key) = linux.ssh.public_keys.first() {
            set("sshRSAPublicKey".into(), json!(key.key_data));
        }
    }

    if let Some(ca) = ca {
        set("caCertificate".into(), json!(ca.ca_certificate));
        set("caPrivateKey".into(), json!(ca.ca_private_key));
    }

    if let Some(sp) = &props.service_principal_profile {
        set("servicePrincipalClientId".into(), json!(sp.client_id));
        set("servicePrincipalClientSecret".into(), json!(sp.secret));
    }

    if code == GeneratorCode::Classic {
        let release = props
            .orchestrator_profile
            .as_ref()
            .and_then(|o| o.orchestrator_release.clone())
            .unwrap_or_default();
        set("orchestratorVersion".into(), json!(release));
    }

    if let MasterTopology::Managed(master) = &props.master {
        set("masterCount".into(), json!(master.count));
        set("masterVMSize".into(), json!(master.vm_size));
    }

    for pool in &props.agent_pool_profiles {
        set(format!("{}Count", pool.name), json!(pool.count));
        set(format!("{}VMSize", pool.name), json!(pool.vm_size));
    }

    Value::Object(values)
}
