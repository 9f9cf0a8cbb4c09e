// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster definition document parser
//!
//! Documents are JSON. Before typed deserialization the content is
//! re-serialized in compact form with `subnet` leading its object, then
//! passed through [`strip_empty_subnet`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::error::{ForgeError, Result};

/// Empty subnet entry emitted by some upstream producers
const EMPTY_SUBNET: &str = r#""subnet":"","#;

/// Schema dialect of a cluster definition document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiVersion {
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "2016-09-30")]
    V20160930,
    #[serde(rename = "2017-07-01")]
    V20170701,
    #[serde(rename = "vlabs")]
    Vlabs,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V20160930 => "2016-09-30",
            ApiVersion::V20170701 => "2017-07-01",
            ApiVersion::Vlabs => "vlabs",
        }
    }

    /// Whether the dialect knows about externally hosted control planes
    pub fn supports_hosted_master(&self) -> bool {
        matches!(self, ApiVersion::V20170701 | ApiVersion::Vlabs)
    }
}

/// Normalized cluster definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiModel {
    /// Schema dialect the document was written against
    pub api_version: ApiVersion,

    /// Cluster properties
    pub properties: Properties,
}

/// Cluster properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProperties", into = "RawProperties")]
pub struct Properties {
    /// Control plane topology
    pub master: MasterTopology,

    pub orchestrator_profile: Option<OrchestratorProfile>,

    pub agent_pool_profiles: Vec<AgentPoolProfile>,

    pub linux_profile: Option<LinuxProfile>,

    /// Cloud identity; absent for definitions that don't need one
    pub service_principal_profile: Option<ServicePrincipalProfile>,

    /// CA material; absent until supplied or generated
    pub certificate_profile: Option<CertificateProfile>,

    /// Properties this crate does not interpret, kept verbatim
    pub extra: Map<String, Value>,
}

/// Control plane topology, exactly one per document
#[derive(Debug, Clone, PartialEq)]
pub enum MasterTopology {
    /// Control plane provisioned in the same deployment
    Managed(MasterProfile),
    /// Externally hosted control plane
    Hosted(HostedMasterProfile),
}

impl MasterTopology {
    pub fn dns_prefix(&self) -> &str {
        match self {
            MasterTopology::Managed(profile) => &profile.dns_prefix,
            MasterTopology::Hosted(profile) => &profile.dns_prefix,
        }
    }

    pub fn set_dns_prefix(&mut self, prefix: impl Into<String>) {
        match self {
            MasterTopology::Managed(profile) => profile.dns_prefix = prefix.into(),
            MasterTopology::Hosted(profile) => profile.dns_prefix = prefix.into(),
        }
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self, MasterTopology::Hosted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterProfile {
    #[serde(default = "default_master_count")]
    pub count: u32,

    #[serde(default)]
    pub dns_prefix: String,

    #[serde(default = "default_vm_size")]
    pub vm_size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Subnet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_consecutive_static_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostedMasterProfile {
    #[serde(default)]
    pub dns_prefix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorProfile {
    pub orchestrator_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestrator_release: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolProfile {
    pub name: String,

    #[serde(default = "default_agent_count")]
    pub count: u32,

    #[serde(default = "default_vm_size")]
    pub vm_size: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_profile: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Subnet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxProfile {
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    #[serde(default)]
    pub ssh: SshConfiguration,
}

impl Default for LinuxProfile {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            ssh: SshConfiguration::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfiguration {
    #[serde(default)]
    pub public_keys: Vec<PublicKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    #[serde(default)]
    pub key_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipalProfile {
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateProfile {
    #[serde(default)]
    pub ca_certificate: String,

    #[serde(default)]
    pub ca_private_key: String,
}

impl CertificateProfile {
    /// Both the certificate and the key are present
    pub fn is_complete(&self) -> bool {
        !self.ca_certificate.is_empty() && !self.ca_private_key.is_empty()
    }

    /// Neither the certificate nor the key is present
    pub fn is_empty(&self) -> bool {
        self.ca_certificate.is_empty() && self.ca_private_key.is_empty()
    }
}

/// IPv4 subnet in CIDR notation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Subnet(String);

impl Subnet {
    pub fn parse(value: &str) -> std::result::Result<Self, String> {
        let (addr, bits) = value
            .split_once('/')
            .ok_or_else(|| format!("invalid subnet '{}': expected CIDR notation", value))?;

        addr.parse::<Ipv4Addr>()
            .map_err(|e| format!("invalid subnet '{}': {}", value, e))?;

        match bits.parse::<u8>() {
            Ok(bits) if bits <= 32 => Ok(Subnet(value.to_string())),
            _ => Err(format!("invalid subnet '{}': bad prefix length", value)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Subnet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Subnet::parse(&value).map_err(serde::de::Error::custom)
    }
}

/// Wire shape of the properties section
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    orchestrator_profile: Option<OrchestratorProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    master_profile: Option<MasterProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    hosted_master_profile: Option<HostedMasterProfile>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    agent_pool_profiles: Vec<AgentPoolProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    linux_profile: Option<LinuxProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    service_principal_profile: Option<ServicePrincipalProfile>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    certificate_profile: Option<CertificateProfile>,

    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RawProperties> for Properties {
    type Error = String;

    fn try_from(raw: RawProperties) -> std::result::Result<Self, Self::Error> {
        let master = match (raw.master_profile, raw.hosted_master_profile) {
            (Some(profile), None) => MasterTopology::Managed(profile),
            (None, Some(profile)) => MasterTopology::Hosted(profile),
            (Some(_), Some(_)) => {
                return Err(
                    "masterProfile and hostedMasterProfile are mutually exclusive".to_string(),
                )
            }
            (None, None) => {
                return Err("one of masterProfile or hostedMasterProfile is required".to_string())
            }
        };

        Ok(Properties {
            master,
            orchestrator_profile: raw.orchestrator_profile,
            agent_pool_profiles: raw.agent_pool_profiles,
            linux_profile: raw.linux_profile,
            service_principal_profile: raw.service_principal_profile,
            certificate_profile: raw.certificate_profile,
            extra: raw.extra,
        })
    }
}

impl From<Properties> for RawProperties {
    fn from(props: Properties) -> Self {
        let (master_profile, hosted_master_profile) = match props.master {
            MasterTopology::Managed(profile) => (Some(profile), None),
            MasterTopology::Hosted(profile) => (None, Some(profile)),
        };

        RawProperties {
            orchestrator_profile: props.orchestrator_profile,
            master_profile,
            hosted_master_profile,
            agent_pool_profiles: props.agent_pool_profiles,
            linux_profile: props.linux_profile,
            service_principal_profile: props.service_principal_profile,
            certificate_profile: props.certificate_profile,
            extra: props.extra,
        }
    }
}

impl ApiModel {
    /// Load a cluster definition from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ForgeError::NotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ForgeError::ReadFailure {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_json(&contents)
    }

    /// Parse a cluster definition from JSON content
    pub fn from_json(contents: &str) -> Result<Self> {
        let compact = canonicalize(contents)?;
        let patched = strip_empty_subnet(&compact);

        let deserializer = &mut serde_json::Deserializer::from_str(&patched);
        let model: ApiModel = serde_path_to_error::deserialize(deserializer).map_err(|e| {
            ForgeError::SchemaError {
                field: e.path().to_string(),
                message: without_position(&e.into_inner()),
            }
        })?;

        model.check_version()?;
        Ok(model)
    }

    fn check_version(&self) -> Result<()> {
        if self.properties.master.is_hosted() && !self.api_version.supports_hosted_master() {
            return Err(ForgeError::SchemaError {
                field: "properties.hostedMasterProfile".to_string(),
                message: format!(
                    "hostedMasterProfile is not supported by apiVersion '{}'",
                    self.api_version.as_str()
                ),
            });
        }
        Ok(())
    }

    /// DNS prefix of whichever control plane topology is present
    pub fn dns_prefix(&self) -> &str {
        self.properties.master.dns_prefix()
    }
}

/// Remove the empty subnet entries some producers emit
///
/// Only the exact compact literal `"subnet":"",` is removed. Content without
/// it is returned unchanged.
pub fn strip_empty_subnet(contents: &str) -> Cow<'_, str> {
    if contents.contains(EMPTY_SUBNET) {
        Cow::Owned(contents.replace(EMPTY_SUBNET, ""))
    } else {
        Cow::Borrowed(contents)
    }
}

/// Re-serialize a JSON document in compact form
///
/// Key order is fixed rather than taken from the document: `subnet` leads
/// every object it appears in, so an empty subnet is followed by a comma
/// whenever its profile has any other field.
fn canonicalize(contents: &str) -> Result<String> {
    let value: Value = serde_json::from_str(contents).map_err(|e| ForgeError::SchemaError {
        field: "<document>".to_string(),
        message: e.to_string(),
    })?;
    Ok(serde_json::to_string(&subnet_first(value))?)
}

fn subnet_first(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut ordered = Map::new();
            let mut rest = Vec::with_capacity(map.len());
            for (key, value) in map {
                if key == "subnet" {
                    ordered.insert(key, subnet_first(value));
                } else {
                    rest.push((key, subnet_first(value)));
                }
            }
            ordered.extend(rest);
            Value::Object(ordered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(subnet_first).collect()),
        other => other,
    }
}

/// Error text without the position, which points into the compact buffer
fn without_position(err: &serde_json::Error) -> String {
    let mut message = err.to_string();
    let position = format!(" at line {} column {}", err.line(), err.column());
    if let Some(len) = message.strip_suffix(&position).map(str::len) {
        message.truncate(len);
    }
    message
}

// Default value functions

fn default_master_count() -> u32 {
    1
}

fn default_agent_count() -> u32 {
    1
}

fn default_vm_size() -> String {
    "Standard_D2_v2".to_string()
}

fn default_admin_username() -> String {
    "azureuser".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MANAGED: &str = r#"{
        "apiVersion": "vlabs",
        "properties": {
            "orchestratorProfile": { "orchestratorType": "Kubernetes" },
            "masterProfile": { "count": 3, "dnsPrefix": "prod", "vmSize": "Standard_D4_v2" },
            "agentPoolProfiles": [ { "name": "agentpool1", "count": 2 } ],
            "linuxProfile": {
                "adminUsername": "kea",
                "ssh": { "publicKeys": [ { "keyData": "ssh-rsa AAAA" } ] }
            },
            "servicePrincipalProfile": { "clientId": "id", "secret": "s3cret" }
        }
    }"#;

    #[test]
    fn test_parse_managed_document() {
        let model = ApiModel::from_json(MANAGED).unwrap();
        assert_eq!(model.api_version, ApiVersion::Vlabs);
        assert_eq!(model.dns_prefix(), "prod");
        match &model.properties.master {
            MasterTopology::Managed(profile) => {
                assert_eq!(profile.count, 3);
                assert_eq!(profile.vm_size, "Standard_D4_v2");
            }
            _ => panic!("Expected managed master profile"),
        }
        assert_eq!(model.properties.agent_pool_profiles[0].count, 2);
        assert_eq!(
            model.properties.linux_profile.as_ref().unwrap().admin_username,
            "kea"
        );
        assert!(model.properties.certificate_profile.is_none());
    }

    #[test]
    fn test_parse_hosted_document() {
        let model = ApiModel::from_json(
            r#"{"apiVersion":"2017-07-01","properties":{"hostedMasterProfile":{"dnsPrefix":"hosted"}}}"#,
        )
        .unwrap();
        assert!(model.properties.master.is_hosted());
        assert_eq!(model.dns_prefix(), "hosted");
    }

    #[test]
    fn test_hosted_rejected_for_old_version() {
        let err = ApiModel::from_json(
            r#"{"apiVersion":"v1","properties":{"hostedMasterProfile":{"dnsPrefix":"hosted"}}}"#,
        )
        .unwrap_err();
        match err {
            ForgeError::SchemaError { field, .. } => {
                assert_eq!(field, "properties.hostedMasterProfile")
            }
            other => panic!("Expected SchemaError, got {other:?}"),
        }
    }

    #[test]
    fn test_both_master_variants_rejected() {
        let err = ApiModel::from_json(
            r#"{"apiVersion":"vlabs","properties":{"masterProfile":{},"hostedMasterProfile":{}}}"#,
        )
        .unwrap_err();
        match err {
            ForgeError::SchemaError { field, message } => {
                assert!(field.starts_with("properties"));
                assert!(message.contains("mutually exclusive"));
            }
            other => panic!("Expected SchemaError, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_master_variant_rejected() {
        let err = ApiModel::from_json(r#"{"apiVersion":"vlabs","properties":{}}"#).unwrap_err();
        assert!(matches!(err, ForgeError::SchemaError { .. }));
    }

    #[test]
    fn test_unknown_api_version_reports_field() {
        let err = ApiModel::from_json(
            r#"{"apiVersion":"2099-01-01","properties":{"masterProfile":{}}}"#,
        )
        .unwrap_err();
        match err {
            ForgeError::SchemaError { field, message } => {
                assert_eq!(field, "apiVersion");
                assert!(message.contains("2099-01-01"));
            }
            other => panic!("Expected SchemaError, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_json_is_schema_error() {
        let err = ApiModel::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ForgeError::SchemaError { .. }));
    }

    #[test]
    fn test_empty_subnet_is_stripped_before_parsing() {
        let doc = r#"{
            "apiVersion": "vlabs",
            "properties": {
                "masterProfile": { "subnet": "", "dnsPrefix": "c1" },
                "agentPoolProfiles": [ { "subnet": "", "name": "pool" } ]
            }
        }"#;

        // the typed model alone rejects an empty subnet
        assert!(serde_json::from_str::<ApiModel>(doc).is_err());

        let model = ApiModel::from_json(doc).unwrap();
        assert_eq!(model.dns_prefix(), "c1");
        assert!(model.properties.agent_pool_profiles[0].subnet.is_none());
    }

    #[test]
    fn test_empty_subnet_as_last_key() {
        let model = ApiModel::from_json(
            r#"{
                "apiVersion": "vlabs",
                "properties": {
                    "masterProfile": { "dnsPrefix": "c1", "subnet": "" },
                    "agentPoolProfiles": [ { "name": "pool", "count": 2, "subnet": "" } ]
                }
            }"#,
        )
        .unwrap();
        assert_eq!(model.dns_prefix(), "c1");
        assert!(model.properties.agent_pool_profiles[0].subnet.is_none());
    }

    #[test]
    fn test_canonical_order_puts_subnet_first() {
        let compact = canonicalize(r#"{"a":{"x":1,"subnet":"","y":[{"z":2,"subnet":""}]}}"#)
            .unwrap();
        assert_eq!(
            compact,
            r#"{"a":{"subnet":"","x":1,"y":[{"subnet":"","z":2}]}}"#
        );
    }

    #[test]
    fn test_schema_error_has_no_buffer_position() {
        let err = ApiModel::from_json(
            r#"{"apiVersion":"vlabs","properties":{"masterProfile":{"dnsPrefix":"c1","count":"three"}}}"#,
        )
        .unwrap_err();
        match err {
            ForgeError::SchemaError { message, .. } => {
                assert!(!message.contains("line 1"));
                assert!(message.contains("invalid type"));
            }
            other => panic!("Expected SchemaError, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_subnet_is_kept() {
        let model = ApiModel::from_json(
            r#"{"apiVersion":"vlabs","properties":{"masterProfile":{"subnet":"10.240.0.0/16","dnsPrefix":"c1"}}}"#,
        )
        .unwrap();
        match &model.properties.master {
            MasterTopology::Managed(profile) => {
                assert_eq!(profile.subnet.as_ref().unwrap().as_str(), "10.240.0.0/16")
            }
            _ => panic!("Expected managed master profile"),
        }
    }

    #[test]
    fn test_strip_is_noop_on_clean_input() {
        let inputs = [
            r#"{"subnet":"10.0.0.0/8","x":1}"#,
            r#"{"subnet": "","x":1}"#,
            r#"{"x":1,"subnet":""}"#,
            r#"{"mysubnet":"x"}"#,
            "",
        ];
        for input in inputs {
            let out = strip_empty_subnet(input);
            assert!(matches!(out, Cow::Borrowed(_)));
            assert_eq!(out, input);
        }
    }

    #[test]
    fn test_strip_removes_only_exact_pattern() {
        let input = r#"{"a":{"subnet":"","b":1},"c":{"subnet":"10.0.0.0/8","d":2}}"#;
        assert_eq!(
            strip_empty_subnet(input),
            r#"{"a":{"b":1},"c":{"subnet":"10.0.0.0/8","d":2}}"#
        );
    }

    #[test]
    fn test_unknown_properties_survive_round_trip() {
        let model = ApiModel::from_json(
            r#"{"apiVersion":"vlabs","properties":{"masterProfile":{"dnsPrefix":"c1"},"aadProfile":{"tenantId":"t"}}}"#,
        )
        .unwrap();
        assert!(model.properties.extra.contains_key("aadProfile"));

        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("aadProfile"));
        assert!(json.contains("masterProfile"));
        assert!(!json.contains("hostedMasterProfile"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = ApiModel::from_file("/nonexistent/cluster.json").unwrap_err();
        assert!(matches!(err, ForgeError::NotFound { .. }));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("cluster.json");
        fs::write(&path, MANAGED).unwrap();

        let model = ApiModel::from_file(&path).unwrap();
        assert_eq!(model.dns_prefix(), "prod");
        // source document is left untouched
        assert_eq!(fs::read_to_string(&path).unwrap(), MANAGED);
    }
}
