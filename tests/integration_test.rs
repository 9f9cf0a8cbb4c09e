// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the forge CLI

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const CLUSTER: &str = r#"{
    "apiVersion": "vlabs",
    "properties": {
        "orchestratorProfile": { "orchestratorType": "Kubernetes" },
        "masterProfile": { "count": 1, "dnsPrefix": "testcluster", "vmSize": "Standard_D2_v2" },
        "agentPoolProfiles": [
            { "name": "agentpool1", "count": 3, "vmSize": "Standard_D2_v2" }
        ],
        "linuxProfile": {
            "adminUsername": "azureuser",
            "ssh": { "publicKeys": [ { "keyData": "ssh-rsa AAAAB3NzaC1yc2E test@example" } ] }
        },
        "servicePrincipalProfile": { "clientId": "client", "secret": "secret" }
    }
}"#;

/// Command running in `dir` with a config file that may not exist
fn forge(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("forge").unwrap();
    cmd.current_dir(dir).arg("--config").arg(dir.join("forge.toml"));
    cmd
}

/// Test the version command
#[test]
fn test_version_command() {
    let temp_dir = tempdir().unwrap();
    forge(temp_dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("Kea-Forge"))
        .stdout(predicate::str::contains("Template Smith"));
}

/// Test the help output
#[test]
fn test_help_command() {
    let mut cmd = Command::cargo_bin("forge").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Template Smith"))
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("validate"));
}

/// Test a full generation run into the derived output directory
#[test]
fn test_generate_writes_artifacts() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join("cluster.json"), CLUSTER).unwrap();

    forge(temp_dir.path())
        .arg("generate")
        .arg("cluster.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated assets into"))
        .stdout(predicate::str::contains("Generated a new cluster CA"));

    let out = temp_dir.path().join("_output").join("testcluster");
    for file in [
        "apimodel.json",
        "azuredeploy.json",
        "azuredeploy.parameters.json",
        "ca.crt",
        "ca.key",
    ] {
        assert!(out.join(file).exists(), "missing {}", file);
    }

    let template = std::fs::read_to_string(out.join("azuredeploy.json")).unwrap();
    assert!(template.starts_with("{\n  \"$schema\""));
    let ca = std::fs::read_to_string(out.join("ca.crt")).unwrap();
    assert!(ca.starts_with("-----BEGIN CERTIFICATE-----"));
}

/// Test that a rerun against the persisted model reuses its CA
#[test]
fn test_regenerate_from_persisted_model() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join("cluster.json"), CLUSTER).unwrap();

    forge(temp_dir.path())
        .args(["generate", "cluster.json"])
        .assert()
        .success();

    let out = temp_dir.path().join("_output").join("testcluster");
    let ca = std::fs::read_to_string(out.join("ca.crt")).unwrap();

    forge(temp_dir.path())
        .arg("generate")
        .arg("--api-model")
        .arg(out.join("apimodel.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated a new cluster CA").not());

    assert_eq!(std::fs::read_to_string(out.join("ca.crt")).unwrap(), ca);
}

/// Test that overrides change the derived output directory
#[test]
fn test_generate_with_overrides() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join("cluster.json"), CLUSTER).unwrap();

    forge(temp_dir.path())
        .args([
            "generate",
            "cluster.json",
            "--dns-prefix",
            "overridden",
            "--ssh-public-key",
            "ssh-rsa BBBB",
        ])
        .assert()
        .success();

    let out = temp_dir.path().join("_output").join("overridden");
    let persisted = std::fs::read_to_string(out.join("apimodel.json")).unwrap();
    assert!(persisted.contains("ssh-rsa BBBB"));
    assert!(!persisted.contains("ssh-rsa AAAAB3NzaC1yc2E"));
    // no client id was given, so the service principal is cleared
    assert!(!persisted.contains("servicePrincipalProfile"));
}

/// Test that parameters-only skips the template and model
#[test]
fn test_generate_parameters_only() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join("cluster.json"), CLUSTER).unwrap();
    let out = temp_dir.path().join("out");

    forge(temp_dir.path())
        .arg("generate")
        .arg("cluster.json")
        .arg("--parameters-only")
        .arg("--output-directory")
        .arg(&out)
        .assert()
        .success();

    assert!(out.join("azuredeploy.parameters.json").exists());
    assert!(!out.join("azuredeploy.json").exists());
    assert!(!out.join("apimodel.json").exists());
}

/// Test a missing cluster definition
#[test]
fn test_generate_missing_document() {
    let temp_dir = tempdir().unwrap();

    forge(temp_dir.path())
        .args(["generate", "missing.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.json"));

    assert!(!temp_dir.path().join("_output").exists());
}

/// Test that neither positional nor flag is an error
#[test]
fn test_generate_without_api_model() {
    let temp_dir = tempdir().unwrap();

    forge(temp_dir.path())
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "--api-model was not supplied, nor was one specified as a positional argument",
        ));
}

/// Test that a lone CA certificate path is rejected
#[test]
fn test_generate_one_sided_ca() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join("cluster.json"), CLUSTER).unwrap();
    std::fs::write(temp_dir.path().join("ca.crt"), "CERT").unwrap();

    forge(temp_dir.path())
        .args(["generate", "cluster.json", "--ca-certificate-path", "ca.crt"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--ca-certificate-path"))
        .stderr(predicate::str::contains("--ca-private-key-path"));

    assert!(!temp_dir.path().join("_output").exists());
}

/// Test that a malformed subnet is reported as a schema error
#[test]
fn test_generate_invalid_subnet() {
    let temp_dir = tempdir().unwrap();
    let doc = CLUSTER.replace(
        r#""dnsPrefix": "testcluster","#,
        r#""dnsPrefix": "testcluster", "subnet": "not-a-subnet","#,
    );
    std::fs::write(temp_dir.path().join("cluster.json"), doc).unwrap();

    forge(temp_dir.path())
        .args(["generate", "cluster.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Schema error"));
}

/// Test that an empty subnet string is tolerated
#[test]
fn test_generate_empty_subnet() {
    let temp_dir = tempdir().unwrap();
    let doc = CLUSTER.replace(
        r#""dnsPrefix": "testcluster","#,
        r#""dnsPrefix": "testcluster", "subnet": "","#,
    );
    std::fs::write(temp_dir.path().join("cluster.json"), doc).unwrap();

    forge(temp_dir.path())
        .args(["validate", "cluster.json"])
        .assert()
        .success();
}

/// Test that an empty subnet is tolerated as the last key of a pool
#[test]
fn test_generate_empty_subnet_last_key() {
    let temp_dir = tempdir().unwrap();
    let doc = CLUSTER.replace(
        r#""vmSize": "Standard_D2_v2" }
        ]"#,
        r#""vmSize": "Standard_D2_v2", "subnet": "" }
        ]"#,
    );
    assert!(doc.contains(r#""subnet": "" }"#));
    std::fs::write(temp_dir.path().join("cluster.json"), doc).unwrap();

    forge(temp_dir.path())
        .args(["generate", "cluster.json"])
        .assert()
        .success();
}

/// Test that a document carrying only half of a CA is rejected
#[test]
fn test_generate_one_sided_document_ca() {
    let temp_dir = tempdir().unwrap();
    let doc = CLUSTER.replace(
        r#""servicePrincipalProfile""#,
        r#""certificateProfile": { "caCertificate": "CERT" },
        "servicePrincipalProfile""#,
    );
    std::fs::write(temp_dir.path().join("cluster.json"), doc).unwrap();

    forge(temp_dir.path())
        .args(["generate", "cluster.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("caPrivateKey"));

    assert!(!temp_dir.path().join("_output").exists());
}

/// Test the validate command
#[test]
fn test_validate_command() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join("cluster.json"), CLUSTER).unwrap();

    forge(temp_dir.path())
        .args(["validate", "cluster.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("API version: vlabs"))
        .stdout(predicate::str::contains("DNS prefix: testcluster"));

    // validation never writes artifacts
    assert!(!temp_dir.path().join("_output").exists());
}

/// Test config init command
#[test]
fn test_init_config() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("forge.toml");

    forge(temp_dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    assert!(config_path.exists());
    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("SPDX-License-Identifier"));
    assert!(content.contains("pretty_print = true"));
}

/// Test config init fails if file exists without --force
#[test]
fn test_init_config_no_overwrite() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join("forge.toml"), "existing").unwrap();

    forge(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

/// Test config init with --force overwrites
#[test]
fn test_init_config_force() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("forge.toml");
    std::fs::write(&config_path, "existing").unwrap();

    forge(temp_dir.path())
        .args(["init", "--force"])
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[generator]"));
}

/// Test config show with defaults
#[test]
fn test_config_show_defaults() {
    let temp_dir = tempdir().unwrap();

    forge(temp_dir.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("No configuration file found"))
        .stdout(predicate::str::contains("name = \"forge\""));
}

/// Test that the configured output root is honored
#[test]
fn test_config_output_root() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(temp_dir.path().join("cluster.json"), CLUSTER).unwrap();
    std::fs::write(
        temp_dir.path().join("forge.toml"),
        r#"name = "test"

[output]
root = "clusters"

[generator]
pretty_print = false
"#,
    )
    .unwrap();

    forge(temp_dir.path())
        .args(["generate", "cluster.json"])
        .assert()
        .success();

    let template =
        std::fs::read_to_string(temp_dir.path().join("clusters/testcluster/azuredeploy.json"))
            .unwrap();
    // compact output when pretty printing is disabled
    assert!(!template.contains('\n'));
}
