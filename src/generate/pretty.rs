// SPDX-License-Identifier: AGPL-3.0-or-later
//! Canonical formatting for generated templates and parameter files

use serde_json::{json, Map, Value};

use crate::error::{ForgeError, Result};

const DEPLOYMENT_PARAMETERS_SCHEMA: &str =
    "https://schema.management.azure.com/schemas/2015-01-01/deploymentParameters.json#";

/// Top-level template keys, in the order they are written
const TEMPLATE_KEY_ORDER: &[&str] = &[
    "$schema",
    "contentVersion",
    "apiProfile",
    "parameters",
    "variables",
    "resources",
    "outputs",
];

/// Reformats generated payloads into a stable, human-readable form
pub trait PrettyPrinter {
    fn template(&self, template: &str) -> Result<String>;
    fn parameters(&self, parameters: &str) -> Result<String>;
}

/// Pretty printer for ARM deployment templates
#[derive(Debug, Default, Clone, Copy)]
pub struct ArmPrettyPrinter;

impl PrettyPrinter for ArmPrettyPrinter {
    fn template(&self, template: &str) -> Result<String> {
        let object = parse_object(template, "template")?;

        let mut ordered = Map::new();
        for key in TEMPLATE_KEY_ORDER {
            if let Some(value) = object.get(*key) {
                ordered.insert((*key).to_string(), value.clone());
            }
        }
        for (key, value) in object {
            if !TEMPLATE_KEY_ORDER.contains(&key.as_str()) {
                ordered.insert(key, value);
            }
        }

        render(&Value::Object(ordered), "template")
    }

    fn parameters(&self, parameters: &str) -> Result<String> {
        let object = parse_object(parameters, "template parameters")?;

        let document = json!({
            "$schema": DEPLOYMENT_PARAMETERS_SCHEMA,
            "contentVersion": "1.0.0.0",
            "parameters": object
        });
        render(&document, "template parameters")
    }
}

fn parse_object(payload: &str, what: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(ForgeError::FormatError {
            payload: what.to_string(),
            message: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(ForgeError::FormatError {
            payload: what.to_string(),
            message: e.to_string(),
        }),
    }
}

fn render(value: &Value, what: &str) -> Result<String> {
    let mut out = serde_json::to_string_pretty(value).map_err(|e| ForgeError::FormatError {
        payload: what.to_string(),
        message: e.to_string(),
    })?;
    out.push('\n');
    Ok(out)
}
