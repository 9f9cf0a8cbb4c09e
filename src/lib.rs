// SPDX-License-Identifier: AGPL-3.0-or-later
//! Kea-Forge: cluster template generation for the Kea ecosystem
//!
//! The Forge turns a declarative cluster definition into a deployable
//! infrastructure template, its parameters file and the PKI material the
//! cluster needs.
//!
//! # Pipeline
//!
//! * **Load:** Reads the api model and normalizes known upstream defects
//! * **Merge:** Applies runtime overrides for identity, DNS prefix and SSH key
//! * **Validate:** Enforces CA pairing and resolves the output directory
//! * **Generate / Persist:** Renders the template and writes the artifacts

pub mod apimodel;
pub mod config;
pub mod error;
pub mod generate;
pub mod i18n;

pub use config::Config;
pub use error::{ForgeError, Result, Stage};
