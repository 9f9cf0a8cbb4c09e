// SPDX-License-Identifier: AGPL-3.0-or-later
//! Template generation pipeline
//!
//! Validation, the generator / pretty printer / artifact writer seams, and
//! the controller that runs them in order.

mod engine;
mod pipeline;
mod pretty;
mod validator;
mod writer;

pub use engine::{ArmTemplateGenerator, GeneratedTemplate, GeneratorCode, TemplateGenerator};
pub use pipeline::{check, GeneratePipeline, GenerateReport, GenerateRequest, PipelineState};
pub use pretty::{ArmPrettyPrinter, PrettyPrinter};
pub use validator::{validate, GenerateOptions, ValidatedModel};
pub use writer::{
    ArtifactSet, ArtifactWriter, FileArtifactWriter, APIMODEL_FILE, CA_CERTIFICATE_FILE,
    CA_PRIVATE_KEY_FILE, PARAMETERS_FILE, TEMPLATE_FILE,
};
