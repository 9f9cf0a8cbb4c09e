// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generation pipeline controller
//!
//! Sequences load, merge, validate, generate, post-process and persist for a
//! single cluster definition. Every stage failure ends the run; there are no
//! retries and no partial results.

use std::path::PathBuf;

use tracing::{debug, error, info};

use super::engine::{ArmTemplateGenerator, GeneratorCode, TemplateGenerator};
use super::pretty::{ArmPrettyPrinter, PrettyPrinter};
use super::validator::{self, GenerateOptions};
use super::writer::{ArtifactSet, ArtifactWriter, FileArtifactWriter};
use crate::apimodel::{self, ApiVersion, Overrides};
use crate::config::Config;
use crate::error::{Result, Stage};
use crate::i18n::Translator;

/// Progress of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Loaded,
    Merged,
    Validated,
    Generated,
    PostProcessed,
    Persisted,
    Done,
    /// Absorbing failure state, with the stage that failed
    Errored(Stage),
}

impl PipelineState {
    /// State reached once `stage` completes
    fn after(stage: Stage) -> Self {
        match stage {
            Stage::Localize => PipelineState::Idle,
            Stage::Load => PipelineState::Loaded,
            Stage::Merge => PipelineState::Merged,
            Stage::Validate => PipelineState::Validated,
            Stage::Generate => PipelineState::Generated,
            Stage::PostProcess => PipelineState::PostProcessed,
            Stage::Persist => PipelineState::Persisted,
        }
    }
}

/// One generation request
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub options: GenerateOptions,
    /// Applied between load and validate when present
    pub overrides: Option<Overrides>,
}

impl GenerateRequest {
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            options,
            overrides: None,
        }
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = Some(overrides);
        self
    }
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub output_directory: PathBuf,
    pub api_version: ApiVersion,
    pub certs_generated: bool,
    pub final_state: PipelineState,
}

/// Pipeline controller; the only component that invokes the generator and writer
pub struct GeneratePipeline {
    generator: Box<dyn TemplateGenerator>,
    printer: Box<dyn PrettyPrinter>,
    writer: Box<dyn ArtifactWriter>,
}

/// Tracks the state machine for one run
struct Run<'a> {
    document: &'a str,
    state: PipelineState,
}

impl<'a> Run<'a> {
    fn new(document: &'a str) -> Self {
        Self {
            document,
            state: PipelineState::Idle,
        }
    }

    fn step<T>(&mut self, stage: Stage, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => {
                self.state = PipelineState::after(stage);
                debug!(stage = %stage, state = ?self.state, "Stage complete");
                Ok(value)
            }
            Err(e) => {
                self.state = PipelineState::Errored(stage);
                error!(stage = %stage, document = %self.document, error = %e, "Stage failed");
                Err(e.in_stage(stage, self.document))
            }
        }
    }
}

impl GeneratePipeline {
    /// Create a pipeline from explicit capabilities
    pub fn new(
        generator: Box<dyn TemplateGenerator>,
        printer: Box<dyn PrettyPrinter>,
        writer: Box<dyn ArtifactWriter>,
    ) -> Self {
        Self {
            generator,
            printer,
            writer,
        }
    }

    /// Create a pipeline wired to the built-in generator, printer and writer
    ///
    /// Resolves the localization context first; missing translation
    /// resources are fatal.
    pub fn builtin(config: &Config) -> Result<Self> {
        let translator = Translator::load(&config.i18n)
            .map_err(|e| e.in_stage(Stage::Localize, "translations"))?;
        debug!(language = translator.language(), "Resolved translations");

        Ok(Self::new(
            Box::new(ArmTemplateGenerator::new(translator.clone())),
            Box::new(ArmPrettyPrinter),
            Box::new(FileArtifactWriter::new(translator)),
        ))
    }

    /// Execute a full run
    pub fn run(&self, request: &GenerateRequest) -> Result<GenerateReport> {
        let options = &request.options;
        let document = options.api_model_path.display().to_string();
        let mut run = Run::new(&document);

        let mut model = run.step(Stage::Load, apimodel::load_api_model(&options.api_model_path))?;

        if let Some(overrides) = &request.overrides {
            overrides.apply(&mut model);
        }
        run.step(Stage::Merge, Ok(()))?;

        let validated = run.step(Stage::Validate, validator::validate(options, model))?;

        let code = GeneratorCode::from_classic_mode(options.classic_mode);
        info!(
            document = %document,
            code = %code,
            output_directory = %validated.output_directory().display(),
            "Generation started"
        );
        let generated = run.step(Stage::Generate, self.generator.generate(&validated, code))?;

        let (template, parameters) = if options.pretty_print {
            let formatted = self
                .printer
                .template(&generated.template)
                .and_then(|t| Ok((t, self.printer.parameters(&generated.parameters)?)));
            run.step(Stage::PostProcess, formatted)?
        } else {
            run.step(
                Stage::PostProcess,
                Ok((generated.template.clone(), generated.parameters.clone())),
            )?
        };

        let artifacts = ArtifactSet {
            model: validated.model(),
            api_version: validated.api_version(),
            template: &template,
            parameters: &parameters,
            output_directory: validated.output_directory(),
            certs_generated: generated.certs_generated(),
            parameters_only: options.parameters_only,
            generated_pki: generated.generated_pki.as_ref(),
        };
        run.step(Stage::Persist, self.writer.write(&artifacts))?;
        info!(
            output_directory = %validated.output_directory().display(),
            "Persist complete"
        );

        run.state = PipelineState::Done;
        Ok(GenerateReport {
            output_directory: validated.output_directory().to_path_buf(),
            api_version: validated.api_version(),
            certs_generated: generated.certs_generated(),
            final_state: run.state,
        })
    }
}

/// Load, merge and validate without generating anything
pub fn check(request: &GenerateRequest) -> Result<validator::ValidatedModel> {
    let options = &request.options;
    let document = options.api_model_path.display().to_string();
    let mut run = Run::new(&document);

    let mut model = run.step(Stage::Load, apimodel::load_api_model(&options.api_model_path))?;
    if let Some(overrides) = &request.overrides {
        overrides.apply(&mut model);
    }
    run.step(Stage::Merge, Ok(()))?;
    run.step(Stage::Validate, validator::validate(options, model))
}

impl std::fmt::Debug for GeneratePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratePipeline").finish_non_exhaustive()
    }
}
