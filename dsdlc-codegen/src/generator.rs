//! Generation driver: type model in, header files out.

use crate::cpp::{OUTPUT_FILE_EXTENSION, RenderingContext, build_with_extension, output_relative_path};
use crate::error::{CodegenError, Result, Stage};
use crate::template::{CompiledTemplate, TemplateCache};
use crate::writer::{OutputWriter, WriteOutcome};
use dsdlc_schema::{CompoundType, validate_types};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What to do when one type fails to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure and return it.
    #[default]
    Abort,
    /// Record the failure in the summary and go on with the next type.
    Continue,
}

/// Result of generating one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedType {
    /// Dotted full name of the type.
    pub full_name: String,
    /// Output file path.
    pub path: PathBuf,
    /// What happened to the file; `None` for dry runs.
    pub outcome: Option<WriteOutcome>,
}

/// Report of a generation run.
#[derive(Debug, Default)]
pub struct GenerationSummary {
    /// Types that were generated (or would have been, in a dry run).
    pub entries: Vec<GeneratedType>,
    /// Per-type failures recorded under [`FailurePolicy::Continue`].
    pub failures: Vec<CodegenError>,
}

impl GenerationSummary {
    /// Returns true if no type failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Output paths in generation order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|entry| entry.path.as_path())
    }

    /// Number of entries with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: WriteOutcome) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome == Some(outcome))
            .count()
    }
}

/// Builder-style generator configuration.
#[derive(Debug, Clone)]
pub struct Generator {
    output_dir: PathBuf,
    template_path: PathBuf,
    dry_run: bool,
    failure_policy: FailurePolicy,
    file_extension: Option<String>,
    cache: Arc<TemplateCache>,
    writer: OutputWriter,
}

impl Generator {
    /// Creates a generator writing below `output_dir` with the given template.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, template_path: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            template_path: template_path.into(),
            dry_run: false,
            failure_policy: FailurePolicy::default(),
            file_extension: None,
            cache: Arc::new(TemplateCache::new()),
            writer: OutputWriter::new(),
        }
    }

    /// Only reports the paths that would be generated.
    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Overrides the extension of output files and of the `#include` lines
    /// that refer to them.
    #[must_use]
    pub fn file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = Some(extension.into());
        self
    }

    /// Shares a template cache between generators.
    #[must_use]
    pub fn cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the output writer.
    #[must_use]
    pub fn writer(mut self, writer: OutputWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Returns the output file of `ty` below `output_dir`.
    #[must_use]
    pub fn output_path(&self, output_dir: &Path, ty: &CompoundType) -> PathBuf {
        output_dir.join(output_relative_path(ty, self.extension()))
    }

    fn extension(&self) -> &str {
        self.file_extension.as_deref().unwrap_or(OUTPUT_FILE_EXTENSION)
    }

    /// Generates one header per type.
    ///
    /// Every context is built, and thereby every constant literal checked,
    /// before the first template expansion.
    ///
    /// # Arguments
    /// * `types` - Top-level messages and services, in output order
    ///
    /// # Returns
    /// The generated paths and their write outcomes.
    ///
    /// # Errors
    /// Returns `NoTypes` for empty input, schema errors for an inconsistent
    /// model, template compile errors, and under [`FailurePolicy::Abort`] the
    /// first per-type failure wrapped with its type name and stage.
    pub fn run(&self, types: &[CompoundType]) -> Result<GenerationSummary> {
        if types.is_empty() {
            return Err(CodegenError::NoTypes);
        }
        validate_types(types)?;
        tracing::info!("{} types total", types.len());

        let output_dir = std::path::absolute(&self.output_dir)?;
        let mut summary = GenerationSummary::default();

        if self.dry_run {
            for ty in types {
                let path = self.output_path(&output_dir, ty);
                tracing::info!("Would have generated type {} as {}", ty.full_name, path.display());
                summary.entries.push(GeneratedType {
                    full_name: ty.full_name.clone(),
                    path,
                    outcome: None,
                });
            }
            return Ok(summary);
        }

        let mut contexts = Vec::with_capacity(types.len());
        for ty in types {
            match build_with_extension(ty, self.extension()) {
                Ok(ctx) => contexts.push((ty, ctx)),
                Err(e) => self.record_failure(e.in_type(&ty.full_name, Stage::Context), &mut summary)?,
            }
        }

        let template = self.cache.get_or_compile(&self.template_path)?;

        for (ty, ctx) in &contexts {
            let path = self.output_path(&output_dir, ty);
            tracing::info!("Generating type {}", ty.full_name);
            match self.generate_one(&template, ctx, &path) {
                Ok(outcome) => summary.entries.push(GeneratedType {
                    full_name: ty.full_name.clone(),
                    path,
                    outcome: Some(outcome),
                }),
                Err((stage, e)) => {
                    self.record_failure(e.in_type(&ty.full_name, stage), &mut summary)?;
                }
            }
        }

        Ok(summary)
    }

    fn generate_one(
        &self,
        template: &CompiledTemplate,
        ctx: &RenderingContext<'_>,
        path: &Path,
    ) -> std::result::Result<WriteOutcome, (Stage, CodegenError)> {
        let text = template.expand(ctx).map_err(|e| (Stage::Expand, e))?;
        self.writer.write(path, &text).map_err(|e| (Stage::Write, e))
    }

    fn record_failure(&self, error: CodegenError, summary: &mut GenerationSummary) -> Result<()> {
        match self.failure_policy {
            FailurePolicy::Abort => Err(error),
            FailurePolicy::Continue => {
                tracing::warn!("{}", error);
                summary.failures.push(error);
                Ok(())
            }
        }
    }
}

/// Generates one header per type, stopping at the first failure.
///
/// # Arguments
/// * `types` - Top-level messages and services
/// * `output_dir` - Output root; created if missing
/// * `template_path` - Template in the extended syntax
/// * `dry_run` - Only report the paths that would be written
///
/// # Errors
/// See [`Generator::run`].
pub fn generate(
    types: &[CompoundType],
    output_dir: impl AsRef<Path>,
    template_path: impl AsRef<Path>,
    dry_run: bool,
) -> Result<GenerationSummary> {
    Generator::new(output_dir.as_ref(), template_path.as_ref())
        .dry_run(dry_run)
        .run(types)
}
