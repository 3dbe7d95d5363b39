//! # dsdlc Codegen
//!
//! libuavcan C++ header generation from DSDL type models.
//!
//! This crate provides:
//! - Mapping of DSDL types onto libuavcan C++ type expressions
//! - Per-type rendering contexts handed to the header template
//! - A Mako-like template syntax, compiled to minijinja
//! - Lazy, atomic writing of the generated headers

pub mod cpp;
pub mod error;
pub mod generator;
pub mod template;
pub mod writer;

pub use cpp::RenderingContext;
pub use error::{CodegenError, Stage};
pub use generator::{FailurePolicy, GeneratedType, GenerationSummary, Generator, generate};
pub use template::{CompiledTemplate, TemplateCache};
pub use writer::{OutputWriter, WriteOutcome};

/// Parses a type-model document and generates its headers.
///
/// # Arguments
/// * `xml` - Type-model document
/// * `output_dir` - Output root
/// * `template_path` - Header template
/// * `dry_run` - Only report the paths that would be written
///
/// # Errors
/// Returns `CodegenError` if parsing, validation or generation fails.
pub fn generate_from_xml(
    xml: &str,
    output_dir: &std::path::Path,
    template_path: &std::path::Path,
    dry_run: bool,
) -> Result<GenerationSummary, CodegenError> {
    let types = dsdlc_schema::parse_types(xml)?;
    generate(&types, output_dir, template_path, dry_run)
}

/// Reads a type-model document and generates its headers.
///
/// # Errors
/// Returns `CodegenError` if reading, parsing, validation or generation fails.
pub fn generate_from_file(
    path: &std::path::Path,
    output_dir: &std::path::Path,
    template_path: &std::path::Path,
    dry_run: bool,
) -> Result<GenerationSummary, CodegenError> {
    let types = dsdlc_schema::parse_file(path)?;
    generate(&types, output_dir, template_path, dry_run)
}
