//! Error types for code generation.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage in which a per-type failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Building the rendering context (type mapping, literal validation).
    Context,
    /// Expanding the template.
    Expand,
    /// Writing the output file.
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Context => "context",
            Self::Expand => "expand",
            Self::Write => "write",
        })
    }
}

/// Error type for code generation operations.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Type-model document parsing error.
    #[error("type model parse error: {0}")]
    Parse(#[from] dsdlc_schema::ParseError),

    /// Type-model validation error.
    #[error("type model error: {0}")]
    Schema(#[from] dsdlc_schema::SchemaError),

    /// No types were supplied.
    #[error("no type definitions were found")]
    NoTypes,

    /// Type tag the resolver does not know how to map.
    #[error("unknown type: {description}")]
    UnknownType {
        /// Debug rendering of the offending type node.
        description: String,
    },

    /// Cast mode other than saturated or truncated.
    #[error("unknown cast mode: {mode}")]
    UnknownCastMode {
        /// Debug rendering of the offending cast mode.
        mode: String,
    },

    /// Array nesting deeper than the resolver accepts.
    #[error("type nesting exceeds {limit} levels")]
    TypeNestingTooDeep {
        /// Maximum accepted depth.
        limit: usize,
    },

    /// Constant literal that does not parse under its declared kind.
    #[error("invalid {expected} literal '{value}' for constant '{constant}'")]
    InvalidLiteral {
        /// Constant name.
        constant: String,
        /// Literal text.
        value: String,
        /// Expected literal kind ("float" or "integer").
        expected: &'static str,
    },

    /// Template could not be preprocessed or compiled.
    #[error("template error in {}: {message}", .path.display())]
    TemplateCompile {
        /// Template path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Template evaluation failed.
    #[error("template expansion error: {0}")]
    TemplateExpand(#[source] minijinja::Error),

    /// Output file could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Output path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while generating one type.
    #[error("failed to generate '{full_name}' ({stage}): {source}")]
    Type {
        /// Full name of the type.
        full_name: String,
        /// Stage that failed.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: Box<CodegenError>,
    },
}

impl CodegenError {
    /// Creates a template compile error.
    pub fn template_compile(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TemplateCompile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a write error.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Wraps this error with the type and stage it happened in.
    #[must_use]
    pub fn in_type(self, full_name: impl Into<String>, stage: Stage) -> Self {
        Self::Type {
            full_name: full_name.into(),
            stage,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through `Type` wrappers.
    #[must_use]
    pub fn root(&self) -> &CodegenError {
        match self {
            Self::Type { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type alias for code generation operations.
pub type Result<T> = std::result::Result<T, CodegenError>;
