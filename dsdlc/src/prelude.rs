//! Prelude module for convenient imports.
//!
//! ```ignore
//! use dsdlc::prelude::*;
//! ```

// Type model
pub use dsdlc_schema::{
    ArraySizing, Attribute, CastMode, CompoundType, Constant, PrimitiveKind, StructType,
    TypeDescriptor, parse_file, parse_types, validate_types,
};

// Generation
pub use dsdlc_codegen::{
    CodegenError, FailurePolicy, GenerationSummary, Generator, TemplateCache, WriteOutcome,
    generate, generate_from_file, generate_from_xml,
};
