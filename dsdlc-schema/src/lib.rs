//! # dsdlc Schema
//!
//! DSDL type model consumed by the code generator.
//!
//! This crate provides:
//! - Type definitions for compound types, fields, constants and type nodes
//! - A parser for the type-model document emitted by the DSDL front end
//! - Validation of the invariants the generator relies on

pub mod error;
pub mod parser;
pub mod types;
pub mod validation;

pub use error::{ParseError, SchemaError};
pub use parser::{parse_file, parse_types};
pub use types::{
    ArraySizing, ArrayType, Attribute, CastMode, CompoundKind, CompoundType, Constant,
    MAX_TYPE_DEPTH, PrimitiveKind, PrimitiveType, StructType, TypeDescriptor, VoidType,
};
pub use validation::validate_types;
