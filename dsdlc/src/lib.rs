//! # dsdlc
//!
//! DSDL compiler for libuavcan: turns a DSDL type model into one C++ header
//! per message or service.
//!
//! ## Features
//!
//! - **Lazy output** - Headers whose content would not change are left untouched
//! - **Atomic writes** - A failed run never leaves half-written headers behind
//! - **Mako-like templates** - `${expr}` substitutions and `% for`/`% if` control lines
//!
//! ## Quick Start
//!
//! ```ignore
//! use dsdlc::prelude::*;
//!
//! let types = parse_file(Path::new("types.xml"))?;
//! let summary = Generator::new("dsdlc_generated", "data_type_template.tmpl")
//!     .failure_policy(FailurePolicy::Continue)
//!     .run(&types)?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`schema`] - Type model, type-model document parsing and validation
//! - [`codegen`] - Type mapping, rendering contexts, templates and output

pub mod prelude;

/// Type model, parsing and validation.
pub mod schema {
    pub use dsdlc_schema::*;
}

/// libuavcan header generation.
pub mod codegen {
    pub use dsdlc_codegen::*;
}
