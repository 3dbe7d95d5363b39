//! libuavcan C++ mapping of the type model.

pub mod context;
pub mod types;

pub use context::{
    ConstantContext, FieldContext, MessageContext, OUTPUT_FILE_EXTENSION, RenderingContext,
    ServiceContext, TypeHeader, build, build_with_extension, include_path, output_relative_path,
};
pub use types::resolve;
