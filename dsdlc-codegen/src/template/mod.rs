//! Template handling: extended syntax preprocessing, lowering to minijinja
//! and expansion.

pub mod engine;
pub mod lower;
pub mod preprocess;

pub use engine::{CompiledTemplate, TemplateCache};
pub use lower::{LowerError, lower};
pub use preprocess::preprocess;
