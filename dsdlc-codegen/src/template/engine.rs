//! Template compilation and expansion.

use crate::cpp::RenderingContext;
use crate::error::{CodegenError, Result};
use crate::template::lower::lower;
use crate::template::preprocess::preprocess;
use minijinja::value::Value;
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior, context};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::iter::Peekable;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const TEMPLATE_NAME: &str = "data_type";
const DEFAULT_INDENT: &str = "    ";

/// A template that went through preprocessing, lowering and compilation and
/// can be expanded any number of times.
pub struct CompiledTemplate {
    path: PathBuf,
    env: Environment<'static>,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl CompiledTemplate {
    /// Compiles template source written in the extended syntax.
    ///
    /// # Arguments
    /// * `path` - Path reported in errors
    /// * `source` - Template text
    ///
    /// # Errors
    /// Returns [`CodegenError::TemplateCompile`] if the source is malformed.
    pub fn compile(path: impl Into<PathBuf>, source: &str) -> Result<Self> {
        let path = path.into();
        let lowered = lower(&preprocess(source))
            .map_err(|e| CodegenError::template_compile(&path, e.to_string()))?;

        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_function("indent", indent);
        env.add_function("enum_last_value", enum_last_value);
        env.add_function("enumerate", enumerate);
        env.add_function("len", len);
        env.add_template_owned(TEMPLATE_NAME, lowered)
            .map_err(|e| CodegenError::template_compile(&path, e.to_string()))?;

        Ok(Self { path, env })
    }

    /// Reads and compiles a template file.
    ///
    /// # Errors
    /// Returns [`CodegenError::TemplateCompile`] if the file cannot be read or
    /// is malformed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            CodegenError::template_compile(path, format!("failed to read template: {e}"))
        })?;
        tracing::debug!("compiling template {}", path.display());
        Self::compile(path, &source)
    }

    /// Path the template was compiled from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Expands the template with `ctx` bound to `t`.
    ///
    /// # Errors
    /// Returns [`CodegenError::TemplateExpand`] if evaluation fails, for
    /// instance on an undefined name.
    pub fn expand(&self, ctx: &RenderingContext<'_>) -> Result<String> {
        let template = self
            .env
            .get_template(TEMPLATE_NAME)
            .map_err(CodegenError::TemplateExpand)?;
        template
            .render(context! { t => ctx })
            .map_err(CodegenError::TemplateExpand)
    }
}

/// Compiled templates keyed by path.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: RwLock<HashMap<PathBuf, Arc<CompiledTemplate>>>,
}

impl TemplateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled template for `path`, compiling it on first use.
    ///
    /// # Errors
    /// Returns [`CodegenError::TemplateCompile`] if compilation fails. Failures
    /// are not cached.
    pub fn get_or_compile(&self, path: &Path) -> Result<Arc<CompiledTemplate>> {
        if let Some(template) = self.templates.read().get(path) {
            return Ok(Arc::clone(template));
        }

        let compiled = Arc::new(CompiledTemplate::from_file(path)?);
        let mut templates = self.templates.write();
        Ok(Arc::clone(
            templates.entry(path.to_path_buf()).or_insert(compiled),
        ))
    }

    /// Number of cached templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    /// Returns true if nothing has been compiled yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    /// Drops every cached template.
    pub fn clear(&self) {
        self.templates.write().clear();
    }
}

/// Prefixes `unit` to the text and after every line break.
fn indent(text: String, unit: Option<String>) -> String {
    let unit = unit.as_deref().unwrap_or(DEFAULT_INDENT);
    let mut out = String::with_capacity(text.len() + unit.len());
    out.push_str(unit);
    out.push_str(&text.replace('\n', &format!("\n{unit}")));
    out
}

/// Yields `(index, is_last, item)` for every item of a sequence, pulling one
/// item ahead of the one it yields.
fn enum_last_value(seq: Value, start: Option<i64>) -> std::result::Result<Value, Error> {
    Ok(Value::make_one_shot_iterator(EnumLast::new(
        seq.try_iter()?,
        start.unwrap_or(0),
    )))
}

fn enumerate(seq: Value, start: Option<i64>) -> std::result::Result<Value, Error> {
    let start = start.unwrap_or(0);
    let pairs: Vec<Value> = seq
        .try_iter()?
        .zip(start..)
        .map(|(item, index)| Value::from(vec![Value::from(index), item]))
        .collect();
    Ok(Value::from(pairs))
}

fn len(value: Value) -> std::result::Result<usize, Error> {
    value.len().ok_or_else(|| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("object of kind {} has no length", value.kind()),
        )
    })
}

struct EnumLast<I: Iterator<Item = Value>> {
    items: Peekable<I>,
    index: i64,
}

impl<I: Iterator<Item = Value>> EnumLast<I> {
    fn new(items: I, start: i64) -> Self {
        Self {
            items: items.peekable(),
            index: start,
        }
    }
}

impl<I: Iterator<Item = Value>> Iterator for EnumLast<I> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let item = self.items.next()?;
        let is_last = self.items.peek().is_none();
        let entry = Value::from(vec![Value::from(self.index), Value::from(is_last), item]);
        self.index += 1;
        Some(entry)
    }
}
