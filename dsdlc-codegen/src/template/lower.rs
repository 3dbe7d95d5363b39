//! Primitive template syntax to minijinja source.
//!
//! Substitutions (`$!expr!$`) become `{{ expr }}`. Block tags
//! (`<!--(keyword args)-->`) become `{% ... %}` statements, with the generic
//! `end` tag resolved against a stack of open blocks. A block tag that is the
//! only thing on its line is removed together with the line's indentation and
//! line break, so control lines never leave blank lines behind.

use thiserror::Error;

const SUBST_OPEN: &str = "$!";
const SUBST_CLOSE: &str = "!$";
const TAG_OPEN: &str = "<!--(";
const TAG_CLOSE: &str = ")-->";

/// Malformed primitive template source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct LowerError {
    /// 1-based line of the offending marker.
    pub line: usize,
    /// Description of the problem.
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    For,
    If,
    Macro,
}

impl Block {
    fn end_tag(self) -> &'static str {
        match self {
            Self::For => "{% endfor %}",
            Self::If => "{% endif %}",
            Self::Macro => "{% endmacro %}",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Subst,
    Tag,
}

struct Lowering<'a> {
    source: &'a str,
    out: String,
    stack: Vec<(Block, usize)>,
}

/// Lowers primitive template syntax into minijinja source.
///
/// # Errors
/// Returns [`LowerError`] for unterminated markers, unknown block keywords,
/// misplaced `elif`/`else`/`end` tags and blocks left open at the end.
pub fn lower(source: &str) -> Result<String, LowerError> {
    let mut lowering = Lowering {
        source,
        out: String::with_capacity(source.len() + source.len() / 4),
        stack: Vec::new(),
    };
    lowering.run()?;
    Ok(lowering.out)
}

impl<'a> Lowering<'a> {
    fn run(&mut self) -> Result<(), LowerError> {
        let source = self.source;
        let mut cursor = 0;

        while let Some((start, marker)) = next_marker(source, cursor) {
            match marker {
                Marker::Subst => {
                    let body = start + SUBST_OPEN.len();
                    let Some(len) = source[body..].find(SUBST_CLOSE) else {
                        return Err(self.error(start, "unterminated substitution"));
                    };
                    let expr = source[body..body + len].trim();
                    if expr.is_empty() {
                        return Err(self.error(start, "empty substitution"));
                    }
                    self.push_text(&source[cursor..start], true);
                    self.out.push_str("{{ ");
                    self.out.push_str(expr);
                    self.out.push_str(" }}");
                    cursor = body + len + SUBST_CLOSE.len();
                }
                Marker::Tag => {
                    let body = start + TAG_OPEN.len();
                    let Some(len) = source[body..].find(TAG_CLOSE) else {
                        return Err(self.error(start, "unterminated block tag"));
                    };
                    let end = body + len + TAG_CLOSE.len();
                    let (text_end, next) = match standalone_span(source, start, end) {
                        Some((line_start, line_end)) => (line_start.max(cursor), line_end),
                        None => (start, end),
                    };
                    self.push_text(&source[cursor..text_end], true);
                    self.push_tag(source[body..body + len].trim(), start)?;
                    cursor = next;
                }
            }
        }

        self.push_text(&source[cursor..], false);

        match self.stack.last() {
            Some(&(_, opened_at)) => Err(self.error(opened_at, "block is never closed")),
            None => Ok(()),
        }
    }

    fn push_tag(&mut self, content: &str, at: usize) -> Result<(), LowerError> {
        let (keyword, args) = match content.split_once(char::is_whitespace) {
            Some((keyword, args)) => (keyword, args.trim()),
            None => (content, ""),
        };

        match keyword {
            "for" => {
                if !args.contains(" in ") {
                    return Err(self.error(at, "expected 'for <target> in <iterable>'"));
                }
                self.stack.push((Block::For, at));
                self.push_statement("for", args);
            }
            "if" => {
                self.require_args("if", args, at)?;
                self.stack.push((Block::If, at));
                self.push_statement("if", args);
            }
            "elif" => {
                self.require_args("elif", args, at)?;
                self.require_open_if("elif", at)?;
                self.push_statement("elif", args);
            }
            "else" => {
                self.require_no_args("else", args, at)?;
                self.require_open_if("else", at)?;
                self.out.push_str("{% else %}");
            }
            "macro" => {
                let signature = macro_signature(args)
                    .ok_or_else(|| self.error(at, format!("invalid macro declaration '{args}'")))?;
                self.stack.push((Block::Macro, at));
                self.push_statement("macro", &signature);
            }
            "set" => {
                if !args.contains('=') {
                    return Err(self.error(at, "expected 'set <name> = <expression>'"));
                }
                self.push_statement("set", args);
            }
            "end" => {
                self.require_no_args("end", args, at)?;
                let Some((block, _)) = self.stack.pop() else {
                    return Err(self.error(at, "'end' without an open block"));
                };
                self.out.push_str(block.end_tag());
            }
            other => return Err(self.error(at, format!("unknown block keyword '{other}'"))),
        }
        Ok(())
    }

    fn push_statement(&mut self, keyword: &str, args: &str) {
        self.out.push_str("{% ");
        self.out.push_str(keyword);
        self.out.push(' ');
        self.out.push_str(args);
        self.out.push_str(" %}");
    }

    /// Copies literal text, neutralizing anything minijinja would read as a
    /// delimiter. `followed_by_marker` is set when generated `{{`/`{%` comes
    /// right after the text.
    fn push_text(&mut self, text: &str, followed_by_marker: bool) {
        let text = text.replace("$${", "${");
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            let opens_delimiter = c == '{'
                && match chars.peek() {
                    Some('{' | '%' | '#') => true,
                    Some(_) => false,
                    None => followed_by_marker,
                };
            if opens_delimiter {
                self.out.push_str("{{ \"{\" }}");
            } else {
                self.out.push(c);
            }
        }
    }

    fn require_args(&self, keyword: &str, args: &str, at: usize) -> Result<(), LowerError> {
        if args.is_empty() {
            Err(self.error(at, format!("'{keyword}' requires a condition")))
        } else {
            Ok(())
        }
    }

    fn require_no_args(&self, keyword: &str, args: &str, at: usize) -> Result<(), LowerError> {
        if args.is_empty() {
            Ok(())
        } else {
            Err(self.error(at, format!("'{keyword}' takes no arguments")))
        }
    }

    fn require_open_if(&self, keyword: &str, at: usize) -> Result<(), LowerError> {
        match self.stack.last() {
            Some((Block::If, _)) => Ok(()),
            _ => Err(self.error(at, format!("'{keyword}' outside of an 'if' block"))),
        }
    }

    fn error(&self, at: usize, message: impl Into<String>) -> LowerError {
        LowerError {
            line: line_of(self.source, at),
            message: message.into(),
        }
    }
}

fn next_marker(source: &str, from: usize) -> Option<(usize, Marker)> {
    let rest = &source[from..];
    let subst = rest.find(SUBST_OPEN).map(|i| (from + i, Marker::Subst));
    let tag = rest.find(TAG_OPEN).map(|i| (from + i, Marker::Tag));
    match (subst, tag) {
        (Some(s), Some(t)) => Some(if s.0 < t.0 { s } else { t }),
        (s, t) => s.or(t),
    }
}

/// If the tag at `start..end` is alone on its line, returns the start of that
/// line and the offset just past its line break.
fn standalone_span(source: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    let (line_end, next) = match source[end..].find('\n') {
        Some(i) => (end + i, end + i + 1),
        None => (source.len(), source.len()),
    };
    let blank = |s: &str| s.chars().all(|c| matches!(c, ' ' | '\t' | '\r'));
    (blank(&source[line_start..start]) && blank(&source[end..line_end])).then_some((line_start, next))
}

fn macro_signature(args: &str) -> Option<String> {
    let (name, params) = match args.split_once('(') {
        Some((name, rest)) => (name.trim(), rest.strip_suffix(')')?.trim()),
        None => (args, ""),
    };
    let valid_name = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid_name.then(|| format!("{name}({params})"))
}

fn line_of(source: &str, offset: usize) -> usize {
    source[..offset].matches('\n').count() + 1
}
