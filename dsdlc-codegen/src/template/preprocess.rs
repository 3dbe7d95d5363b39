//! Extended template syntax to primitive syntax.
//!
//! Templates are written in a Mako-like shorthand:
//!
//! ```text
//! ${expression}
//! ${foo(bar(very_long_argument=42, \
//!           second_line=72))}
//! % for a in range(10):
//!     % if a == 5:
//!         ${a}
//!     % endif
//! % endfor
//! ```
//!
//! which is rewritten into the primitive markers understood by the expansion
//! engine: `$!expression!$` for substitutions and `<!--(keyword args)-->` for
//! block tags, with every block closed by a generic `<!--(end)-->`.

use regex::{Captures, Regex};
use std::sync::LazyLock;

static LINE_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\r?\n[ \t]*").expect("valid line continuation regex"));

static CONTROL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*)%[ \t]*(.+?):?[ \t]*(\r?)$").expect("valid control line regex")
});

static BLOCK_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\(end[a-z]+\)-->").expect("valid block end regex"));

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]*#![^\r\n]*").expect("valid comment regex"));

static MACRO_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\(macro [A-Za-z0-9_]+(?:\([^)\r\n]*\))?\)-->(\r?\n)?")
        .expect("valid macro regex")
});

/// Runs every rewrite rule, in order, over a template source.
///
/// The result is deterministic and already-primitive syntax passes through
/// unchanged, so `preprocess(preprocess(s)) == preprocess(s)`.
#[must_use]
pub fn preprocess(source: &str) -> String {
    let text = join_continuation_lines(source);
    let text = rewrite_substitutions(&text);
    let text = rewrite_control_lines(&text);
    let text = normalize_block_ends(&text);
    let text = strip_comments(&text);
    space_macro_bodies(&text)
}

/// Collapses a backslash, the line break after it and the next line's
/// indentation into a single space.
#[must_use]
pub fn join_continuation_lines(text: &str) -> String {
    LINE_CONTINUATION.replace_all(text, " ").into_owned()
}

/// Rewrites `${expr}` into `$!expr!$`. A `$` directly before the marker
/// (`$${expr}`) suppresses the rewrite.
#[must_use]
pub fn rewrite_substitutions(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search = 0;

    while let Some(offset) = text[search..].find("${") {
        let start = search + offset;
        let body = start + 2;
        let escaped = start > 0 && bytes[start - 1] == b'$';

        match text[body..].find('}') {
            Some(len) if !escaped && len > 0 => {
                out.push_str(&text[copied..start]);
                out.push_str("$!");
                out.push_str(&text[body..body + len]);
                out.push_str("!$");
                copied = body + len + 1;
                search = copied;
            }
            _ => search = body,
        }
    }

    out.push_str(&text[copied..]);
    out
}

/// Rewrites `% keyword args:` lines into `<!--(keyword args)-->`, keeping the
/// indentation in front of the marker.
#[must_use]
pub fn rewrite_control_lines(text: &str) -> String {
    CONTROL_LINE
        .replace_all(text, "${1}<!--(${2})-->${3}")
        .into_owned()
}

/// Replaces `<!--(endfor)-->`, `<!--(endif)-->` and friends with `<!--(end)-->`.
#[must_use]
pub fn normalize_block_ends(text: &str) -> String {
    BLOCK_END.replace_all(text, "<!--(end)-->").into_owned()
}

/// Removes `#!` comments together with the whitespace before them.
#[must_use]
pub fn strip_comments(text: &str) -> String {
    COMMENT.replace_all(text, "").into_owned()
}

/// Makes sure every macro declaration marker is followed by a line break, so
/// the first line of the body is indented like the rest of it.
#[must_use]
pub fn space_macro_bodies(text: &str) -> String {
    MACRO_OPEN
        .replace_all(text, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                format!("{}\n", &caps[0])
            }
        })
        .into_owned()
}
