use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;

use super::ExtractionError;

/// Anchor of the menu model object: `model: { ... }`.
pub const MODEL_ANCHOR: &str = r"model\s*:";
/// Anchor of the hours array: `currentHoursOfOperations = JSON.parse('[ ... ]')`.
pub const HOURS_ANCHOR: &str = r"currentHoursOfOperations\s*=\s*JSON\.parse\(";

/// Returns the `{...}` or `[...]` literal that starts at the first opening bracket after
/// the first match of `anchor`.
///
/// Only brackets of the opening kind are counted, and brackets inside string literals are
/// not special-cased. The scan is textual, so a stray bracket inside a vendor string will
/// throw it off.
pub fn extract_balanced<'a>(text: &'a str, anchor: &Regex) -> Result<&'a str, ExtractionError> {
    let found = anchor
        .find(text)
        .ok_or_else(|| ExtractionError::anchor_not_found(anchor.as_str()))?;
    let rest = &text[found.end()..];
    let start = rest
        .find(['{', '['])
        .ok_or_else(|| ExtractionError::no_literal(anchor.as_str()))?;
    let (open, close) = if rest.as_bytes()[start] == b'{' {
        (b'{', b'}')
    } else {
        (b'[', b']')
    };

    let mut depth = 0usize;
    for (i, c) in rest.bytes().enumerate().skip(start) {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Ok(&rest[start..=i]);
            }
        }
    }
    Err(ExtractionError::unterminated(anchor.as_str()))
}

pub fn model_anchor() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MODEL_ANCHOR).expect("regex should be valid"))
}

pub fn hours_anchor() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(HOURS_ANCHOR).expect("regex should be valid"))
}

/// Drops the trailing commas a JS object literal may carry before `}` or `]`.
pub fn strip_trailing_commas(s: &str) -> Cow<'_, str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("regex should be valid"));
    re.replace_all(s, "$1")
}

/// Decodes the escapes of a single-quoted JS string that JSON would reject or misread.
/// Anything else (`\n`, `A`, ...) is left for the JSON parser.
pub fn unescape_js_string(s: &str) -> Cow<'_, str> {
    if !s.contains('\\') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(e @ ('\\' | '\'' | '"' | '/')) => out.push(e),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    Cow::Owned(out)
}
