//! Variable token syntax
//!
//! Three spellings are recognised, matching dashboards authored over the years:
//! - `$name`
//! - `[[name]]` and `[[name:format]]`
//! - `${name}`, `${name.fieldPath}`, `${name:format}`, `${name:format:arg1:arg2}`
//!
//! Names match `[A-Za-z0-9_]+`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeSet;
use std::ops::Range;

static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\$([A-Za-z0-9_]+)|\[\[([A-Za-z0-9_]+?)(?::([A-Za-z0-9_]+))?\]\]|\$\{([A-Za-z0-9_]+)(?:\.([^:^\}]+))?(?::([^\}]+))?\}",
    )
    .expect("variable token regex is valid")
});

/// Which spelling a token used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSyntax {
    /// `$name`
    Dollar,
    /// `[[name]]` / `[[name:format]]`
    Brackets,
    /// `${name...}`
    Braces,
}

/// A single variable reference inside a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'t> {
    /// The full matched text, e.g. `${host:csv}`
    pub raw: &'t str,
    /// Byte range of `raw` inside the template
    pub range: Range<usize>,
    /// Variable name
    pub name: &'t str,
    /// Field path after the first `.` (braces syntax only)
    pub field_path: Option<&'t str>,
    /// Format spec including arguments, e.g. `date:iso`
    pub format: Option<&'t str>,
    /// Spelling used
    pub syntax: TokenSyntax,
}

impl<'t> Token<'t> {
    fn from_captures(caps: &Captures<'t>) -> Option<Self> {
        let whole = caps.get(0)?;
        let (name, field_path, format, syntax) = if let Some(name) = caps.get(1) {
            (name.as_str(), None, None, TokenSyntax::Dollar)
        } else if let Some(name) = caps.get(2) {
            (
                name.as_str(),
                None,
                caps.get(3).map(|m| m.as_str()),
                TokenSyntax::Brackets,
            )
        } else {
            let name = caps.get(4)?;
            (
                name.as_str(),
                caps.get(5).map(|m| m.as_str()),
                caps.get(6).map(|m| m.as_str()),
                TokenSyntax::Braces,
            )
        };

        Some(Self {
            raw: whole.as_str(),
            range: whole.range(),
            name,
            field_path,
            format,
            syntax,
        })
    }
}

/// Iterate over all tokens in `template`, left to right
pub fn tokens(template: &str) -> impl Iterator<Item = Token<'_>> {
    VARIABLE_REGEX
        .captures_iter(template)
        .filter_map(|caps| Token::from_captures(&caps))
}

/// Whether `template` contains any token syntax
#[inline]
#[must_use]
pub fn has_tokens(template: &str) -> bool {
    VARIABLE_REGEX.is_match(template)
}

/// Collect the distinct variable names referenced by `text`
#[must_use]
pub fn extract_names(text: &str) -> BTreeSet<String> {
    tokens(text).map(|t| t.name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn braces_with_path_and_format() {
        let found: Vec<_> = tokens("a ${obj.inner.id:csv} b").collect();
        assert_eq!(found.len(), 1);
        let t = &found[0];
        assert_eq!(t.name, "obj");
        assert_eq!(t.field_path, Some("inner.id"));
        assert_eq!(t.format, Some("csv"));
        assert_eq!(t.raw, "${obj.inner.id:csv}");
        assert_eq!(t.syntax, TokenSyntax::Braces);
    }

    #[test]
    fn format_keeps_arguments() {
        let t = tokens("${__from:date:YYYY-MM}").next().unwrap();
        assert_eq!(t.name, "__from");
        assert_eq!(t.format, Some("date:YYYY-MM"));
    }

    #[test]
    fn legacy_spellings() {
        let names: Vec<_> = tokens("$a [[b]] [[c:pipe]]").map(|t| (t.name, t.format)).collect();
        assert_eq!(names, vec![("a", None), ("b", None), ("c", Some("pipe"))]);
    }

    #[test]
    fn extract_names_deduplicates() {
        let names = extract_names("${a} ${b} $a [[b]]");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn plain_text_has_no_tokens() {
        assert!(!has_tokens("no variables here { } [ ]"));
        assert!(!has_tokens("price: 5 $"));
        assert!(has_tokens("${x}"));
    }

    #[test]
    fn ranges_point_into_template() {
        let template = "x=${a}&y=${b}";
        for t in tokens(template) {
            assert_eq!(&template[t.range.clone()], t.raw);
        }
    }
}
