//! Format registry
//!
//! Provides [`FormatRegistry`] for managing and selecting value formatters by
//! id. A format spec is `id` or `id:arg1:arg2`; arguments are handed to the
//! formatter.

use crate::error::FormatError;
use crate::formats;
use crate::value::FormatVariable;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Built-in format ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    /// `{a,b}` for multi-values, plain otherwise (the default)
    Glob,
    /// The variable's display text
    Text,
    /// Value as-is, lists joined with `,`
    Raw,
    /// Regex-escaped, multi-values as `(a|b)`
    Regex,
    /// Joined with `|`
    Pipe,
    /// Joined with `,`
    Csv,
    /// JSON encoded
    Json,
    /// Lucene-escaped, multi-values as `("a" OR "b")`
    Lucene,
    /// `a,name=b,name=c`
    Distributed,
    /// `'a','b'`
    SingleQuote,
    /// `"a","b"`
    DoubleQuote,
    /// SQL string literals, `'` doubled
    SqlString,
    /// Strict percent encoding
    PercentEncode,
    /// `encodeURI`-style encoding
    UriEncode,
    /// HTML escaped
    HtmlEscape,
    /// `var-name=a&var-name=b`
    QueryParam,
    /// `param=a&param=b` with a caller chosen parameter name
    CustomQueryParam,
    /// Joined with a caller supplied separator
    Join,
    /// Epoch milliseconds rendered as a date
    Date,
}

impl FormatId {
    /// All built-in ids in registration order
    pub const ALL: [FormatId; 19] = [
        FormatId::Glob,
        FormatId::Text,
        FormatId::Raw,
        FormatId::Regex,
        FormatId::Pipe,
        FormatId::Csv,
        FormatId::Json,
        FormatId::Lucene,
        FormatId::Distributed,
        FormatId::SingleQuote,
        FormatId::DoubleQuote,
        FormatId::SqlString,
        FormatId::PercentEncode,
        FormatId::UriEncode,
        FormatId::HtmlEscape,
        FormatId::QueryParam,
        FormatId::CustomQueryParam,
        FormatId::Join,
        FormatId::Date,
    ];

    /// Id as used in templates
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FormatId::Glob => "glob",
            FormatId::Text => "text",
            FormatId::Raw => "raw",
            FormatId::Regex => "regex",
            FormatId::Pipe => "pipe",
            FormatId::Csv => "csv",
            FormatId::Json => "json",
            FormatId::Lucene => "lucene",
            FormatId::Distributed => "distributed",
            FormatId::SingleQuote => "singlequote",
            FormatId::DoubleQuote => "doublequote",
            FormatId::SqlString => "sqlstring",
            FormatId::PercentEncode => "percentencode",
            FormatId::UriEncode => "uriencode",
            FormatId::HtmlEscape => "htmlescape",
            FormatId::QueryParam => "queryparam",
            FormatId::CustomQueryParam => "customqueryparam",
            FormatId::Join => "join",
            FormatId::Date => "date",
        }
    }

    fn description(self) -> &'static str {
        match self {
            FormatId::Glob => "Multi-values as {a,b}",
            FormatId::Text => "Display text of the selected values",
            FormatId::Raw => "Unformatted value",
            FormatId::Regex => "Regex escaped, multi-values as (a|b)",
            FormatId::Pipe => "Values joined with |",
            FormatId::Csv => "Values joined with ,",
            FormatId::Json => "JSON encoded value",
            FormatId::Lucene => "Lucene escaped",
            FormatId::Distributed => "Repeats the variable name for every value after the first",
            FormatId::SingleQuote => "Single quoted values",
            FormatId::DoubleQuote => "Double quoted values",
            FormatId::SqlString => "SQL string literals",
            FormatId::PercentEncode => "Percent encoded",
            FormatId::UriEncode => "URI encoded",
            FormatId::HtmlEscape => "HTML escaped",
            FormatId::QueryParam => "URL query parameters",
            FormatId::CustomQueryParam => "URL query parameters with a custom name",
            FormatId::Join => "Values joined with a custom separator",
            FormatId::Date => "Epoch milliseconds as a date",
        }
    }

    fn formatter(self) -> FormatterFn {
        match self {
            FormatId::Glob => Arc::new(formats::glob),
            FormatId::Text => Arc::new(formats::text),
            FormatId::Raw => Arc::new(formats::raw),
            FormatId::Regex => Arc::new(formats::regex),
            FormatId::Pipe => Arc::new(formats::pipe),
            FormatId::Csv => Arc::new(formats::csv),
            FormatId::Json => Arc::new(formats::json),
            FormatId::Lucene => Arc::new(formats::lucene),
            FormatId::Distributed => Arc::new(formats::distributed),
            FormatId::SingleQuote => Arc::new(formats::single_quote),
            FormatId::DoubleQuote => Arc::new(formats::double_quote),
            FormatId::SqlString => Arc::new(formats::sql_string),
            FormatId::PercentEncode => Arc::new(formats::percent_encode),
            FormatId::UriEncode => Arc::new(formats::uri_encode),
            FormatId::HtmlEscape => Arc::new(formats::html_escape),
            FormatId::QueryParam => Arc::new(formats::query_param),
            FormatId::CustomQueryParam => Arc::new(formats::custom_query_param),
            FormatId::Join => Arc::new(formats::join),
            FormatId::Date => Arc::new(formats::date),
        }
    }
}

impl fmt::Display for FormatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value prepared for formatting
///
/// Nulls never reach a formatter and objects arrive JSON-stringified, so a
/// formatter only distinguishes single from multi values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatInput {
    /// One value
    Single(String),
    /// Multi-value selection
    Multi(Vec<String>),
}

impl FormatInput {
    /// Apply `f` to every value
    #[must_use]
    pub fn map(&self, f: impl Fn(&str) -> String) -> Vec<String> {
        match self {
            FormatInput::Single(v) => vec![f(v)],
            FormatInput::Multi(values) => values.iter().map(|v| f(v)).collect(),
        }
    }

    /// `String(value)` rendering: multi-values joined with `,`
    #[must_use]
    pub fn joined(&self, separator: &str) -> String {
        match self {
            FormatInput::Single(v) => v.clone(),
            FormatInput::Multi(values) => values.join(separator),
        }
    }
}

/// What a formatter knows about the token it formats
pub struct FormatContext<'a> {
    /// Variable the value came from
    pub variable: &'a dyn FormatVariable,
    /// Field path of the token, if any
    pub field_path: Option<&'a str>,
}

impl fmt::Debug for FormatContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatContext")
            .field("variable", &self.variable.name())
            .field("field_path", &self.field_path)
            .finish()
    }
}

/// Formatter callback: value, format arguments, context
pub type FormatterFn = Arc<dyn Fn(&FormatInput, &[&str], &FormatContext<'_>) -> String + Send + Sync>;

/// A registered formatter
#[derive(Clone)]
pub struct FormatEntry {
    /// Id used in templates
    pub id: String,
    /// Human readable description
    pub description: String,
    formatter: FormatterFn,
}

impl FormatEntry {
    /// Run the formatter
    #[inline]
    #[must_use]
    pub fn apply(&self, input: &FormatInput, args: &[&str], ctx: &FormatContext<'_>) -> String {
        (self.formatter)(input, args, ctx)
    }
}

impl fmt::Debug for FormatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatEntry")
            .field("id", &self.id)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registry of value formatters keyed by id
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    entries: IndexMap<String, FormatEntry>,
}

impl FormatRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Create registry with built-in formats
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for id in FormatId::ALL {
            registry.entries.insert(
                id.as_str().to_string(),
                FormatEntry {
                    id: id.as_str().to_string(),
                    description: id.description().to_string(),
                    formatter: id.formatter(),
                },
            );
        }
        registry
    }

    /// Register a formatter
    ///
    /// # Errors
    /// Returns [`FormatError::Duplicate`] if the id is taken
    pub fn register<F>(
        &mut self,
        id: impl Into<String>,
        description: impl Into<String>,
        formatter: F,
    ) -> Result<(), FormatError>
    where
        F: Fn(&FormatInput, &[&str], &FormatContext<'_>) -> String + Send + Sync + 'static,
    {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(FormatError::Duplicate(id));
        }
        self.entries.insert(
            id.clone(),
            FormatEntry {
                id,
                description: description.into(),
                formatter: Arc::new(formatter),
            },
        );
        Ok(())
    }

    /// Check if a format exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Get a formatter if registered
    #[inline]
    #[must_use]
    pub fn get_if_exists(&self, id: &str) -> Option<&FormatEntry> {
        self.entries.get(id)
    }

    /// Get a formatter
    ///
    /// # Errors
    /// Returns [`FormatError::Unknown`] if no formatter has this id
    pub fn get(&self, id: &str) -> Result<&FormatEntry, FormatError> {
        self.entries
            .get(id)
            .ok_or_else(|| FormatError::Unknown(id.to_string()))
    }

    /// Registered ids in registration order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered formats
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Format `input` with `spec` (`id` or `id:arg1:arg2`)
    ///
    /// No spec means `glob`. An unknown id is logged and formatted with
    /// `glob`.
    #[must_use]
    pub fn format(&self, input: &FormatInput, spec: Option<&str>, ctx: &FormatContext<'_>) -> String {
        let (id, args) = match spec {
            Some(spec) => split_spec(spec),
            None => (FormatId::Glob.as_str(), Vec::new()),
        };

        match self.entries.get(id) {
            Some(entry) => entry.apply(input, &args, ctx),
            None => {
                tracing::warn!(
                    format = id,
                    variable = ctx.variable.name(),
                    "variable format not found, using glob format as fallback"
                );
                formats::glob(input, &args, ctx)
            }
        }
    }
}

fn split_spec(spec: &str) -> (&str, Vec<&str>) {
    let mut parts = spec.split(':');
    let id = parts.next().unwrap_or_default();
    (id, parts.collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::VariableValue;

    struct Named(&'static str);

    impl FormatVariable for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn value(&self, _field_path: Option<&str>) -> VariableValue {
            VariableValue::Null
        }
    }

    fn ctx(var: &Named) -> FormatContext<'_> {
        FormatContext {
            variable: var,
            field_path: None,
        }
    }

    #[test]
    fn registry_contains_builtins() {
        let registry = FormatRegistry::with_defaults();
        for id in FormatId::ALL {
            assert!(registry.contains(id.as_str()), "missing {id}");
        }
        assert_eq!(registry.len(), FormatId::ALL.len());
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut registry = FormatRegistry::with_defaults();
        let result = registry.register("csv", "again", |_, _, _| String::new());
        assert_eq!(result, Err(FormatError::Duplicate("csv".to_string())));
    }

    #[test]
    fn custom_formatter_receives_arguments() {
        let mut registry = FormatRegistry::new();
        registry
            .register("wrap", "wrap with args", |input, args, _| {
                format!("{}{}{}", args[0], input.joined(","), args[1])
            })
            .unwrap();

        let var = Named("x");
        let out = registry.format(&FormatInput::Single("v".into()), Some("wrap:<:>"), &ctx(&var));
        assert_eq!(out, "<v>");
    }

    #[test]
    fn unknown_format_falls_back_to_glob() {
        let registry = FormatRegistry::with_defaults();
        let var = Named("x");
        let input = FormatInput::Multi(vec!["a".into(), "b".into()]);
        assert_eq!(registry.format(&input, Some("nope"), &ctx(&var)), "{a,b}");
    }

    #[test]
    fn strict_lookup_reports_unknown() {
        let registry = FormatRegistry::with_defaults();
        let err = registry.get("nope").unwrap_err();
        assert!(err.is_recoverable());
    }
}
