//! Template interpolation
//!
//! [`Interpolator`] walks the tokens of a template, resolves each name through
//! a [`VariableResolver`] and renders the value with the token's format.
//! Interpolation never fails: unresolved tokens are copied verbatim.

use crate::format::{FormatContext, FormatInput, FormatRegistry};
use crate::token::{has_tokens, tokens};
use crate::value::{FormatVariable, VariableValue};
use indexmap::IndexMap;

/// Resolves a token name to a variable
pub trait VariableResolver {
    /// Look up `name`; `None` leaves the token verbatim
    fn resolve(&self, name: &str) -> Option<Box<dyn FormatVariable + '_>>;
}

/// One replaced (or skipped) token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolation {
    /// The token text as it appeared in the template
    pub matched: String,
    /// Variable name
    pub variable_name: String,
    /// Field path, if the token had one
    pub field_path: Option<String>,
    /// Format spec that was applied
    pub format: Option<String>,
    /// Rendered value, or the verbatim token when not found
    pub value: String,
    /// Whether the variable resolved
    pub found: bool,
}

/// Replaces variable tokens using a format registry
#[derive(Debug, Clone, Copy)]
pub struct Interpolator<'r> {
    registry: &'r FormatRegistry,
}

impl<'r> Interpolator<'r> {
    /// Create an interpolator over `registry`
    #[inline]
    #[must_use]
    pub fn new(registry: &'r FormatRegistry) -> Self {
        Self { registry }
    }

    /// Interpolate `template`
    ///
    /// `format` applies to tokens that carry no format of their own.
    #[must_use]
    pub fn interpolate(
        &self,
        template: &str,
        resolver: &dyn VariableResolver,
        format: Option<&str>,
    ) -> String {
        self.render(template, resolver, format, None)
    }

    /// Interpolate `template` and report every token encountered
    #[must_use]
    pub fn interpolate_with_report(
        &self,
        template: &str,
        resolver: &dyn VariableResolver,
        format: Option<&str>,
    ) -> (String, Vec<Interpolation>) {
        let mut report = Vec::new();
        let out = self.render(template, resolver, format, Some(&mut report));
        (out, report)
    }

    fn render(
        &self,
        template: &str,
        resolver: &dyn VariableResolver,
        format: Option<&str>,
        mut report: Option<&mut Vec<Interpolation>>,
    ) -> String {
        if !has_tokens(template) {
            return template.to_string();
        }

        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for token in tokens(template) {
            out.push_str(&template[last..token.range.start]);
            last = token.range.end;

            let spec = token.format.or(format);
            let (value, found) = match resolver.resolve(token.name) {
                Some(variable) => {
                    let rendered = self.format_variable(variable.as_ref(), token.field_path, spec);
                    (rendered, true)
                }
                None => {
                    tracing::trace!(variable = token.name, "variable not found, token left as-is");
                    (token.raw.to_string(), false)
                }
            };
            out.push_str(&value);

            if let Some(report) = report.as_deref_mut() {
                report.push(Interpolation {
                    matched: token.raw.to_string(),
                    variable_name: token.name.to_string(),
                    field_path: token.field_path.map(str::to_string),
                    format: spec.map(str::to_string),
                    value,
                    found,
                });
            }
        }

        out.push_str(&template[last..]);
        out
    }

    fn format_variable(
        &self,
        variable: &dyn FormatVariable,
        field_path: Option<&str>,
        spec: Option<&str>,
    ) -> String {
        let Some(input) = format_input(variable.value(field_path)) else {
            return String::new();
        };
        let ctx = FormatContext {
            variable,
            field_path,
        };
        self.registry.format(&input, spec, &ctx)
    }
}

/// Prepare a value for a formatter; `None` for null
fn format_input(value: VariableValue) -> Option<FormatInput> {
    match value {
        VariableValue::Null => None,
        VariableValue::List(items) => Some(FormatInput::Multi(
            items.iter().map(VariableValue::to_plain_string).collect(),
        )),
        other => Some(FormatInput::Single(other.to_plain_string())),
    }
}

/// Resolver over a fixed name → value map
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    values: IndexMap<String, VariableValue>,
}

impl StaticResolver {
    /// Create an empty resolver
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<VariableValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder-style [`StaticResolver::insert`]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        self.insert(name, value);
        self
    }
}

struct StaticVariable<'a> {
    name: &'a str,
    value: &'a VariableValue,
}

impl FormatVariable for StaticVariable<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn value(&self, field_path: Option<&str>) -> VariableValue {
        match field_path {
            Some(path) => self.value.at_path(path),
            None => self.value.clone(),
        }
    }
}

impl VariableResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Option<Box<dyn FormatVariable + '_>> {
        self.values.get_key_value(name).map(|(name, value)| {
            Box::new(StaticVariable { name, value }) as Box<dyn FormatVariable + '_>
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn resolver() -> StaticResolver {
        StaticResolver::new()
            .with("host", VariableValue::list(["a", "b"]))
            .with("single", "one")
            .with("num", 42.0)
            .with("obj", VariableValue::Object(json!({"inner": {"id": 7}})))
            .with("empty", VariableValue::Null)
    }

    fn interpolate(template: &str, format: Option<&str>) -> String {
        let registry = FormatRegistry::with_defaults();
        Interpolator::new(&registry).interpolate(template, &resolver(), format)
    }

    #[test]
    fn multi_value_defaults_to_glob() {
        assert_eq!(interpolate("test.${host}.asd", None), "test.{a,b}.asd");
    }

    #[test]
    fn unresolved_tokens_are_verbatim() {
        assert_eq!(interpolate("${missing} and $gone", None), "${missing} and $gone");
    }

    #[test]
    fn token_format_beats_argument() {
        assert_eq!(interpolate("${host:pipe}", Some("csv")), "a|b");
        assert_eq!(interpolate("${host}", Some("csv")), "a,b");
    }

    #[test]
    fn field_path_and_objects() {
        assert_eq!(interpolate("${obj.inner.id}", None), "7");
        assert_eq!(interpolate("${obj}", None), r#"{"inner":{"id":7}}"#);
    }

    #[test]
    fn null_is_empty() {
        assert_eq!(interpolate("[${empty}]", None), "[]");
    }

    #[test]
    fn scalars_and_legacy_syntax() {
        assert_eq!(interpolate("$single-[[num]]-[[host:csv]]", None), "one-42-a,b");
    }

    #[test]
    fn report_lists_every_token() {
        let registry = FormatRegistry::with_defaults();
        let (out, report) = Interpolator::new(&registry).interpolate_with_report(
            "${single:raw} ${nope}",
            &resolver(),
            None,
        );
        assert_eq!(out, "one ${nope}");
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].format.as_deref(), Some("raw"));
        assert!(report[0].found);
        assert_eq!(report[1].variable_name, "nope");
        assert!(!report[1].found);
    }

    proptest! {
        #[test]
        fn text_without_tokens_is_unchanged(s in "[a-zA-Z0-9 {}(),.:=!?-]*") {
            prop_assert_eq!(interpolate(&s, None), s);
        }

        #[test]
        fn unknown_names_survive(name in "[a-z][a-z0-9_]{0,8}") {
            let template = format!("x ${{zz_{name}}} y");
            prop_assert_eq!(interpolate(&template, None), template);
        }
    }
}
