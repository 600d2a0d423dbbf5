//! Scoped variables
//!
//! Ephemeral name/value pairs passed to a single interpolation call. They
//! take precedence over any variable found in the graph, e.g. a repeated
//! panel's per-row value.

use indexmap::IndexMap;
use scene_template::{FormatVariable, VariableValue};

/// One scoped value with optional display text
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedVar {
    /// Value
    pub value: VariableValue,
    /// Display text; the plain value when absent
    pub text: Option<String>,
}

/// Scoped variables for one interpolation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedVars {
    vars: IndexMap<String, ScopedVar>,
}

impl ScopedVars {
    /// No scoped variables
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With `name` bound to `value`
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<VariableValue>) -> Self {
        self.insert(name, value, None);
        self
    }

    /// With `name` bound to `value` displayed as `text`
    #[must_use]
    pub fn with_text(
        mut self,
        name: impl Into<String>,
        value: impl Into<VariableValue>,
        text: impl Into<String>,
    ) -> Self {
        self.insert(name, value, Some(text.into()));
        self
    }

    /// Bind `name`, replacing an earlier binding
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<VariableValue>, text: Option<String>) {
        self.vars.insert(
            name.into(),
            ScopedVar {
                value: value.into(),
                text,
            },
        );
    }

    /// Binding for `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScopedVar> {
        self.vars.get(name)
    }

    /// Number of bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether there are no bindings
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub(crate) fn variable(&self, name: &str) -> Option<ScopedVariable<'_>> {
        self.vars
            .get_key_value(name)
            .map(|(name, var)| ScopedVariable { name, var })
    }
}

/// A scoped binding seen as a format variable
pub(crate) struct ScopedVariable<'a> {
    name: &'a str,
    var: &'a ScopedVar,
}

impl FormatVariable for ScopedVariable<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn value(&self, field_path: Option<&str>) -> VariableValue {
        match field_path {
            Some(path) => self.var.value.at_path(path),
            None => self.var.value.clone(),
        }
    }

    fn value_text(&self, field_path: Option<&str>) -> String {
        match (&self.var.text, field_path) {
            (Some(text), None) => text.clone(),
            _ => self.value(field_path).to_plain_string(),
        }
    }
}
