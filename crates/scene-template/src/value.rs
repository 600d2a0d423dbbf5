//! Variable values as seen by formatters

/// A variable's value, detached from whatever stores it
#[derive(Debug, Clone, PartialEq, Default)]
pub enum VariableValue {
    /// Missing value; interpolates to an empty string
    #[default]
    Null,
    /// Text value
    Text(String),
    /// Numeric value
    Number(f64),
    /// Boolean value
    Bool(bool),
    /// Multi-value selection
    List(Vec<VariableValue>),
    /// Structured value; stringified as JSON before formatting
    Object(serde_json::Value),
}

impl VariableValue {
    /// Text value
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// List of text values
    #[must_use]
    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(|v| Self::Text(v.into())).collect())
    }

    /// Whether this is [`VariableValue::Null`]
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Navigate a dotted field path (`a.b.0.c`) into an object value
    ///
    /// Lists accept numeric segments. Returns [`VariableValue::Null`] when a
    /// segment is missing.
    #[must_use]
    pub fn at_path(&self, path: &str) -> Self {
        let mut current = match self {
            Self::Object(json) => json,
            Self::List(items) => {
                let mut segments = path.splitn(2, '.');
                let head = segments.next().unwrap_or_default();
                return match head.parse::<usize>().ok().and_then(|i| items.get(i)) {
                    Some(item) => match segments.next() {
                        Some(rest) => item.at_path(rest),
                        None => item.clone(),
                    },
                    None => Self::Null,
                };
            }
            _ => return Self::Null,
        };

        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let next = match current {
                serde_json::Value::Object(map) => map.get(segment),
                serde_json::Value::Array(items) => {
                    segment.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Self::Null,
            }
        }
        Self::from(current.clone())
    }

    /// Plain string rendering used when a value is interpolated as-is
    ///
    /// Lists join their elements with `,`; objects render as JSON.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Object(json) => json.to_string(),
            Self::List(items) => {
                let mut out = String::new();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    out.push_str(&item.to_plain_string());
                }
                out
            }
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

impl From<serde_json::Value> for VariableValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            obj @ serde_json::Value::Object(_) => Self::Object(obj),
        }
    }
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The contract a variable exposes to the interpolator and formatters
pub trait FormatVariable {
    /// Variable name
    fn name(&self) -> &str;

    /// Current value, optionally navigated by a field path
    fn value(&self, field_path: Option<&str>) -> VariableValue;

    /// Human readable text of the current value
    fn value_text(&self, field_path: Option<&str>) -> String {
        self.value(field_path).to_plain_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_path_navigation() {
        let value = VariableValue::Object(json!({"inner": {"ids": [10, 20]}}));
        assert_eq!(value.at_path("inner.ids.1"), VariableValue::Number(20.0));
        assert_eq!(value.at_path("inner.missing"), VariableValue::Null);
    }

    #[test]
    fn list_path_navigation() {
        let value = VariableValue::list(["a", "b"]);
        assert_eq!(value.at_path("1"), VariableValue::text("b"));
        assert_eq!(value.at_path("5"), VariableValue::Null);
    }

    #[test]
    fn plain_strings() {
        assert_eq!(VariableValue::Number(3.0).to_plain_string(), "3");
        assert_eq!(VariableValue::Number(1.5).to_plain_string(), "1.5");
        assert_eq!(VariableValue::list(["a", "b"]).to_plain_string(), "a,b");
        assert_eq!(VariableValue::Object(json!({"a": 1})).to_plain_string(), r#"{"a":1}"#);
        assert_eq!(VariableValue::Null.to_plain_string(), "");
    }
}
