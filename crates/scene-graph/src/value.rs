//! State field values
//!
//! Compound values are reference counted, so whether a field "changed
//! reference" between two snapshots is observable with
//! [`StateValue::same_ref`]. Scalars compare by value.

use crate::error::SceneError;
use crate::node::SceneNode;
use scene_template::VariableValue;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Object field map
pub type ObjectMap = BTreeMap<String, StateValue>;

/// A value stored in a state field
#[derive(Clone, Default)]
pub enum StateValue {
    /// No value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// Text
    Text(Arc<str>),
    /// List; node elements are children of the owning node
    List(Arc<[StateValue]>),
    /// Object map
    Object(Arc<ObjectMap>),
    /// Child node
    Node(SceneNode),
    /// Host value with no JSON representation
    Opaque(OpaqueValue),
}

impl StateValue {
    /// Text value
    #[inline]
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(Arc::from(value.into()))
    }

    /// List value
    #[must_use]
    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<StateValue>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }

    /// Object value
    #[must_use]
    pub fn object<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<StateValue>,
    {
        Self::Object(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Wrap a host value
    #[inline]
    #[must_use]
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self::Opaque(OpaqueValue::new(value))
    }

    /// Reference identity
    ///
    /// Compound values are the same only if they share an allocation; nodes
    /// only if they are the same node. Scalars compare by value.
    #[must_use]
    pub fn same_ref(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Node(a), Self::Node(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => Arc::ptr_eq(&a.value, &b.value),
            _ => false,
        }
    }

    /// Whether this is [`StateValue::Null`]
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text content
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content
    #[inline]
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Boolean content
    #[inline]
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Node content
    #[inline]
    #[must_use]
    pub fn as_node(&self) -> Option<&SceneNode> {
        match self {
            Self::Node(node) => Some(node),
            _ => None,
        }
    }

    /// List content
    #[inline]
    #[must_use]
    pub fn as_list(&self) -> Option<&[StateValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Object content
    #[inline]
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectMap> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Nodes held directly: the node itself, or node elements of a list
    #[must_use]
    pub fn child_nodes(&self) -> Vec<SceneNode> {
        match self {
            Self::Node(node) => vec![node.clone()],
            Self::List(items) => items.iter().filter_map(|v| v.as_node().cloned()).collect(),
            _ => Vec::new(),
        }
    }

    /// JSON representation
    ///
    /// Nodes render as their state. Non-finite numbers render as `null`.
    ///
    /// # Errors
    /// Returns [`SceneError::NotSerializable`] for opaque values
    pub fn to_json(&self) -> Result<serde_json::Value, SceneError> {
        Ok(match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::Text(s) => serde_json::Value::String(s.to_string()),
            Self::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(StateValue::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            Self::Object(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map.iter() {
                    out.insert(k.clone(), v.to_json()?);
                }
                serde_json::Value::Object(out)
            }
            Self::Node(node) => node.state().to_json()?,
            Self::Opaque(opaque) => {
                return Err(SceneError::NotSerializable(opaque.type_name.to_string()))
            }
        })
    }

    /// Value as seen by the template system
    ///
    /// Nodes and opaque values have no template representation and map to
    /// null.
    #[must_use]
    pub fn to_variable_value(&self) -> VariableValue {
        match self {
            Self::Null | Self::Node(_) | Self::Opaque(_) => VariableValue::Null,
            Self::Bool(b) => VariableValue::Bool(*b),
            Self::Number(n) => VariableValue::Number(*n),
            Self::Text(s) => VariableValue::Text(s.to_string()),
            Self::List(items) => {
                VariableValue::List(items.iter().map(StateValue::to_variable_value).collect())
            }
            Self::Object(_) => self
                .to_json()
                .map_or(VariableValue::Null, VariableValue::Object),
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || a[..] == b[..],
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b) || a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => self.same_ref(other),
        }
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::List(items) => f.debug_list().entries(items.iter()).finish(),
            Self::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Self::Node(node) => write!(f, "Node({}:{})", node.kind(), node.key()),
            Self::Opaque(opaque) => write!(f, "Opaque({})", opaque.type_name),
        }
    }
}

impl From<serde_json::Value> for StateValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::text(s),
            serde_json::Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            serde_json::Value::Object(map) => Self::Object(Arc::new(
                map.into_iter().map(|(k, v)| (k, Self::from(v))).collect(),
            )),
        }
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(Arc::from(value))
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for StateValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<SceneNode> for StateValue {
    fn from(value: SceneNode) -> Self {
        Self::Node(value)
    }
}

impl From<&SceneNode> for StateValue {
    fn from(value: &SceneNode) -> Self {
        Self::Node(value.clone())
    }
}

impl From<Vec<StateValue>> for StateValue {
    fn from(value: Vec<StateValue>) -> Self {
        Self::List(value.into())
    }
}

impl From<VariableValue> for StateValue {
    fn from(value: VariableValue) -> Self {
        match value {
            VariableValue::Null => Self::Null,
            VariableValue::Text(s) => Self::text(s),
            VariableValue::Number(n) => Self::Number(n),
            VariableValue::Bool(b) => Self::Bool(b),
            VariableValue::List(items) => Self::List(items.into_iter().map(Self::from).collect()),
            VariableValue::Object(json) => Self::from(json),
        }
    }
}

/// A host value carried through state without a JSON form
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    /// Wrap `value`
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// Borrow the wrapped value as `T`
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Rust type name of the wrapped value
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn same_ref_distinguishes_equal_lists() {
        let a = StateValue::list(["x", "y"]);
        let b = StateValue::list(["x", "y"]);
        assert_eq!(a, b);
        assert!(!a.same_ref(&b));
        assert!(a.same_ref(&a.clone()));
    }

    #[test]
    fn scalars_compare_by_value() {
        assert!(StateValue::from("a").same_ref(&StateValue::from("a")));
        assert!(StateValue::from(1.0).same_ref(&StateValue::from(1.0)));
        assert!(!StateValue::from(1.0).same_ref(&StateValue::from(2.0)));
    }

    #[test]
    fn json_round_trip() {
        let source = json!({"a": [1, "two", true], "b": null});
        let value = StateValue::from(source.clone());
        assert_eq!(value.to_json().unwrap(), source);
    }

    #[test]
    fn opaque_is_not_serializable() {
        struct Handle;
        let value = StateValue::list([StateValue::opaque(Handle)]);
        assert!(matches!(value.to_json(), Err(SceneError::NotSerializable(_))));
    }

    #[test]
    fn variable_values() {
        let value = StateValue::list(["a", "b"]);
        assert_eq!(value.to_variable_value(), VariableValue::list(["a", "b"]));
        let obj = StateValue::object([("id", 7_i64)]);
        assert_eq!(obj.to_variable_value(), VariableValue::Object(json!({"id": 7})));
    }
}
