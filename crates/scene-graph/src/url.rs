//! URL binding contract
//!
//! Nodes whose definition carries a [`UrlSyncHandler`] mirror part of their
//! state into URL query parameters. The sync manager lives in `scene-url`;
//! this module only defines what a node exposes.

use crate::error::SceneResult;
use crate::node::SceneNode;
use crate::state::StatePatch;
use crate::value::StateValue;
use indexmap::IndexMap;

/// A URL parameter value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UrlValue {
    /// Not present
    #[default]
    Null,
    /// `key=value`
    Single(String),
    /// `key=a&key=b`
    Multi(Vec<String>),
}

impl UrlValue {
    /// Build from the repeated values of one key
    #[must_use]
    pub fn from_values(mut values: Vec<String>) -> Self {
        match values.len() {
            0 => Self::Null,
            1 => Self::Single(values.remove(0)),
            _ => Self::Multi(values),
        }
    }

    /// Values as repeated in the query string
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match self {
            Self::Null => Vec::new(),
            Self::Single(v) => vec![v.clone()],
            Self::Multi(values) => values.clone(),
        }
    }

    /// Whether both render to the same query parameters
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.values() == other.values()
    }

    /// Whether this is [`UrlValue::Null`]
    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for UrlValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for UrlValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

/// URL values by key, in declaration order
pub type UrlState = IndexMap<String, UrlValue>;

/// How a node maps its state to URL parameters
pub trait UrlSyncHandler: Send + Sync {
    /// Keys this node claims
    fn keys(&self, node: &SceneNode) -> Vec<String>;

    /// Current URL values for the claimed keys
    fn get_url_state(&self, node: &SceneNode) -> UrlState;

    /// Apply values read from the URL; only differing keys are passed
    ///
    /// # Errors
    /// Propagates `set_state` failures
    fn update_from_url(&self, node: &SceneNode, values: &UrlState) -> SceneResult<()>;
}

impl SceneNode {
    /// Whether the node takes part in URL sync
    #[inline]
    #[must_use]
    pub fn is_url_syncable(&self) -> bool {
        self.definition().url_sync().is_some()
    }

    /// URL keys claimed by this node
    #[must_use]
    pub fn url_keys(&self) -> Vec<String> {
        self.definition()
            .url_sync()
            .map(|handler| handler.keys(self))
            .unwrap_or_default()
    }

    /// Current URL state, if the node is URL syncable
    #[must_use]
    pub fn url_state(&self) -> Option<UrlState> {
        self.definition()
            .url_sync()
            .map(|handler| handler.get_url_state(self))
    }

    /// Apply URL values; no-op for nodes that are not URL syncable
    ///
    /// # Errors
    /// Propagates the handler's error
    pub fn update_from_url(&self, values: &UrlState) -> SceneResult<()> {
        match self.definition().url_sync() {
            Some(handler) => handler.update_from_url(self, values),
            None => Ok(()),
        }
    }
}

/// Binds URL keys one-to-one to text or text-list state fields
#[derive(Debug, Clone)]
pub struct FieldUrlSync {
    bindings: Vec<(String, String)>,
}

impl FieldUrlSync {
    /// Bind `(url_key, field)` pairs
    #[must_use]
    pub fn new<I, K, F>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, F)>,
        K: Into<String>,
        F: Into<String>,
    {
        Self {
            bindings: bindings
                .into_iter()
                .map(|(k, f)| (k.into(), f.into()))
                .collect(),
        }
    }
}

impl UrlSyncHandler for FieldUrlSync {
    fn keys(&self, _node: &SceneNode) -> Vec<String> {
        self.bindings.iter().map(|(key, _)| key.clone()).collect()
    }

    fn get_url_state(&self, node: &SceneNode) -> UrlState {
        let state = node.state();
        self.bindings
            .iter()
            .map(|(key, field)| {
                let value = state.get(field).map_or(UrlValue::Null, to_url_value);
                (key.clone(), value)
            })
            .collect()
    }

    fn update_from_url(&self, node: &SceneNode, values: &UrlState) -> SceneResult<()> {
        let mut patch = StatePatch::new();
        for (key, field) in &self.bindings {
            match values.get(key) {
                None | Some(UrlValue::Null) => {}
                Some(UrlValue::Single(v)) => patch.insert(field.clone(), v.as_str()),
                Some(UrlValue::Multi(vs)) => {
                    patch.insert(field.clone(), StateValue::list(vs.iter().map(String::as_str)));
                }
            }
        }
        if patch.is_empty() {
            return Ok(());
        }
        node.set_state(patch)
    }
}

/// URL rendering of a state value
///
/// Text and scalars become a single value; lists become repeated values.
#[must_use]
pub fn to_url_value(value: &StateValue) -> UrlValue {
    match value {
        StateValue::Null | StateValue::Node(_) | StateValue::Opaque(_) | StateValue::Object(_) => {
            UrlValue::Null
        }
        StateValue::List(items) => UrlValue::Multi(
            items
                .iter()
                .map(|item| item.to_variable_value().to_plain_string())
                .collect(),
        ),
        other => UrlValue::Single(other.to_variable_value().to_plain_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_normalize_single_and_multi() {
        assert_eq!(UrlValue::from_values(vec![]), UrlValue::Null);
        assert_eq!(UrlValue::from_values(vec!["a".into()]), UrlValue::from("a"));
        assert!(UrlValue::Multi(vec!["a".into()]).same_as(&UrlValue::from("a")));
        assert!(!UrlValue::Null.same_as(&UrlValue::from("")));
    }

    #[test]
    fn state_values_render_for_urls() {
        assert_eq!(to_url_value(&StateValue::from(5_i64)), UrlValue::from("5"));
        assert_eq!(
            to_url_value(&StateValue::list(["a", "b"])),
            UrlValue::Multi(vec!["a".into(), "b".into()])
        );
        assert_eq!(to_url_value(&StateValue::Null), UrlValue::Null);
    }
}
