//! Frozen state snapshots
//!
//! A [`SceneState`] is immutable once a node holds it: nodes keep it behind an
//! `Arc` and expose no mutable access. Changes are expressed as a
//! [`StatePatch`] and merged into a new snapshot by `SceneNode::set_state`.

use crate::error::SceneError;
use crate::node::SceneNode;
use crate::value::StateValue;
use im::OrdMap;
use std::collections::BTreeMap;

/// Data provider slot
pub const DATA_SLOT: &str = "$data";
/// Variable set slot
pub const VARIABLES_SLOT: &str = "$variables";
/// Time range slot
pub const TIME_RANGE_SLOT: &str = "$timeRange";
/// Editor slot
pub const EDITOR_SLOT: &str = "$editor";

/// Reserved slots in activation order
pub const RESERVED_SLOTS: [&str; 4] = [TIME_RANGE_SLOT, VARIABLES_SLOT, DATA_SLOT, EDITOR_SLOT];

/// Whether `field` is a reserved slot
#[inline]
#[must_use]
pub fn is_reserved_slot(field: &str) -> bool {
    RESERVED_SLOTS.contains(&field)
}

/// Immutable state snapshot of a node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneState {
    key: String,
    cache_key: Option<String>,
    fields: OrdMap<String, StateValue>,
}

impl SceneState {
    /// Create empty state; the node assigns a key when none is set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With identity key
    #[inline]
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// With cache key
    #[inline]
    #[must_use]
    pub fn with_cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.cache_key = Some(cache_key.into());
        self
    }

    /// With a field
    #[inline]
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Identity key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Cache key
    #[inline]
    #[must_use]
    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    /// Field value
    #[inline]
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&StateValue> {
        self.fields.get(field)
    }

    /// Text field
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(StateValue::as_str)
    }

    /// Node field
    #[must_use]
    pub fn get_node(&self, field: &str) -> Option<&SceneNode> {
        self.get(field).and_then(StateValue::as_node)
    }

    /// Whether the field is set
    #[inline]
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Fields in key order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether there are no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Direct child nodes: node fields and node elements of list fields
    #[must_use]
    pub fn child_nodes(&self) -> Vec<SceneNode> {
        self.fields.values().flat_map(StateValue::child_nodes).collect()
    }

    /// Copy with `patch` applied; unchanged fields share storage
    #[must_use]
    pub fn merged(&self, patch: &StatePatch) -> Self {
        let mut next = self.clone();
        for (field, change) in &patch.changes {
            match change {
                Some(value) => {
                    next.fields.insert(field.clone(), value.clone());
                }
                None => {
                    next.fields.remove(field);
                }
            }
        }
        next
    }

    /// Copy with a different identity key
    #[must_use]
    pub fn rekeyed(&self, key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..self.clone()
        }
    }

    /// Check that reserved slots hold nodes
    ///
    /// # Errors
    /// Returns [`SceneError::InvariantViolation`] naming the first offending slot
    pub fn validate(&self) -> Result<(), SceneError> {
        validate_slots(&self.key, self.fields())
    }

    /// JSON form: key, cache key and every field
    ///
    /// # Errors
    /// Returns [`SceneError::NotSerializable`] if a field holds an opaque value
    pub fn to_json(&self) -> Result<serde_json::Value, SceneError> {
        let mut out = serde_json::Map::new();
        out.insert("key".to_string(), serde_json::Value::String(self.key.clone()));
        if let Some(cache_key) = &self.cache_key {
            out.insert("cacheKey".to_string(), serde_json::Value::String(cache_key.clone()));
        }
        for (field, value) in &self.fields {
            out.insert(field.clone(), value.to_json()?);
        }
        Ok(serde_json::Value::Object(out))
    }
}

/// Partial state update
///
/// A field mapped to `None` is removed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatePatch {
    changes: BTreeMap<String, Option<StateValue>>,
}

impl StatePatch {
    /// Create an empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field
    #[inline]
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.changes.insert(field.into(), Some(value.into()));
        self
    }

    /// Remove a field
    #[inline]
    #[must_use]
    pub fn remove(mut self, field: impl Into<String>) -> Self {
        self.changes.insert(field.into(), None);
        self
    }

    /// Set a field in place
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<StateValue>) {
        self.changes.insert(field.into(), Some(value.into()));
    }

    /// Change for `field`: `Some(None)` means removal
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Option<&StateValue>> {
        self.changes.get(field).map(Option::as_ref)
    }

    /// Whether the patch touches `field`
    #[inline]
    #[must_use]
    pub fn touches(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    /// Changed field names
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.changes.keys().map(String::as_str)
    }

    /// Values being set
    pub fn values(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.changes
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.as_str(), v)))
    }

    /// Whether the patch is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Nodes introduced by the patch
    #[must_use]
    pub fn child_nodes(&self) -> Vec<SceneNode> {
        self.values().flat_map(|(_, v)| v.child_nodes()).collect()
    }

    /// Merge `other` on top of this patch
    #[must_use]
    pub fn merge(mut self, other: StatePatch) -> Self {
        self.changes.extend(other.changes);
        self
    }

    /// Check that reserved slots receive nodes
    ///
    /// # Errors
    /// Returns [`SceneError::InvariantViolation`] naming the first offending slot
    pub fn validate(&self, key: &str) -> Result<(), SceneError> {
        validate_slots(key, self.values())
    }
}

impl<K, V> FromIterator<(K, V)> for StatePatch
where
    K: Into<String>,
    V: Into<StateValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            changes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        }
    }
}

fn validate_slots<'a>(
    key: &str,
    fields: impl Iterator<Item = (&'a str, &'a StateValue)>,
) -> Result<(), SceneError> {
    for (field, value) in fields {
        if is_reserved_slot(field) && !matches!(value, StateValue::Node(_)) {
            return Err(SceneError::invariant(
                key,
                field,
                format!("is a reserved slot and must hold a node, got {value:?}"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn merge_leaves_original_untouched() {
        let before = SceneState::new().with_key("a").with("title", "one").with("n", 1.0);
        let after = before.merged(&StatePatch::new().set("title", "two").remove("n"));

        assert_eq!(before.get_str("title"), Some("one"));
        assert!(before.contains("n"));
        assert_eq!(after.get_str("title"), Some("two"));
        assert!(!after.contains("n"));
        assert_eq!(after.key(), "a");
    }

    #[test]
    fn unchanged_fields_keep_their_reference() {
        let list = StateValue::list(["x"]);
        let before = SceneState::new().with("items", list.clone()).with("other", 1.0);
        let after = before.merged(&StatePatch::new().set("other", 2.0));
        assert!(after.get("items").unwrap().same_ref(&list));
    }

    #[test]
    fn reserved_slots_require_nodes() {
        let err = StatePatch::new().set(DATA_SLOT, "nope").validate("panel").unwrap_err();
        assert!(matches!(
            err,
            SceneError::InvariantViolation { ref field, .. } if field == DATA_SLOT
        ));

        let state = SceneState::new().with(TIME_RANGE_SLOT, 5.0);
        assert!(state.validate().is_err());
    }

    #[test]
    fn rekeyed_keeps_fields() {
        let state = SceneState::new().with_key("old").with_cache_key("c").with("a", true);
        let next = state.rekeyed("new");
        assert_eq!(next.key(), "new");
        assert_eq!(next.cache_key(), Some("c"));
        assert_eq!(next.get("a"), Some(&StateValue::Bool(true)));
    }
}
