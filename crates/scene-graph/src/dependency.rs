//! Variable dependency tracking
//!
//! A node's definition names the state fields that may reference variables.
//! The tracker scans those fields for tokens and caches the resulting name
//! set. A rescan happens only when the snapshot changed identity *and* at
//! least one tracked field changed reference; edits to untracked fields are
//! free.

use crate::node::SceneNode;
use crate::state::SceneState;
use crate::value::StateValue;
use scene_template::extract_names;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Cached variable-name scan over selected state fields
#[derive(Debug, Clone, Default)]
pub struct DependencyTracker {
    paths: Vec<String>,
    explicit: BTreeSet<String>,
    last_state: Option<Arc<SceneState>>,
    names: BTreeSet<String>,
    scan_count: usize,
}

impl DependencyTracker {
    /// Track `paths`, always depending on `explicit` names
    #[must_use]
    pub fn new<P, E>(paths: P, explicit: E) -> Self
    where
        P: IntoIterator<Item = String>,
        E: IntoIterator<Item = String>,
    {
        Self {
            paths: paths.into_iter().collect(),
            explicit: explicit.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Whether anything is tracked at all
    #[inline]
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        !self.paths.is_empty() || !self.explicit.is_empty()
    }

    /// Variable names referenced by `state`
    pub fn get_names(&mut self, state: &Arc<SceneState>) -> &BTreeSet<String> {
        let rescan = match &self.last_state {
            None => true,
            Some(last) if Arc::ptr_eq(last, state) => false,
            Some(last) => self.paths.iter().any(|path| {
                match (last.get(path), state.get(path)) {
                    (Some(a), Some(b)) => !a.same_ref(b),
                    (None, None) => false,
                    _ => true,
                }
            }),
        };

        if rescan {
            self.names = self.scan(state);
            self.scan_count += 1;
        }
        self.last_state = Some(Arc::clone(state));
        &self.names
    }

    /// Whether `state` references `name`
    pub fn has_dependency_on(&mut self, state: &Arc<SceneState>, name: &str) -> bool {
        self.get_names(state).contains(name)
    }

    /// How many times state has been scanned
    #[inline]
    #[must_use]
    pub fn scan_count(&self) -> usize {
        self.scan_count
    }

    fn scan(&self, state: &SceneState) -> BTreeSet<String> {
        let mut names = self.explicit.clone();
        for path in &self.paths {
            match state.get(path) {
                None | Some(StateValue::Null) => {}
                Some(StateValue::Text(text)) => names.extend(extract_names(text)),
                Some(value) => match value.to_json() {
                    Ok(json) => names.extend(extract_names(&json.to_string())),
                    Err(err) => {
                        tracing::error!(
                            key = %state.key(),
                            path = %path,
                            error = %err,
                            "failed to serialize state field while scanning for variables"
                        );
                    }
                },
            }
        }
        names
    }
}

impl SceneNode {
    /// Names of the variables this node's tracked fields reference
    #[must_use]
    pub fn variable_dependencies(&self) -> BTreeSet<String> {
        let state = self.state();
        self.inner.tracker.lock().get_names(&state).clone()
    }

    /// Whether this node references variable `name`
    #[must_use]
    pub fn depends_on_variable(&self, name: &str) -> bool {
        let state = self.state();
        let mut tracker = self.inner.tracker.lock();
        tracker.is_tracking() && tracker.has_dependency_on(&state, name)
    }

    /// How many times this node's state has been scanned for variables
    #[must_use]
    pub fn dependency_scan_count(&self) -> usize {
        self.inner.tracker.lock().scan_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatePatch;
    use pretty_assertions::assert_eq;

    fn state(fields: &[(&str, StateValue)]) -> Arc<SceneState> {
        let mut state = SceneState::new().with_key("k");
        for (field, value) in fields {
            state = state.with(*field, value.clone());
        }
        Arc::new(state)
    }

    fn names(set: &BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn scans_text_fields() {
        let mut tracker = DependencyTracker::new(vec!["query".to_string()], Vec::new());
        let s = state(&[("query", "${a} ${b}".into())]);
        assert_eq!(names(tracker.get_names(&s)), vec!["a", "b"]);
        assert_eq!(tracker.scan_count(), 1);
    }

    #[test]
    fn untracked_changes_do_not_rescan() {
        let mut tracker = DependencyTracker::new(vec!["query".to_string()], Vec::new());
        let first = state(&[("query", "${a} ${b}".into()), ("title", "x".into())]);
        tracker.get_names(&first);

        let second = Arc::new(first.merged(&StatePatch::new().set("title", "y")));
        tracker.get_names(&second);
        tracker.get_names(&second);
        assert_eq!(tracker.scan_count(), 1);

        let third = Arc::new(second.merged(&StatePatch::new().set("query", "${c}")));
        assert_eq!(names(tracker.get_names(&third)), vec!["c"]);
        assert_eq!(tracker.scan_count(), 2);
    }

    #[test]
    fn structured_fields_are_serialized() {
        let mut tracker = DependencyTracker::new(vec!["targets".to_string()], Vec::new());
        let targets = StateValue::list([StateValue::object([("expr", "rate(${metric}[5m])")])]);
        let s = state(&[("targets", targets)]);
        assert_eq!(names(tracker.get_names(&s)), vec!["metric"]);
    }

    #[test]
    fn serialization_failure_counts_as_empty() {
        struct Handle;
        let mut tracker = DependencyTracker::new(
            vec!["bad".to_string(), "good".to_string()],
            vec!["always".to_string()],
        );
        let s = state(&[
            ("bad", StateValue::list([StateValue::opaque(Handle)])),
            ("good", "$x".into()),
        ]);
        assert_eq!(names(tracker.get_names(&s)), vec!["always", "x"]);
    }

    #[test]
    fn has_dependency_on() {
        let mut tracker = DependencyTracker::new(vec!["title".to_string()], Vec::new());
        let s = state(&[("title", "[[host]]".into())]);
        assert!(tracker.has_dependency_on(&s, "host"));
        assert!(!tracker.has_dependency_on(&s, "other"));
        assert_eq!(tracker.scan_count(), 1);
    }
}
