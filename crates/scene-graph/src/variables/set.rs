//! Variable sets
//!
//! A variable set is the variable provider stored in a node's `$variables`
//! slot. While active it watches its variables and, when one changes value,
//! notifies every node that references it: other variables of the set and
//! the descendants of the set's owner. Subtrees whose own variable set
//! defines the same name are skipped, since the name resolves there instead.

use crate::context::SceneContext;
use crate::error::SceneResult;
use crate::event::StateChangedEvent;
use crate::node::{DeactivationHandler, NodeDefinition, NodeKind, SceneNode};
use crate::state::{SceneState, VARIABLES_SLOT};
use crate::traversal::walk;
use crate::value::StateValue;
use crate::variables::variable::{NAME_FIELD, TEXT_FIELD, VALUE_FIELD};
use once_cell::sync::Lazy;
use std::sync::Arc;

/// Variables field of a variable set
pub const VARIABLES_FIELD: &str = "variables";

static VARIABLE_SET: Lazy<Arc<NodeDefinition>> = Lazy::new(|| {
    Arc::new(NodeDefinition::new(NodeKind::VariableSet).with_activation_handler(on_set_activated))
});

/// Shared definition of variable sets
#[must_use]
pub fn variable_set_definition() -> Arc<NodeDefinition> {
    Arc::clone(&VARIABLE_SET)
}

/// Variable set holding `variables`
///
/// # Errors
/// As [`SceneNode::new`]
pub fn variable_set(variables: Vec<SceneNode>, context: &SceneContext) -> SceneResult<SceneNode> {
    SceneNode::new(
        variable_set_definition(),
        SceneState::new().with(VARIABLES_FIELD, StateValue::list(variables)),
        context,
    )
}

/// Variables of a set, in order
#[must_use]
pub fn variables(set: &SceneNode) -> Vec<SceneNode> {
    set.get(VARIABLES_FIELD)
        .map(|v| v.child_nodes())
        .unwrap_or_default()
}

/// Variable named `name` in `set`
#[must_use]
pub fn get_by_name(set: &SceneNode, name: &str) -> Option<SceneNode> {
    variables(set)
        .into_iter()
        .find(|v| v.get_str(NAME_FIELD).as_deref() == Some(name))
}

fn on_set_activated(set: &SceneNode) -> Option<DeactivationHandler> {
    let mut activated = Vec::new();
    let mut subscriptions = Vec::new();

    for variable in variables(set) {
        if !variable.is_active() {
            variable.activate();
            activated.push(variable.clone());
        }

        let weak_set = set.downgrade();
        subscriptions.push(variable.subscribe_to_state(move |change| {
            if value_changed(change) {
                if let Some(set) = weak_set.upgrade() {
                    notify_dependents(&set, &change.source);
                }
            }
        }));
    }

    Some(Box::new(move || {
        drop(subscriptions);
        for variable in activated {
            variable.deactivate();
        }
    }))
}

fn value_changed(change: &StateChangedEvent) -> bool {
    [VALUE_FIELD, TEXT_FIELD].iter().any(|field| {
        match (change.previous.get(field), change.next.get(field)) {
            (Some(a), Some(b)) => !a.same_ref(b),
            (None, None) => false,
            _ => true,
        }
    })
}

/// Tell every node referencing `variable` that it changed
///
/// Covers the other variables of `set`, then the subtree of the set's owner.
/// A subtree whose own variable set defines the same name is skipped.
pub fn notify_dependents(set: &SceneNode, variable: &SceneNode) {
    let Some(name) = variable.get_str(NAME_FIELD) else {
        return;
    };
    tracing::debug!(variable = %name, set = %set.key(), "variable value changed");

    for other in variables(set) {
        if !other.ptr_eq(variable) && other.depends_on_variable(&name) {
            notify(&other, variable);
        }
    }

    let Some(owner) = set.parent() else {
        return;
    };
    walk(&owner, &mut |node| {
        if node.ptr_eq(set) {
            return false;
        }
        if !node.ptr_eq(&owner) {
            let shadowed = node
                .get_node(VARIABLES_SLOT)
                .is_some_and(|own| get_by_name(&own, &name).is_some());
            if shadowed {
                return false;
            }
        }
        if node.depends_on_variable(&name) {
            notify(node, variable);
        }
        true
    });
}

fn notify(node: &SceneNode, variable: &SceneNode) {
    if let Some(handler) = node.definition().variable_changed_handler() {
        tracing::trace!(key = %node.key(), "notifying dependent of variable change");
        handler(node, variable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatePatch;
    use crate::variables::variable::{constant, custom, text_box, Variable};
    use parking_lot::Mutex;

    #[test]
    fn finds_variables_by_name() {
        let ctx = SceneContext::new();
        let a = constant("a", "1", &ctx).unwrap();
        let set = variable_set(vec![a.clone(), text_box("b", "2", &ctx).unwrap()], &ctx).unwrap();
        assert_eq!(get_by_name(&set, "a"), Some(a));
        assert!(get_by_name(&set, "zzz").is_none());
        assert_eq!(variables(&set).len(), 2);
    }

    #[test]
    fn dependent_custom_variable_refreshes() {
        let ctx = SceneContext::new();
        let env = text_box("env", "dev", &ctx).unwrap();
        let host = custom("host", "${env}-a, ${env}-b", &ctx).unwrap();
        let set = variable_set(vec![env.clone(), host.clone()], &ctx).unwrap();
        set.activate();

        let host_var = Variable::from_node(host.clone()).unwrap();
        assert_eq!(host.get_str(VALUE_FIELD).as_deref(), Some("dev-a"));

        Variable::from_node(env).unwrap().set_value("prod", "prod").unwrap();
        assert_eq!(host_var.options()[0].value, "prod-a");
        assert_eq!(host.get_str(VALUE_FIELD).as_deref(), Some("prod-a"));
    }

    #[test]
    fn shadowed_subtrees_are_skipped() {
        let ctx = SceneContext::new();
        let hits = Arc::new(Mutex::new(Vec::new()));

        let panel = |key: &str| {
            let hits = hits.clone();
            SceneNode::builder(NodeKind::Custom("panel".into()))
                .key(key)
                .field("title", "${x}")
                .dependency_paths(["title"])
                .on_variable_changed(move |node, _| hits.lock().push(node.key().to_string()))
                .build(&ctx)
                .unwrap()
        };

        let outer_x = text_box("x", "1", &ctx).unwrap();
        let outer_panel = panel("outer");
        let shadowed_panel = panel("shadowed");
        let inner = SceneNode::builder(NodeKind::Custom("row".into()))
            .field(VARIABLES_SLOT, variable_set(vec![text_box("x", "2", &ctx).unwrap()], &ctx).unwrap())
            .field("body", &shadowed_panel)
            .build(&ctx)
            .unwrap();
        let root = SceneNode::builder(NodeKind::Scene)
            .field(VARIABLES_SLOT, variable_set(vec![outer_x.clone()], &ctx).unwrap())
            .field("children", StateValue::list([&outer_panel, &inner]))
            .build(&ctx)
            .unwrap();
        root.activate();

        outer_x.set_state(StatePatch::new().set(VALUE_FIELD, "3")).unwrap();
        assert_eq!(*hits.lock(), vec!["outer".to_string()]);
    }

    #[test]
    fn deactivation_stops_propagation() {
        let ctx = SceneContext::new();
        let env = text_box("env", "dev", &ctx).unwrap();
        let host = custom("host", "${env}", &ctx).unwrap();
        let set = variable_set(vec![env.clone(), host.clone()], &ctx).unwrap();
        set.activate();
        set.deactivate();
        assert!(!env.is_active());

        env.set_state(StatePatch::new().set(VALUE_FIELD, "prod")).unwrap();
        assert_eq!(host.get_str(VALUE_FIELD).as_deref(), Some("dev"));
    }
}
