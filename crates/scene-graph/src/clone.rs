//! Node cloning
//!
//! A clone is an independent subtree: every node held in a field, directly or
//! as a list element, is cloned recursively with a fresh key. Scalars and
//! compound values are shared with the original. Clones start inactive and
//! do not inherit runtime activation handlers or subscriptions.

use crate::error::SceneResult;
use crate::node::{new_key, SceneNode};
use crate::state::StatePatch;
use crate::value::StateValue;
use std::sync::Arc;

impl SceneNode {
    /// Clone this node and its subtree, applying `overrides` last
    ///
    /// Override values are used as given; nodes passed in `overrides` are not
    /// cloned. The clone is built through the original's definition and does
    /// not consult the object cache.
    ///
    /// # Errors
    /// Returns [`SceneError::InvariantViolation`](crate::SceneError) if an
    /// override puts a non-node value in a reserved slot
    pub fn clone_node(&self, overrides: StatePatch) -> SceneResult<SceneNode> {
        let state = self.state();

        let mut cloned = StatePatch::new();
        for (field, value) in state.fields() {
            if let Some(copy) = clone_value(value)? {
                cloned.insert(field, copy);
            }
        }

        let next = state
            .rekeyed(new_key())
            .merged(&cloned.merge(overrides));
        let clone = SceneNode::construct(Arc::clone(self.definition()), next, self.context(), false)?;
        tracing::trace!(original = %self.key(), clone = %clone.key(), "node cloned");
        Ok(clone)
    }
}

/// Cloned replacement for `value`, or `None` if it holds no nodes
fn clone_value(value: &StateValue) -> SceneResult<Option<StateValue>> {
    match value {
        StateValue::Node(node) => Ok(Some(node.clone_node(StatePatch::new())?.into())),
        StateValue::List(items) if items.iter().any(|item| item.as_node().is_some()) => {
            let items = items
                .iter()
                .map(|item| match item {
                    StateValue::Node(node) => node.clone_node(StatePatch::new()).map(StateValue::from),
                    other => Ok(other.clone()),
                })
                .collect::<SceneResult<Vec<_>>>()?;
            Ok(Some(StateValue::from(items)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SceneContext;
    use crate::node::NodeKind;
    use crate::objects::time_range;
    use crate::state::TIME_RANGE_SLOT;
    use parking_lot::Mutex;

    fn panel(ctx: &SceneContext, title: &str) -> SceneNode {
        SceneNode::builder(NodeKind::Custom("panel".into()))
            .field("title", title)
            .build(ctx)
            .unwrap()
    }

    #[test]
    fn nested_nodes_are_cloned() {
        let ctx = SceneContext::new();
        let range = time_range("now-1h", "now", &ctx).unwrap();
        let original = SceneNode::builder(NodeKind::Scene)
            .field(TIME_RANGE_SLOT, &range)
            .field("children", StateValue::list([StateValue::from(panel(&ctx, "a")), "label".into()]))
            .build(&ctx)
            .unwrap();
        original.activate();

        let copy = original.clone_node(StatePatch::new()).unwrap();
        assert_ne!(copy.key(), original.key());
        assert!(!copy.is_active());

        let copied_range = copy.get_node(TIME_RANGE_SLOT).unwrap();
        assert_ne!(copied_range, range);
        assert!(!copied_range.is_active());
        assert_eq!(copied_range.parent(), Some(copy.clone()));

        let items = copy.get("children").unwrap();
        let items = items.as_list().unwrap();
        assert_ne!(items[0].as_node().unwrap().key(), original.state().child_nodes()[1].key());
        assert_eq!(items[1].as_str(), Some("label"));
    }

    #[test]
    fn overrides_apply_last() {
        let ctx = SceneContext::new();
        let original = panel(&ctx, "a");
        let copy = original
            .clone_node(StatePatch::new().set("title", "b"))
            .unwrap();
        assert_eq!(copy.get_str("title").as_deref(), Some("b"));
        assert_eq!(original.get_str("title").as_deref(), Some("a"));
        assert!(Arc::ptr_eq(copy.definition(), original.definition()));
    }

    #[test]
    fn runtime_handlers_are_not_inherited() {
        let ctx = SceneContext::new();
        let original = panel(&ctx, "a");
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        original.add_activation_handler(move |_| {
            *c.lock() += 1;
            None
        });

        let copy = original.clone_node(StatePatch::new()).unwrap();
        copy.activate();
        assert_eq!(*count.lock(), 0);
        original.activate();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn clones_skip_cache_seeding() {
        let ctx = SceneContext::new();
        let original = SceneNode::builder(NodeKind::Custom("panel".into()))
            .cache_key("p")
            .field("title", "cached")
            .build(&ctx)
            .unwrap();
        let copy = original
            .clone_node(StatePatch::new().set("title", "override"))
            .unwrap();
        assert_eq!(copy.get_str("title").as_deref(), Some("override"));
    }
}
