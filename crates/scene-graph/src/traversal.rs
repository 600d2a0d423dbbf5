//! Graph traversal
//!
//! Ancestor-scoped lookups walk from a node upward, inclusive, and return the
//! first provider found. Time range, data and variables fall back to the
//! context's singletons; layout and editor are required and report a
//! [`StructuralError`] when missing. All lookups are O(depth) and read-only.

use crate::error::StructuralError;
use crate::node::{NodeKind, SceneNode};
use crate::state::{DATA_SLOT, EDITOR_SLOT, TIME_RANGE_SLOT, VARIABLES_SLOT};
use crate::variables::set::get_by_name;

/// Iterator over a node and its ancestors, nearest first
#[derive(Debug, Clone)]
pub struct Ancestors {
    next: Option<SceneNode>,
}

impl Iterator for Ancestors {
    type Item = SceneNode;

    fn next(&mut self) -> Option<SceneNode> {
        let current = self.next.take()?;
        self.next = current.parent();
        Some(current)
    }
}

/// `node`, then its parent, and so on up to the root
#[must_use]
pub fn ancestors(node: &SceneNode) -> Ancestors {
    Ancestors {
        next: Some(node.clone()),
    }
}

fn nearest_slot(node: &SceneNode, slot: &str) -> Option<SceneNode> {
    ancestors(node).find_map(|n| n.get_node(slot))
}

/// Nearest time range, or the context's default
#[must_use]
pub fn get_time_range(node: &SceneNode) -> SceneNode {
    nearest_slot(node, TIME_RANGE_SLOT).unwrap_or_else(|| node.context().fallback_time_range())
}

/// Nearest data provider, or the context's empty one
#[must_use]
pub fn get_data(node: &SceneNode) -> SceneNode {
    nearest_slot(node, DATA_SLOT).unwrap_or_else(|| node.context().fallback_data())
}

/// Nearest variable set, or the context's empty one
#[must_use]
pub fn get_variables(node: &SceneNode) -> SceneNode {
    nearest_slot(node, VARIABLES_SLOT).unwrap_or_else(|| node.context().fallback_variables())
}

/// Nearest layout node
///
/// # Errors
/// Returns [`StructuralError::MissingAncestor`] if no ancestor is a layout
pub fn get_layout(node: &SceneNode) -> Result<SceneNode, StructuralError> {
    get_ancestor(node, &NodeKind::Layout).ok_or_else(|| StructuralError::MissingAncestor {
        service: "layout",
        key: node.key().to_string(),
    })
}

/// Nearest editor
///
/// # Errors
/// Returns [`StructuralError::MissingAncestor`] if no ancestor has one
pub fn get_editor(node: &SceneNode) -> Result<SceneNode, StructuralError> {
    nearest_slot(node, EDITOR_SLOT).ok_or_else(|| StructuralError::MissingAncestor {
        service: "editor",
        key: node.key().to_string(),
    })
}

/// Nearest node of `kind`, inclusive
#[must_use]
pub fn get_ancestor(node: &SceneNode, kind: &NodeKind) -> Option<SceneNode> {
    ancestors(node).find(|n| n.kind() == kind)
}

/// Topmost ancestor
#[must_use]
pub fn get_root(node: &SceneNode) -> SceneNode {
    ancestors(node).last().unwrap_or_else(|| node.clone())
}

/// Call `f` for each direct child, in field order
pub fn for_each_child(node: &SceneNode, mut f: impl FnMut(&SceneNode)) {
    for child in node.state().child_nodes() {
        f(&child);
    }
}

/// Depth-first, pre-order walk of `root`'s subtree; `f` returns `false` to
/// skip a node's descendants
pub fn walk(root: &SceneNode, f: &mut impl FnMut(&SceneNode) -> bool) {
    if f(root) {
        for child in root.state().child_nodes() {
            walk(&child, f);
        }
    }
}

/// First node in `root`'s subtree with identity `key`
#[must_use]
pub fn find_by_key(root: &SceneNode, key: &str) -> Option<SceneNode> {
    let mut found = None;
    walk(root, &mut |node| {
        if found.is_some() {
            return false;
        }
        if node.key() == key {
            found = Some(node.clone());
            return false;
        }
        true
    });
    found
}

/// Every node in `root`'s subtree matching `predicate`, pre-order
#[must_use]
pub fn find_all(root: &SceneNode, mut predicate: impl FnMut(&SceneNode) -> bool) -> Vec<SceneNode> {
    let mut found = Vec::new();
    walk(root, &mut |node| {
        if predicate(node) {
            found.push(node.clone());
        }
        true
    });
    found
}

/// Resolve variable `name` from `node` upward
///
/// Checks the node's own variable set first, then each ancestor's. A
/// variable set on the path is searched itself, so variables see their
/// siblings. `None` if no set on the path defines it.
#[must_use]
pub fn lookup_variable(name: &str, node: &SceneNode) -> Option<SceneNode> {
    ancestors(node).find_map(|n| {
        if *n.kind() == NodeKind::VariableSet {
            if let Some(found) = get_by_name(&n, name) {
                return Some(found);
            }
        }
        n.get_node(VARIABLES_SLOT)
            .and_then(|set| get_by_name(&set, name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SceneContext;
    use crate::objects::{editor, layout, time_range};
    use crate::value::StateValue;

    fn panel(ctx: &SceneContext, key: &str) -> SceneNode {
        SceneNode::builder(NodeKind::Custom("panel".into()))
            .key(key)
            .build(ctx)
            .unwrap()
    }

    #[test]
    fn nearest_time_range_wins() {
        let ctx = SceneContext::new();
        let inner_range = time_range("now-1h", "now", &ctx).unwrap();
        let outer_range = time_range("now-7d", "now", &ctx).unwrap();
        let leaf = panel(&ctx, "leaf");
        let inner = SceneNode::builder(NodeKind::Custom("row".into()))
            .field(TIME_RANGE_SLOT, &inner_range)
            .field("body", &leaf)
            .build(&ctx)
            .unwrap();
        let root = SceneNode::builder(NodeKind::Scene)
            .field(TIME_RANGE_SLOT, &outer_range)
            .field("body", &inner)
            .build(&ctx)
            .unwrap();

        assert_eq!(get_time_range(&leaf), inner_range);
        assert_eq!(get_time_range(&root), outer_range);
        assert_eq!(get_root(&leaf), root);
    }

    #[test]
    fn missing_providers_fall_back() {
        let ctx = SceneContext::new();
        let leaf = panel(&ctx, "leaf");
        assert_eq!(get_time_range(&leaf), ctx.fallback_time_range());
        assert_eq!(get_data(&leaf), ctx.fallback_data());
        assert_eq!(get_variables(&leaf), ctx.fallback_variables());
    }

    #[test]
    fn layout_and_editor_are_required() {
        let ctx = SceneContext::new();
        let leaf = panel(&ctx, "leaf");
        let err = get_layout(&leaf).unwrap_err();
        assert_eq!(
            err,
            StructuralError::MissingAncestor {
                service: "layout",
                key: "leaf".to_string()
            }
        );
        assert!(get_editor(&leaf).is_err());

        let ed = editor(&ctx).unwrap();
        let grid = layout(vec![leaf.clone()], &ctx).unwrap();
        let _root = SceneNode::builder(NodeKind::Scene)
            .field(EDITOR_SLOT, &ed)
            .field("body", &grid)
            .build(&ctx)
            .unwrap();
        assert_eq!(get_layout(&leaf).unwrap(), grid);
        assert_eq!(get_editor(&leaf).unwrap(), ed);
    }

    #[test]
    fn search_helpers() {
        let ctx = SceneContext::new();
        let a = panel(&ctx, "a");
        let b = panel(&ctx, "b");
        let grid = layout(vec![a.clone(), b.clone()], &ctx).unwrap();

        assert_eq!(find_by_key(&grid, "b"), Some(b));
        assert_eq!(find_by_key(&grid, "zzz"), None);
        let panels = find_all(&grid, |n| matches!(n.kind(), NodeKind::Custom(_)));
        assert_eq!(panels.len(), 2);

        let mut seen = Vec::new();
        for_each_child(&grid, |child| seen.push(child.key().to_string()));
        assert_eq!(seen, vec!["a", "b"]);
        assert!(get_ancestor(&a, &NodeKind::Layout).is_some());
        assert!(matches!(grid.get("children"), Some(StateValue::List(_))));
    }
}
