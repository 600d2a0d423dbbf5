//! Unique URL keys
//!
//! Several nodes may claim the same URL key, e.g. two time ranges both
//! claiming `from`. The first claimant keeps the bare key; later ones get
//! `from-2`, `from-3` and so on. Assignments are stable for the life of the
//! mapper. When a new claimant arrives, claimants that were dropped or
//! detached from the synced tree are forgotten first.

use scene_graph::traversal::get_root;
use scene_graph::{SceneNode, WeakSceneNode};
use std::collections::HashMap;

/// Maps `(key, node)` to a key unique within one synced tree
#[derive(Debug, Default)]
pub struct UniqueUrlKeyMapper {
    index: HashMap<String, Vec<WeakSceneNode>>,
}

impl UniqueUrlKeyMapper {
    /// Empty mapper
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unique key for `node`'s claim on `key` within the tree rooted at `root`
    pub fn get_unique_key(&mut self, key: &str, node: &SceneNode, root: &SceneNode) -> String {
        let claimants = self.index.entry(key.to_string()).or_default();

        let position = match claimants.iter().position(|c| c.points_to(node)) {
            Some(position) => position,
            None => {
                claimants.retain(|c| is_attached(c, root));
                claimants.push(node.downgrade());
                claimants.len() - 1
            }
        };

        if position == 0 {
            key.to_string()
        } else {
            format!("{key}-{}", position + 1)
        }
    }

    /// Forget every assignment
    pub fn clear(&mut self) {
        self.index.clear();
    }

    /// Number of claimants currently indexed for `key`
    #[must_use]
    pub fn claimants(&self, key: &str) -> usize {
        self.index.get(key).map_or(0, Vec::len)
    }
}

fn is_attached(claimant: &WeakSceneNode, root: &SceneNode) -> bool {
    claimant
        .upgrade()
        .is_some_and(|node| get_root(&node).ptr_eq(root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene_graph::objects::{layout, time_range};
    use scene_graph::SceneContext;

    #[test]
    fn later_claimants_are_numbered() {
        let ctx = SceneContext::new();
        let a = time_range("now-1h", "now", &ctx).unwrap();
        let b = time_range("now-2h", "now", &ctx).unwrap();
        let c = time_range("now-3h", "now", &ctx).unwrap();
        let root = layout(vec![a.clone(), b.clone(), c.clone()], &ctx).unwrap();

        let mut mapper = UniqueUrlKeyMapper::new();
        assert_eq!(mapper.get_unique_key("from", &a, &root), "from");
        assert_eq!(mapper.get_unique_key("from", &b, &root), "from-2");
        assert_eq!(mapper.get_unique_key("from", &c, &root), "from-3");
        assert_eq!(mapper.get_unique_key("from", &b, &root), "from-2");
    }

    #[test]
    fn dropped_claimants_are_forgotten() {
        let ctx = SceneContext::new();
        let root = layout(Vec::new(), &ctx).unwrap();
        let kept = time_range("now-1h", "now", &ctx).unwrap();
        let mut mapper = UniqueUrlKeyMapper::new();

        {
            let gone = time_range("now-2h", "now", &ctx).unwrap();
            assert_eq!(mapper.get_unique_key("from", &gone, &gone), "from");
        }
        assert_eq!(mapper.get_unique_key("from", &kept, &root), "from");
        assert_eq!(mapper.claimants("from"), 1);
    }

    #[test]
    fn clear_resets_numbering() {
        let ctx = SceneContext::new();
        let a = time_range("now-1h", "now", &ctx).unwrap();
        let b = time_range("now-2h", "now", &ctx).unwrap();
        let root = layout(vec![a.clone(), b.clone()], &ctx).unwrap();

        let mut mapper = UniqueUrlKeyMapper::new();
        mapper.get_unique_key("from", &a, &root);
        assert_eq!(mapper.get_unique_key("from", &b, &root), "from-2");
        mapper.clear();
        assert_eq!(mapper.get_unique_key("from", &b, &root), "from");
    }
}
