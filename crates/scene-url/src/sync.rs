//! URL sync manager
//!
//! Keeps the URL query and the URL-syncable nodes of one scene tree in step.
//!
//! - A state change on a syncable node pushes the keys whose values differ
//!   from the URL, as a `replace` update (no new history entry).
//! - Nodes attached by a state change are brought in line with the URL.
//! - A location change the manager did not cause is applied to every
//!   syncable node, touching only nodes whose declared keys differ.

use crate::key_mapper::UniqueUrlKeyMapper;
use crate::location::{LocationService, UrlQuery};
use parking_lot::Mutex;
use scene_graph::{EventKind, SceneEvent, SceneNode, StateChangedEvent, Subscription, UrlState, UrlValue};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

struct Binding {
    root: SceneNode,
    subscriptions: Vec<Subscription>,
}

struct ManagerInner {
    location: Arc<dyn LocationService>,
    binding: Mutex<Option<Binding>>,
    key_mapper: Mutex<UniqueUrlKeyMapper>,
    pushing: AtomicBool,
}

/// Synchronises one scene tree with a [`LocationService`]
#[derive(Clone)]
pub struct UrlSyncManager {
    inner: Arc<ManagerInner>,
}

impl UrlSyncManager {
    /// Manager over `location`; idle until [`UrlSyncManager::init_sync`]
    #[must_use]
    pub fn new(location: Arc<dyn LocationService>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                location,
                binding: Mutex::new(None),
                key_mapper: Mutex::new(UniqueUrlKeyMapper::new()),
                pushing: AtomicBool::new(false),
            }),
        }
    }

    /// The location this manager writes to
    #[inline]
    #[must_use]
    pub fn location(&self) -> &Arc<dyn LocationService> {
        &self.inner.location
    }

    /// Whether a tree is bound
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.binding.lock().is_some()
    }

    /// Bind `root`: observe its changes and the location, then apply the
    /// current URL to the tree
    ///
    /// Binding a new root releases the previous one.
    pub fn init_sync(&self, root: &SceneNode) {
        let previous = self.inner.binding.lock().take();
        if let Some(previous) = previous {
            tracing::debug!(root = %previous.root.key(), "releasing previous URL binding");
        }
        self.inner.key_mapper.lock().clear();

        let weak = Arc::downgrade(&self.inner);
        let state_sub = root.subscribe_to_event(EventKind::StateChanged, move |event| {
            if let (Some(inner), SceneEvent::StateChanged(change)) = (weak.upgrade(), event) {
                inner.on_state_changed(change);
            }
        });

        let weak: Weak<ManagerInner> = Arc::downgrade(&self.inner);
        let location_sub = self.inner.location.subscribe(Arc::new(move |query: &UrlQuery| {
            if let Some(inner) = weak.upgrade() {
                inner.on_location_changed(query);
            }
        }));

        *self.inner.binding.lock() = Some(Binding {
            root: root.clone(),
            subscriptions: vec![state_sub, location_sub],
        });
        tracing::debug!(root = %root.key(), "URL sync bound");

        let query = self.inner.location.query();
        self.inner.sync_from_query(root, root, &query);
    }

    /// Release `root` if it is the bound tree
    pub fn clean_up(&self, root: &SceneNode) {
        let released = {
            let mut binding = self.inner.binding.lock();
            match binding.as_ref() {
                Some(bound) if bound.root.ptr_eq(root) => binding.take(),
                _ => None,
            }
        };
        if let Some(mut binding) = released {
            for subscription in &mut binding.subscriptions {
                subscription.unsubscribe();
            }
            self.inner.key_mapper.lock().clear();
            tracing::debug!(root = %root.key(), "URL sync released");
        }
    }

    /// Apply the current URL to `root`'s subtree
    pub fn sync_from_url(&self, root: &SceneNode) {
        let query = self.inner.location.query();
        self.inner.sync_from_query(root, root, &query);
    }

    /// URL state of every syncable node under `root`, by unique key
    #[must_use]
    pub fn get_url_state(&self, root: &SceneNode) -> UrlState {
        let mut out = UrlState::new();
        self.inner.collect_url_state(root, &mut out);
        out
    }
}

impl ManagerInner {
    fn bound_root(&self) -> Option<SceneNode> {
        self.binding.lock().as_ref().map(|b| b.root.clone())
    }

    fn unique_key(&self, key: &str, node: &SceneNode, root: &SceneNode) -> String {
        self.key_mapper.lock().get_unique_key(key, node, root)
    }

    fn on_state_changed(&self, change: &StateChangedEvent) {
        let Some(root) = self.bound_root() else {
            return;
        };
        let node = &change.source;

        if let Some(url_state) = node.url_state() {
            let query = self.location.query();
            let mut updates = UrlState::new();
            for (key, value) in url_state {
                let unique = self.unique_key(&key, node, &root);
                if !query.get(&unique).same_as(&value) {
                    updates.insert(unique, value);
                }
            }
            if !updates.is_empty() {
                tracing::debug!(key = %node.key(), keys = ?updates.keys().collect::<Vec<_>>(), "pushing state to URL");
                self.pushing.store(true, Ordering::Release);
                self.location.partial(&updates, true);
                self.pushing.store(false, Ordering::Release);
            }
        }

        let attached = change.partial.child_nodes();
        if !attached.is_empty() {
            let query = self.location.query();
            for child in attached {
                self.sync_from_query(&child, &root, &query);
            }
        }
    }

    fn on_location_changed(&self, query: &UrlQuery) {
        if self.pushing.load(Ordering::Acquire) {
            return;
        }
        if let Some(root) = self.bound_root() {
            tracing::debug!(query = %query, "location changed, syncing scene from URL");
            self.sync_from_query(&root, &root, query);
        }
    }

    /// Sync `node`, then its children, then each child's subtree
    fn sync_from_query(&self, node: &SceneNode, root: &SceneNode, query: &UrlQuery) {
        self.sync_node(node, root, query);
        self.sync_children(node, root, query);
    }

    fn sync_children(&self, node: &SceneNode, root: &SceneNode, query: &UrlQuery) {
        let children = node.state().child_nodes();
        for child in &children {
            self.sync_node(child, root, query);
        }
        for child in &children {
            self.sync_children(child, root, query);
        }
    }

    fn sync_node(&self, node: &SceneNode, root: &SceneNode, query: &UrlQuery) {
        let Some(current) = node.url_state() else {
            return;
        };

        let mut changed = UrlState::new();
        for key in node.url_keys() {
            let unique = self.unique_key(&key, node, root);
            if !query.contains(&unique) {
                continue;
            }
            let incoming = query.get(&unique);
            let existing = current.get(&key).cloned().unwrap_or(UrlValue::Null);
            if !incoming.same_as(&existing) {
                changed.insert(key, incoming);
            }
        }

        if changed.is_empty() {
            return;
        }
        tracing::debug!(key = %node.key(), keys = ?changed.keys().collect::<Vec<_>>(), "updating node from URL");
        if let Err(err) = node.update_from_url(&changed) {
            tracing::warn!(key = %node.key(), error = %err, "failed to apply URL state");
        }
    }

    fn collect_url_state(&self, root: &SceneNode, out: &mut UrlState) {
        self.collect_node(root, root, out);
        self.collect_children(root, root, out);
    }

    fn collect_children(&self, node: &SceneNode, root: &SceneNode, out: &mut UrlState) {
        let children = node.state().child_nodes();
        for child in &children {
            self.collect_node(child, root, out);
        }
        for child in &children {
            self.collect_children(child, root, out);
        }
    }

    fn collect_node(&self, node: &SceneNode, root: &SceneNode, out: &mut UrlState) {
        if let Some(state) = node.url_state() {
            for (key, value) in state {
                let unique = self.unique_key(&key, node, root);
                out.insert(unique, value);
            }
        }
    }
}

impl fmt::Debug for UrlSyncManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSyncManager")
            .field("root", &self.inner.bound_root())
            .finish_non_exhaustive()
    }
}
