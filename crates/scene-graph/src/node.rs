//! Scene nodes
//!
//! A [`SceneNode`] is a cheap handle (`Arc`) to a node of the graph. It owns
//! a frozen [`SceneState`] snapshot, an [`EventBus`] and a weak back-reference
//! to its parent. Children are owned through state fields; the parent link
//! is never an ownership edge.
//!
//! Every node is built from a shared [`NodeDefinition`] describing its kind
//! and behaviour. Clones reuse the definition of the original.

use crate::context::SceneContext;
use crate::dependency::DependencyTracker;
use crate::error::SceneResult;
use crate::event::{EventBus, EventKind, Propagation, SceneEvent, StateChangedEvent, Subscription};
use crate::lifecycle::Lifecycle;
use crate::state::{SceneState, StatePatch};
use crate::url::UrlSyncHandler;
use crate::value::StateValue;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

/// What a node is, for traversal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Scene root
    Scene,
    /// Layout container
    Layout,
    /// Editor
    Editor,
    /// Time range provider
    TimeRange,
    /// Data provider
    Data,
    /// Variable provider
    VariableSet,
    /// Variable
    Variable,
    /// Application node, e.g. a panel
    Custom(String),
}

impl NodeKind {
    /// Name used in documents and logs
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Scene => "scene",
            Self::Layout => "layout",
            Self::Editor => "editor",
            Self::TimeRange => "time-range",
            Self::Data => "data",
            Self::VariableSet => "variable-set",
            Self::Variable => "variable",
            Self::Custom(name) => name,
        }
    }

    /// Parse a kind name; unknown names are custom kinds
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "scene" => Self::Scene,
            "layout" => Self::Layout,
            "editor" => Self::Editor,
            "time-range" => Self::TimeRange,
            "data" => Self::Data,
            "variable-set" => Self::VariableSet,
            "variable" => Self::Variable,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs on activation; may return a handler to run on deactivation
pub type ActivationHandler = Arc<dyn Fn(&SceneNode) -> Option<DeactivationHandler> + Send + Sync>;

/// Runs once on deactivation
pub type DeactivationHandler = Box<dyn FnOnce() + Send>;

/// Called with `(node, variable)` when a variable the node references changes
pub type VariableChangedHandler = Arc<dyn Fn(&SceneNode, &SceneNode) + Send + Sync>;

/// Shared, immutable description of a node type
pub struct NodeDefinition {
    kind: NodeKind,
    dependency_paths: Vec<String>,
    explicit_variables: Vec<String>,
    url_sync: Option<Arc<dyn UrlSyncHandler>>,
    activation_handlers: Vec<ActivationHandler>,
    on_variable_changed: Option<VariableChangedHandler>,
}

impl NodeDefinition {
    /// Create a definition with no behaviour
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            dependency_paths: Vec::new(),
            explicit_variables: Vec::new(),
            url_sync: None,
            activation_handlers: Vec::new(),
            on_variable_changed: None,
        }
    }

    /// With state fields scanned for variable references
    #[must_use]
    pub fn with_dependency_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependency_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// With variable names depended on regardless of state
    #[must_use]
    pub fn with_explicit_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.explicit_variables = names.into_iter().map(Into::into).collect();
        self
    }

    /// With URL sync behaviour
    #[must_use]
    pub fn with_url_sync(mut self, handler: impl UrlSyncHandler + 'static) -> Self {
        self.url_sync = Some(Arc::new(handler));
        self
    }

    /// With an activation handler
    #[must_use]
    pub fn with_activation_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SceneNode) -> Option<DeactivationHandler> + Send + Sync + 'static,
    {
        self.activation_handlers.push(Arc::new(handler));
        self
    }

    /// With a callback for referenced variable changes
    #[must_use]
    pub fn with_variable_changed_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SceneNode, &SceneNode) + Send + Sync + 'static,
    {
        self.on_variable_changed = Some(Arc::new(handler));
        self
    }

    /// Node kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// State fields scanned for variable references
    #[inline]
    #[must_use]
    pub fn dependency_paths(&self) -> &[String] {
        &self.dependency_paths
    }

    /// Variable names depended on regardless of state
    #[inline]
    #[must_use]
    pub fn explicit_variables(&self) -> &[String] {
        &self.explicit_variables
    }

    /// URL sync behaviour
    #[inline]
    #[must_use]
    pub fn url_sync(&self) -> Option<&Arc<dyn UrlSyncHandler>> {
        self.url_sync.as_ref()
    }

    /// Activation handlers run for every node of this definition
    #[inline]
    #[must_use]
    pub fn activation_handlers(&self) -> &[ActivationHandler] {
        &self.activation_handlers
    }

    /// Callback for referenced variable changes
    #[inline]
    #[must_use]
    pub fn variable_changed_handler(&self) -> Option<&VariableChangedHandler> {
        self.on_variable_changed.as_ref()
    }
}

impl fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("kind", &self.kind)
            .field("dependency_paths", &self.dependency_paths)
            .field("explicit_variables", &self.explicit_variables)
            .field("url_sync", &self.url_sync.is_some())
            .field("activation_handlers", &self.activation_handlers.len())
            .finish_non_exhaustive()
    }
}

pub(crate) struct NodeInner {
    pub(crate) key: String,
    pub(crate) definition: Arc<NodeDefinition>,
    pub(crate) context: SceneContext,
    pub(crate) state: RwLock<Arc<SceneState>>,
    pub(crate) parent: RwLock<Weak<NodeInner>>,
    pub(crate) bus: EventBus,
    pub(crate) lifecycle: Mutex<Lifecycle>,
    pub(crate) tracker: Mutex<DependencyTracker>,
}

/// Handle to a scene node
#[derive(Clone)]
pub struct SceneNode {
    pub(crate) inner: Arc<NodeInner>,
}

/// Non-owning handle to a scene node
#[derive(Clone, Default)]
pub struct WeakSceneNode {
    inner: Weak<NodeInner>,
}

impl WeakSceneNode {
    /// Upgrade if the node is still alive
    #[inline]
    #[must_use]
    pub fn upgrade(&self) -> Option<SceneNode> {
        self.inner.upgrade().map(|inner| SceneNode { inner })
    }

    /// Whether this points at `node`
    #[inline]
    #[must_use]
    pub fn points_to(&self, node: &SceneNode) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&node.inner))
    }
}

impl fmt::Debug for WeakSceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakSceneNode({node:?})"),
            None => f.write_str("WeakSceneNode(<dropped>)"),
        }
    }
}

/// Generate a fresh identity key
pub(crate) fn new_key() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl SceneNode {
    /// Start building a node of `kind`
    #[inline]
    #[must_use]
    pub fn builder(kind: NodeKind) -> NodeBuilder {
        NodeBuilder {
            definition: NodeDefinition::new(kind),
            state: SceneState::new(),
        }
    }

    /// Construct a node: assign a key if missing, check reserved slots, seed
    /// from the object cache when the state has a cache key, then adopt the
    /// children held in state
    ///
    /// # Errors
    /// Returns [`SceneError::InvariantViolation`](crate::SceneError) if a
    /// reserved slot holds something other than a node
    pub fn new(
        definition: Arc<NodeDefinition>,
        state: SceneState,
        context: &SceneContext,
    ) -> SceneResult<Self> {
        Self::construct(definition, state, context, true)
    }

    pub(crate) fn construct(
        definition: Arc<NodeDefinition>,
        mut state: SceneState,
        context: &SceneContext,
        use_cache: bool,
    ) -> SceneResult<Self> {
        if state.key().is_empty() {
            state = state.with_key(new_key());
        }
        state.validate()?;

        let state = if use_cache {
            context.cache().get_initial_state(state)
        } else {
            Arc::new(state)
        };
        Ok(Self::assemble(definition, state, context))
    }

    /// Wrap an already validated snapshot and adopt its children
    pub(crate) fn assemble(
        definition: Arc<NodeDefinition>,
        state: Arc<SceneState>,
        context: &SceneContext,
    ) -> Self {
        let tracker = DependencyTracker::new(
            definition.dependency_paths().iter().cloned(),
            definition.explicit_variables().iter().cloned(),
        );
        let node = Self {
            inner: Arc::new(NodeInner {
                key: state.key().to_string(),
                definition,
                context: context.clone(),
                state: RwLock::new(Arc::clone(&state)),
                parent: RwLock::new(Weak::new()),
                bus: EventBus::new(),
                lifecycle: Mutex::new(Lifecycle::default()),
                tracker: Mutex::new(tracker),
            }),
        };

        for child in state.child_nodes() {
            child.set_parent(&node);
        }
        tracing::trace!(key = %node.key(), kind = %node.kind(), "node constructed");
        node
    }

    /// Identity key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Node kind
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        self.inner.definition.kind()
    }

    /// Shared definition
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &Arc<NodeDefinition> {
        &self.inner.definition
    }

    /// Context the node was built in
    #[inline]
    #[must_use]
    pub fn context(&self) -> &SceneContext {
        &self.inner.context
    }

    /// Current frozen snapshot
    #[inline]
    #[must_use]
    pub fn state(&self) -> Arc<SceneState> {
        Arc::clone(&*self.inner.state.read())
    }

    /// Current value of one field
    #[must_use]
    pub fn get(&self, field: &str) -> Option<StateValue> {
        self.inner.state.read().get(field).cloned()
    }

    /// Current text of one field
    #[must_use]
    pub fn get_str(&self, field: &str) -> Option<String> {
        self.inner.state.read().get_str(field).map(str::to_string)
    }

    /// Node held in a field
    #[must_use]
    pub fn get_node(&self, field: &str) -> Option<SceneNode> {
        self.inner.state.read().get_node(field).cloned()
    }

    /// Merge `patch` into a new snapshot and announce it
    ///
    /// The previous snapshot is left untouched. Nodes introduced by the patch
    /// are adopted, slot providers of an active node are swapped, the object
    /// cache is updated, and a
    /// [`StateChangedEvent`] is delivered to local subscribers and bubbled to
    /// every ancestor before this returns.
    ///
    /// # Errors
    /// Returns [`SceneError::InvariantViolation`](crate::SceneError) if the
    /// patch puts a non-node value in a reserved slot
    pub fn set_state(&self, patch: StatePatch) -> SceneResult<()> {
        patch.validate(self.key())?;

        let (previous, next) = {
            let mut guard = self.inner.state.write();
            let previous = Arc::clone(&*guard);
            let next = Arc::new(previous.merged(&patch));
            *guard = Arc::clone(&next);
            (previous, next)
        };

        for child in patch.child_nodes() {
            child.set_parent(self);
        }
        self.swap_active_slots(&previous, &next);
        self.inner.context.cache().set(&next);

        let event = SceneEvent::StateChanged(StateChangedEvent {
            previous,
            next,
            partial: patch,
            source: self.clone(),
        });
        self.publish_event(&event, Propagation::Bubble);
        Ok(())
    }

    /// Observe this node's own state changes
    pub fn subscribe_to_state<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StateChangedEvent) + Send + Sync + 'static,
    {
        let me = Arc::as_ptr(&self.inner) as usize;
        self.inner.bus.subscribe(EventKind::StateChanged, move |event| {
            if let SceneEvent::StateChanged(change) = event {
                if Arc::as_ptr(&change.source.inner) as usize == me {
                    handler(change);
                }
            }
        })
    }

    /// Observe events published here or bubbled up from descendants
    pub fn subscribe_to_event<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&SceneEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(kind, handler)
    }

    /// Publish `event` on this node, bubbling to ancestors if requested
    pub fn publish_event(&self, event: &SceneEvent, propagation: Propagation) {
        self.inner.bus.dispatch(event);
        if propagation == Propagation::Bubble {
            let mut current = self.parent();
            while let Some(ancestor) = current {
                ancestor.inner.bus.dispatch(event);
                current = ancestor.parent();
            }
        }
    }

    /// The node's event bus
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Parent, if attached and still alive
    #[must_use]
    pub fn parent(&self) -> Option<SceneNode> {
        self.inner
            .parent
            .read()
            .upgrade()
            .map(|inner| SceneNode { inner })
    }

    /// Attach to `parent`; the latest parent wins
    pub(crate) fn set_parent(&self, parent: &SceneNode) {
        let mut guard = self.inner.parent.write();
        if let Some(existing) = guard.upgrade() {
            if Arc::ptr_eq(&existing, &parent.inner) {
                return;
            }
            tracing::warn!(
                key = %self.key(),
                previous_parent = %existing.key,
                new_parent = %parent.key(),
                "node already has a parent, re-parenting"
            );
        }
        *guard = Arc::downgrade(&parent.inner);
    }

    /// Whether both handles point at the same node
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &SceneNode) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Non-owning handle
    #[inline]
    #[must_use]
    pub fn downgrade(&self) -> WeakSceneNode {
        WeakSceneNode {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for SceneNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SceneNode {}

impl Hash for SceneNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneNode")
            .field("kind", self.kind())
            .field("key", &self.key())
            .finish_non_exhaustive()
    }
}

/// Builder for nodes with their own definition
#[derive(Debug)]
pub struct NodeBuilder {
    definition: NodeDefinition,
    state: SceneState,
}

impl NodeBuilder {
    /// With identity key
    #[inline]
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.state = self.state.with_key(key);
        self
    }

    /// With cache key
    #[inline]
    #[must_use]
    pub fn cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.state = self.state.with_cache_key(cache_key);
        self
    }

    /// With a state field
    #[inline]
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.state = self.state.with(name, value);
        self
    }

    /// With state fields scanned for variable references
    #[must_use]
    pub fn dependency_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition = self.definition.with_dependency_paths(paths);
        self
    }

    /// With URL sync behaviour
    #[must_use]
    pub fn url_sync(mut self, handler: impl UrlSyncHandler + 'static) -> Self {
        self.definition = self.definition.with_url_sync(handler);
        self
    }

    /// With an activation handler
    #[must_use]
    pub fn on_activate<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SceneNode) -> Option<DeactivationHandler> + Send + Sync + 'static,
    {
        self.definition = self.definition.with_activation_handler(handler);
        self
    }

    /// With a callback for referenced variable changes
    #[must_use]
    pub fn on_variable_changed<F>(mut self, handler: F) -> Self
    where
        F: Fn(&SceneNode, &SceneNode) + Send + Sync + 'static,
    {
        self.definition = self.definition.with_variable_changed_handler(handler);
        self
    }

    /// Build the node in `context`
    ///
    /// # Errors
    /// As [`SceneNode::new`]
    pub fn build(self, context: &SceneContext) -> SceneResult<SceneNode> {
        SceneNode::new(Arc::new(self.definition), self.state, context)
    }
}
