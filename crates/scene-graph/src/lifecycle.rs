//! Activation lifecycle
//!
//! Activation is idempotent and symmetric. `activate` activates the reserved
//! slot children that are not active yet (time range, variables, data,
//! editor), then runs activation handlers. `deactivate` undoes exactly that:
//! deactivation handlers run, the slot children this activation turned on
//! are turned off, subscriptions added while active are closed and tracked
//! futures are aborted.

use crate::event::Subscription;
use crate::node::{ActivationHandler, DeactivationHandler, SceneNode, WeakSceneNode};
use crate::state::{SceneState, RESERVED_SLOTS};
use futures::future::{AbortHandle, Abortable};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct Lifecycle {
    active: bool,
    generation: u64,
    ref_count: usize,
    activated_slots: Vec<SceneNode>,
    deactivation_handlers: Vec<DeactivationHandler>,
    runtime_handlers: Vec<ActivationHandler>,
    subscriptions: Vec<Subscription>,
    abort_handles: Vec<AbortHandle>,
}

struct Teardown {
    handlers: Vec<DeactivationHandler>,
    slots: Vec<SceneNode>,
    subscriptions: Vec<Subscription>,
    abort_handles: Vec<AbortHandle>,
}

impl SceneNode {
    /// Whether the node is active
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.lifecycle.lock().active
    }

    /// Activate the node; no-op if already active
    pub fn activate(&self) {
        let runtime_handlers = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.active {
                return;
            }
            lifecycle.active = true;
            lifecycle.generation += 1;
            lifecycle.runtime_handlers.clone()
        };

        let state = self.state();
        let mut activated = Vec::new();
        for slot in RESERVED_SLOTS {
            if let Some(child) = state.get_node(slot) {
                if !child.is_active() {
                    child.activate();
                    activated.push(child.clone());
                }
            }
        }
        self.inner.lifecycle.lock().activated_slots = activated;

        let mut deactivation_handlers = Vec::new();
        for handler in self
            .definition()
            .activation_handlers()
            .iter()
            .chain(runtime_handlers.iter())
        {
            if let Some(on_deactivate) = handler(self) {
                deactivation_handlers.push(on_deactivate);
            }
        }

        self.inner
            .lifecycle
            .lock()
            .deactivation_handlers
            .extend(deactivation_handlers);
        tracing::debug!(key = %self.key(), kind = %self.kind(), "activated");
    }

    /// Deactivate the node; no-op if not active
    pub fn deactivate(&self) {
        let teardown = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if !lifecycle.active {
                return;
            }
            lifecycle.active = false;
            Teardown {
                handlers: std::mem::take(&mut lifecycle.deactivation_handlers),
                slots: std::mem::take(&mut lifecycle.activated_slots),
                subscriptions: std::mem::take(&mut lifecycle.subscriptions),
                abort_handles: std::mem::take(&mut lifecycle.abort_handles),
            }
        };

        for handler in teardown.handlers {
            handler();
        }
        for slot in &teardown.slots {
            slot.deactivate();
        }
        for mut subscription in teardown.subscriptions {
            subscription.unsubscribe();
        }
        for handle in teardown.abort_handles {
            handle.abort();
        }

        self.context().cache().set(&self.state());
        tracing::debug!(key = %self.key(), kind = %self.kind(), "deactivated");
    }

    /// Keep slot providers of an active node in step with a state change
    ///
    /// A replaced or removed provider is deactivated if this activation
    /// turned it on; an inactive replacement is activated and recorded.
    pub(crate) fn swap_active_slots(&self, previous: &SceneState, next: &SceneState) {
        if !self.is_active() {
            return;
        }
        for slot in RESERVED_SLOTS {
            let old = previous.get_node(slot);
            let new = next.get_node(slot);
            let unchanged = match (old, new) {
                (Some(old), Some(new)) => old.ptr_eq(new),
                (None, None) => true,
                _ => false,
            };
            if unchanged {
                continue;
            }

            if let Some(old) = old {
                let owned = {
                    let mut lifecycle = self.inner.lifecycle.lock();
                    let position = lifecycle.activated_slots.iter().position(|n| n.ptr_eq(old));
                    position.map(|index| lifecycle.activated_slots.remove(index))
                };
                if let Some(old) = owned {
                    old.deactivate();
                }
            }
            if let Some(new) = new {
                if !new.is_active() {
                    new.activate();
                    self.inner.lifecycle.lock().activated_slots.push(new.clone());
                }
            }
            tracing::debug!(key = %self.key(), slot, "slot provider replaced while active");
        }
    }

    /// Add a handler run on every future activation
    ///
    /// The handler may return a deactivation handler. It is not run now if
    /// the node is already active, and clones do not inherit it.
    pub fn add_activation_handler<F>(&self, handler: F)
    where
        F: Fn(&SceneNode) -> Option<DeactivationHandler> + Send + Sync + 'static,
    {
        self.inner
            .lifecycle
            .lock()
            .runtime_handlers
            .push(Arc::new(handler));
    }

    /// Keep `subscription` open until the next deactivation
    pub fn add_subscription(&self, subscription: Subscription) {
        self.inner.lifecycle.lock().subscriptions.push(subscription);
    }

    /// Hold the node active; it deactivates when the last reference drops
    #[must_use = "dropping the ActivationRef releases it"]
    pub fn activation_ref(&self) -> ActivationRef {
        let first = {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.ref_count += 1;
            lifecycle.ref_count == 1
        };
        if first {
            self.activate();
        }
        ActivationRef { node: self.clone() }
    }

    /// Token identifying the current activation
    #[must_use]
    pub fn activation_token(&self) -> ActivationToken {
        ActivationToken {
            node: self.downgrade(),
            generation: self.inner.lifecycle.lock().generation,
        }
    }

    /// Wrap `future` so it is cancelled when the node deactivates
    ///
    /// Resolves to `None` once cancelled. A future tracked while the node is
    /// inactive is cancelled immediately.
    pub fn track_future<F>(&self, future: F) -> impl Future<Output = Option<F::Output>>
    where
        F: Future,
    {
        let (handle, registration) = AbortHandle::new_pair();
        {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.active {
                lifecycle.abort_handles.retain(|h| !h.is_aborted());
                lifecycle.abort_handles.push(handle);
            } else {
                handle.abort();
            }
        }
        Abortable::new(future, registration).map(Result::ok)
    }
}

/// Counted activation held by a mounted consumer
pub struct ActivationRef {
    node: SceneNode,
}

impl ActivationRef {
    /// The held node
    #[inline]
    #[must_use]
    pub fn node(&self) -> &SceneNode {
        &self.node
    }
}

impl Drop for ActivationRef {
    fn drop(&mut self) {
        let last = {
            let mut lifecycle = self.node.inner.lifecycle.lock();
            lifecycle.ref_count = lifecycle.ref_count.saturating_sub(1);
            lifecycle.ref_count == 0
        };
        if last {
            self.node.deactivate();
        }
    }
}

impl fmt::Debug for ActivationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivationRef").field("node", &self.node).finish()
    }
}

/// Identifies one activation of a node
///
/// Work started during an activation can check [`ActivationToken::is_current`]
/// before applying its result.
#[derive(Debug, Clone)]
pub struct ActivationToken {
    node: WeakSceneNode,
    generation: u64,
}

impl ActivationToken {
    /// Whether the node is alive, active, and still in the same activation
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.node.upgrade().is_some_and(|node| {
            let lifecycle = node.inner.lifecycle.lock();
            lifecycle.active && lifecycle.generation == self.generation
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SceneContext;
    use crate::node::NodeKind;
    use crate::state::{StatePatch, DATA_SLOT, TIME_RANGE_SLOT};
    use parking_lot::Mutex;

    fn leaf(ctx: &SceneContext, kind: NodeKind) -> SceneNode {
        SceneNode::builder(kind).build(ctx).unwrap()
    }

    #[test]
    fn activation_is_idempotent() {
        let ctx = SceneContext::new();
        let calls = Arc::new(Mutex::new(0));
        let c = calls.clone();
        let node = SceneNode::builder(NodeKind::Scene)
            .on_activate(move |_| {
                *c.lock() += 1;
                None
            })
            .build(&ctx)
            .unwrap();

        node.activate();
        node.activate();
        assert!(node.is_active());
        assert_eq!(*calls.lock(), 1);

        node.deactivate();
        node.deactivate();
        assert!(!node.is_active());
    }

    #[test]
    fn deactivation_only_touches_slots_it_activated() {
        let ctx = SceneContext::new();
        let time_range = leaf(&ctx, NodeKind::TimeRange);
        let data = leaf(&ctx, NodeKind::Data);
        let node = SceneNode::builder(NodeKind::Scene)
            .field(TIME_RANGE_SLOT, &time_range)
            .field(DATA_SLOT, &data)
            .build(&ctx)
            .unwrap();

        data.activate();
        node.activate();
        assert!(time_range.is_active());

        node.deactivate();
        assert!(!time_range.is_active());
        assert!(data.is_active());
    }

    #[test]
    fn deactivation_handlers_run_in_order() {
        let ctx = SceneContext::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l1 = log.clone();
        let l2 = log.clone();
        let node = SceneNode::builder(NodeKind::Scene)
            .on_activate(move |_| {
                let l = l1.clone();
                Some(Box::new(move || l.lock().push("first")))
            })
            .on_activate(move |_| {
                let l = l2.clone();
                Some(Box::new(move || l.lock().push("second")))
            })
            .build(&ctx)
            .unwrap();

        node.activate();
        assert!(log.lock().is_empty());
        node.deactivate();
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn reactivation_reestablishes_subscriptions() {
        let ctx = SceneContext::new();
        let count = Arc::new(Mutex::new(0));
        let c = count.clone();
        let node = SceneNode::builder(NodeKind::Scene).build(&ctx).unwrap();
        node.add_activation_handler(move |node| {
            let c = c.clone();
            node.add_subscription(node.subscribe_to_state(move |_| *c.lock() += 1));
            None
        });

        node.activate();
        node.set_state(StatePatch::new().set("a", 1.0)).unwrap();
        node.deactivate();
        node.set_state(StatePatch::new().set("a", 2.0)).unwrap();
        assert_eq!(*count.lock(), 1);

        node.activate();
        node.set_state(StatePatch::new().set("a", 3.0)).unwrap();
        assert_eq!(*count.lock(), 2);
        assert!(node.is_active());
    }

    #[test]
    fn activation_refs_are_counted() {
        let ctx = SceneContext::new();
        let node = leaf(&ctx, NodeKind::Scene);
        let first = node.activation_ref();
        let second = node.activation_ref();
        assert!(node.is_active());
        drop(first);
        assert!(node.is_active());
        drop(second);
        assert!(!node.is_active());
    }

    #[test]
    fn tokens_expire_on_deactivation() {
        let ctx = SceneContext::new();
        let node = leaf(&ctx, NodeKind::Scene);
        node.activate();
        let token = node.activation_token();
        assert!(token.is_current());
        node.deactivate();
        node.activate();
        assert!(!token.is_current());
        assert!(node.activation_token().is_current());
    }
}
