//! Scene Graph - reactive object graph for dashboards
//!
//! A scene is a tree of stateful nodes. Each node holds a frozen state
//! snapshot; every change produces a new snapshot and a change event that
//! bubbles to the root. Ancestor-scoped services (time range, data,
//! variables, layout, editor) are found by walking up from any node.
//!
//! # Core Concepts
//!
//! - [`SceneNode`]: handle to a node; identity key, state, parent link, bus
//! - [`SceneState`] / [`StatePatch`]: immutable snapshot and partial update
//! - [`EventBus`]: typed, synchronous event delivery with RAII subscriptions
//! - Activation: `activate`/`deactivate` wire and unwire subscriptions
//! - [`traversal`]: nearest-provider lookups with soft fallbacks
//! - [`ObjectCache`]: state persisted across node recreation by cache key
//! - Variables: [`variables`] sets, dependency tracking and interpolation
//! - [`SceneDocument`]: JSON/TOML description of a tree
//!
//! # Example
//!
//! ```rust
//! use scene_graph::prelude::*;
//! use scene_graph::variables::{text_box, variable_set};
//! use scene_graph::VARIABLES_SLOT;
//!
//! # fn main() -> Result<(), SceneError> {
//! let ctx = SceneContext::new();
//! let panel = SceneNode::builder(NodeKind::Custom("panel".into()))
//!     .field("title", "Errors in ${env}")
//!     .dependency_paths(["title"])
//!     .build(&ctx)?;
//! let _root = SceneNode::builder(NodeKind::Scene)
//!     .field(VARIABLES_SLOT, variable_set(vec![text_box("env", "prod", &ctx)?], &ctx)?)
//!     .field("body", &panel)
//!     .build(&ctx)?;
//!
//! assert_eq!(panel.interpolate("Errors in ${env}"), "Errors in prod");
//! assert!(panel.depends_on_variable("env"));
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod cache;
pub mod clone;
pub mod config;
pub mod context;
pub mod dependency;
pub mod document;
pub mod error;
pub mod event;
pub mod interpolate;
pub mod lifecycle;
pub mod node;
pub mod objects;
pub mod state;
pub mod traversal;
pub mod url;
pub mod value;
pub mod variables;

// Re-exports for convenience
pub use cache::ObjectCache;
pub use config::{SceneConfig, TimeRangeConfig};
pub use context::SceneContext;
pub use dependency::DependencyTracker;
pub use document::{NodeDocument, SceneDocument, TimeRangeDocument, VariableDocument};
pub use error::{ConfigError, DocumentError, SceneError, SceneResult, StructuralError};
pub use event::{CustomEvent, EventBus, EventKind, Propagation, SceneEvent, StateChangedEvent, Subscription};
pub use interpolate::{interpolate, interpolate_with_report};
pub use lifecycle::{ActivationRef, ActivationToken};
pub use node::{
    ActivationHandler, DeactivationHandler, NodeBuilder, NodeDefinition, NodeKind, SceneNode,
    VariableChangedHandler, WeakSceneNode,
};
pub use state::{
    is_reserved_slot, SceneState, StatePatch, DATA_SLOT, EDITOR_SLOT, RESERVED_SLOTS, TIME_RANGE_SLOT,
    VARIABLES_SLOT,
};
pub use url::{to_url_value, FieldUrlSync, UrlState, UrlSyncHandler, UrlValue};
pub use value::{ObjectMap, OpaqueValue, StateValue};
pub use variables::{ScopedVars, Variable, VariableType};

pub use scene_template::{FormatRegistry, VariableValue};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for building scenes
    pub use crate::{
        EventKind, NodeKind, SceneConfig, SceneContext, SceneError, SceneEvent, SceneNode, SceneResult,
        SceneState, StatePatch, StateValue, Subscription,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
