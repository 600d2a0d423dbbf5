//! Scene context
//!
//! A [`SceneContext`] carries what every node of one scene tree shares: the
//! configuration, the object cache, the format registry, and the fallback
//! providers used when no ancestor defines a time range, data or variables.
//!
//! Tests and embedders create their own contexts. [`SceneContext::global`] is
//! a process-wide default for callers that do not care.

use crate::cache::ObjectCache;
use crate::config::SceneConfig;
use crate::node::SceneNode;
use crate::objects::{data_definition, time_range_definition, time_range_state};
use crate::state::SceneState;
use crate::variables::set::{variable_set_definition, VARIABLES_FIELD};
use crate::value::StateValue;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use scene_template::FormatRegistry;
use std::fmt;
use std::sync::Arc;

static GLOBAL: Lazy<RwLock<SceneContext>> = Lazy::new(|| RwLock::new(SceneContext::new()));

struct Fallbacks {
    time_range: SceneNode,
    data: SceneNode,
    variables: SceneNode,
}

struct ContextInner {
    config: SceneConfig,
    cache: ObjectCache,
    formats: FormatRegistry,
    fallbacks: OnceCell<Fallbacks>,
}

/// Shared services of a scene tree
#[derive(Clone)]
pub struct SceneContext {
    inner: Arc<ContextInner>,
}

impl SceneContext {
    /// Context with default configuration and built-in formats
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Context with `config` and built-in formats
    #[must_use]
    pub fn with_config(config: SceneConfig) -> Self {
        Self::with_formats(config, FormatRegistry::with_defaults())
    }

    /// Context with `config` and a custom format registry
    #[must_use]
    pub fn with_formats(config: SceneConfig, formats: FormatRegistry) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cache: ObjectCache::new(config.cache_capacity),
                config,
                formats,
                fallbacks: OnceCell::new(),
            }),
        }
    }

    /// The process-wide default context
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.read().clone()
    }

    /// Replace the process-wide default with a fresh context
    ///
    /// Nodes already built keep the context they were built with.
    pub fn reset_global() {
        *GLOBAL.write() = Self::new();
    }

    /// Install `context` as the process-wide default
    pub fn set_global(context: SceneContext) {
        *GLOBAL.write() = context;
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.inner.config
    }

    /// Object cache
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &ObjectCache {
        &self.inner.cache
    }

    /// Format registry
    #[inline]
    #[must_use]
    pub fn formats(&self) -> &FormatRegistry {
        &self.inner.formats
    }

    /// Whether both handles share the same context
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &SceneContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Time range used when no ancestor provides one
    #[must_use]
    pub fn fallback_time_range(&self) -> SceneNode {
        self.fallbacks().time_range.clone()
    }

    /// Data provider used when no ancestor provides one
    #[must_use]
    pub fn fallback_data(&self) -> SceneNode {
        self.fallbacks().data.clone()
    }

    /// Empty variable set used when no ancestor provides one
    #[must_use]
    pub fn fallback_variables(&self) -> SceneNode {
        self.fallbacks().variables.clone()
    }

    fn fallbacks(&self) -> &Fallbacks {
        self.inner.fallbacks.get_or_init(|| {
            // Fallback nodes live in a detached context so they do not keep
            // this one alive.
            let detached = Self::with_formats(self.config().clone(), self.formats().clone());
            let range = &self.config().default_time_range;
            Fallbacks {
                time_range: SceneNode::assemble(
                    time_range_definition(),
                    Arc::new(time_range_state(range.from.clone(), range.to.clone()).with_key("fallback-time-range")),
                    &detached,
                ),
                data: SceneNode::assemble(
                    data_definition(),
                    Arc::new(SceneState::new().with_key("fallback-data")),
                    &detached,
                ),
                variables: SceneNode::assemble(
                    variable_set_definition(),
                    Arc::new(
                        SceneState::new()
                            .with_key("fallback-variables")
                            .with(VARIABLES_FIELD, StateValue::list(Vec::<StateValue>::new())),
                    ),
                    &detached,
                ),
            }
        })
    }
}

impl Default for SceneContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneContext")
            .field("config", &self.inner.config)
            .field("cache", &self.inner.cache)
            .finish_non_exhaustive()
    }
}
