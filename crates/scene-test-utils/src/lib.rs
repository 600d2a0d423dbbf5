//! Testing utilities for the scenes workspace
//!
//! Shared fixtures, tracing setup and a small dashboard tree.

#![allow(missing_docs)]

use parking_lot::Mutex;
use scene_graph::objects::{layout, time_range};
use scene_graph::variables::{custom, text_box, variable_set};
use scene_graph::{NodeKind, SceneContext, SceneNode, StateValue, TIME_RANGE_SLOT, VARIABLES_SLOT};
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    });
}

/// Fresh, isolated context
pub fn test_context() -> SceneContext {
    init_tracing();
    SceneContext::new()
}

/// Keys of nodes notified about variable changes, in order
pub type ChangeLog = Arc<Mutex<Vec<String>>>;

/// Panel whose `title` is scanned for variables
pub fn panel(ctx: &SceneContext, key: &str, title: &str) -> SceneNode {
    SceneNode::builder(NodeKind::Custom("panel".into()))
        .key(key)
        .field("title", title)
        .dependency_paths(["title"])
        .build(ctx)
        .unwrap()
}

/// Panel that records each variable change notification in `log`
pub fn recording_panel(ctx: &SceneContext, key: &str, title: &str, log: &ChangeLog) -> SceneNode {
    let log = Arc::clone(log);
    SceneNode::builder(NodeKind::Custom("panel".into()))
        .key(key)
        .field("title", title)
        .dependency_paths(["title"])
        .on_variable_changed(move |node, _variable| log.lock().push(node.key().to_string()))
        .build(ctx)
        .unwrap()
}

/// A small dashboard: time range, two variables and two panels in a layout
pub struct Dashboard {
    pub root: SceneNode,
    pub time_range: SceneNode,
    pub variables: SceneNode,
    pub layout: SceneNode,
    pub panels: Vec<SceneNode>,
    pub log: ChangeLog,
}

/// Build [`Dashboard`] with `env` (custom: dev, prod) and `host` (text box)
pub fn dashboard(ctx: &SceneContext) -> Dashboard {
    let log = ChangeLog::default();
    let panels = vec![
        recording_panel(ctx, "cpu", "CPU ${env}", &log),
        recording_panel(ctx, "mem", "Memory on $host", &log),
    ];
    let grid = layout(panels.clone(), ctx).unwrap();
    let range = time_range("now-1h", "now", ctx).unwrap();
    let vars = variable_set(
        vec![
            custom("env", "dev, prod", ctx).unwrap(),
            text_box("host", "web-1", ctx).unwrap(),
        ],
        ctx,
    )
    .unwrap();
    let root = SceneNode::builder(NodeKind::Scene)
        .key("dashboard")
        .field(TIME_RANGE_SLOT, &range)
        .field(VARIABLES_SLOT, &vars)
        .field("body", StateValue::from(&grid))
        .build(ctx)
        .unwrap();

    Dashboard {
        root,
        time_range: range,
        variables: vars,
        layout: grid,
        panels,
        log,
    }
}
