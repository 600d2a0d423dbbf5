//! Activation lifecycle across a dashboard tree

use parking_lot::Mutex;
use scene_graph::prelude::*;
use scene_graph::objects::time_range;
use scene_graph::variables::{Variable, VALUE_FIELD};
use scene_graph::{DATA_SLOT, TIME_RANGE_SLOT};
use scene_test_utils::{dashboard, test_context};
use std::sync::Arc;

#[test]
fn activating_root_activates_slot_providers() {
    let ctx = test_context();
    let dash = dashboard(&ctx);

    dash.root.activate();
    assert!(dash.time_range.is_active());
    assert!(dash.variables.is_active());
    assert!(!dash.layout.is_active());

    dash.root.deactivate();
    assert!(!dash.time_range.is_active());
    assert!(!dash.variables.is_active());
}

#[test]
fn reactivation_restores_subscriptions() {
    let ctx = test_context();
    let dash = dashboard(&ctx);
    let host = Variable::from_node(
        scene_graph::variables::get_by_name(&dash.variables, "host").unwrap(),
    )
    .unwrap();

    dash.root.activate();
    dash.root.deactivate();
    host.set_value("web-2", "web-2").unwrap();
    assert!(dash.log.lock().is_empty());

    dash.root.activate();
    host.set_value("web-3", "web-3").unwrap();
    assert_eq!(*dash.log.lock(), vec!["mem".to_string()]);
}

#[test]
fn subscriptions_added_while_active_close_on_deactivate() {
    let ctx = test_context();
    let dash = dashboard(&ctx);
    let seen = Arc::new(Mutex::new(0));

    dash.root.activate();
    let s = seen.clone();
    dash.root.add_subscription(
        dash.root
            .subscribe_to_event(EventKind::StateChanged, move |_| *s.lock() += 1),
    );
    dash.panels[0]
        .set_state(StatePatch::new().set("title", "CPU"))
        .unwrap();
    assert_eq!(*seen.lock(), 1);

    dash.root.deactivate();
    dash.panels[0]
        .set_state(StatePatch::new().set("title", "CPU again"))
        .unwrap();
    assert_eq!(*seen.lock(), 1);
}

#[test]
fn activation_refs_are_counted() {
    let ctx = test_context();
    let dash = dashboard(&ctx);

    let first = dash.root.activation_ref();
    let second = dash.root.activation_ref();
    drop(first);
    assert!(dash.root.is_active());
    drop(second);
    assert!(!dash.root.is_active());
}

#[test]
fn activation_token_expires() {
    let ctx = test_context();
    let dash = dashboard(&ctx);
    dash.root.activate();
    let token = dash.root.activation_token();
    assert!(token.is_current());

    dash.root.deactivate();
    dash.root.activate();
    assert!(!token.is_current());
}

#[test]
fn custom_variable_selects_first_option_when_activated() {
    let ctx = test_context();
    let dash = dashboard(&ctx);
    dash.root.activate();

    let env = scene_graph::variables::get_by_name(&dash.variables, "env").unwrap();
    assert_eq!(env.get_str(VALUE_FIELD).as_deref(), Some("dev"));
}

#[test]
fn swapping_time_range_while_active_moves_activation() {
    let ctx = test_context();
    let old = time_range("now-1h", "now", &ctx).unwrap();
    let root = SceneNode::builder(NodeKind::Layout)
        .field(TIME_RANGE_SLOT, &old)
        .build(&ctx)
        .unwrap();
    root.activate();
    assert!(old.is_active());

    let new = time_range("now-6h", "now", &ctx).unwrap();
    root.set_state(StatePatch::new().set(TIME_RANGE_SLOT, &new)).unwrap();
    assert!(new.is_active());
    assert!(!old.is_active());

    root.deactivate();
    assert!(!new.is_active());
}

#[test]
fn replaced_data_provider_runs_its_activation_handlers() {
    let ctx = test_context();
    let loads = Arc::new(Mutex::new(Vec::new()));
    let data = |name: &'static str| {
        let l = loads.clone();
        SceneNode::builder(NodeKind::Data)
            .on_activate(move |_| {
                l.lock().push(name);
                None
            })
            .build(&ctx)
            .unwrap()
    };

    let panel = SceneNode::builder(NodeKind::Custom("panel".into()))
        .field(DATA_SLOT, &data("first"))
        .build(&ctx)
        .unwrap();
    panel.activate();
    panel.set_state(StatePatch::new().set(DATA_SLOT, &data("second"))).unwrap();
    assert_eq!(*loads.lock(), vec!["first", "second"]);
}

#[test]
fn provider_active_before_swap_stays_active() {
    let ctx = test_context();
    let shared = time_range("now-1h", "now", &ctx).unwrap();
    shared.activate();
    let root = SceneNode::builder(NodeKind::Scene)
        .field(TIME_RANGE_SLOT, &shared)
        .build(&ctx)
        .unwrap();
    root.activate();

    let replacement = time_range("now-2h", "now", &ctx).unwrap();
    root.set_state(StatePatch::new().set(TIME_RANGE_SLOT, &replacement)).unwrap();
    assert!(shared.is_active());
    assert!(replacement.is_active());
}

#[test]
fn swapping_slot_while_inactive_activates_nothing() {
    let ctx = test_context();
    let root = SceneNode::builder(NodeKind::Scene).build(&ctx).unwrap();
    let range = time_range("now-1h", "now", &ctx).unwrap();
    root.set_state(StatePatch::new().set(TIME_RANGE_SLOT, &range)).unwrap();
    assert!(!range.is_active());

    root.activate();
    assert!(range.is_active());
}
