//! Interpolation against nested variable scopes

use pretty_assertions::assert_eq;
use scene_graph::interpolate;
use scene_graph::prelude::*;
use scene_graph::variables::{text_box, variable_set, ScopedVars, VariableBuilder, VariableType};
use scene_graph::{VariableValue, VARIABLES_SLOT};
use scene_test_utils::{panel, test_context};
use serde_json::json;

fn scoped_tree(ctx: &SceneContext) -> (SceneNode, SceneNode, SceneNode) {
    let outer = panel(ctx, "outer", "${test}");
    let inner = panel(ctx, "inner", "${test}");
    let row = SceneNode::builder(NodeKind::Custom("row".into()))
        .field(
            VARIABLES_SLOT,
            variable_set(vec![text_box("test", "nestedValue", ctx).unwrap()], ctx).unwrap(),
        )
        .field("body", &inner)
        .build(ctx)
        .unwrap();
    let root = SceneNode::builder(NodeKind::Scene)
        .field(
            VARIABLES_SLOT,
            variable_set(vec![text_box("test", "hello", ctx).unwrap()], ctx).unwrap(),
        )
        .field("children", StateValue::list([&outer, &row]))
        .build(ctx)
        .unwrap();
    (root, outer, inner)
}

#[test]
fn nearest_scope_wins() {
    let ctx = test_context();
    let (root, outer, inner) = scoped_tree(&ctx);
    assert_eq!(root.interpolate("${test}"), "hello");
    assert_eq!(outer.interpolate("${test}"), "hello");
    assert_eq!(inner.interpolate("${test}"), "nestedValue");
}

#[test]
fn multi_value_formats() {
    let ctx = test_context();
    let v = VariableBuilder::new(VariableType::Custom, "v")
        .value(StateValue::list(["hello", "world"]))
        .text(StateValue::list(["hello", "world"]))
        .build(&ctx)
        .unwrap();
    let node = panel(&ctx, "p", "");
    let _root = SceneNode::builder(NodeKind::Scene)
        .field(VARIABLES_SLOT, variable_set(vec![v], &ctx).unwrap())
        .field("body", &node)
        .build(&ctx)
        .unwrap();

    assert_eq!(node.interpolate("test.${v}.asd"), "test.{hello,world}.asd");
    assert_eq!(node.interpolate("${v:text}"), "hello + world");
    assert_eq!(node.interpolate("${v:csv}"), "hello,world");
    assert_eq!(
        interpolate(&node, "$v", None, Some("pipe")),
        "hello|world"
    );
}

#[test]
fn unresolved_tokens_are_left_alone() {
    let ctx = test_context();
    let (root, _, _) = scoped_tree(&ctx);
    assert_eq!(root.interpolate("${missing} and $test"), "${missing} and hello");
    assert_eq!(root.interpolate("plain text"), "plain text");
}

#[test]
fn scoped_vars_take_precedence_and_support_paths() {
    let ctx = test_context();
    let (_, _, inner) = scoped_tree(&ctx);
    let scoped = ScopedVars::new()
        .with("test", "scoped")
        .with("row", VariableValue::Object(json!({"series": {"name": "cpu"}})));

    assert_eq!(interpolate(&inner, "${test}", Some(&scoped), None), "scoped");
    assert_eq!(interpolate(&inner, "${row.series.name}", Some(&scoped), None), "cpu");
}

#[test]
fn configured_default_format_applies() {
    let ctx = SceneContext::with_config(SceneConfig::new().with_default_format("csv"));
    let v = VariableBuilder::new(VariableType::Custom, "v")
        .value(StateValue::list(["a", "b"]))
        .build(&ctx)
        .unwrap();
    let set = variable_set(vec![v], &ctx).unwrap();
    let root = SceneNode::builder(NodeKind::Scene)
        .field(VARIABLES_SLOT, &set)
        .build(&ctx)
        .unwrap();
    assert_eq!(root.interpolate("${v}"), "a,b");
    assert_eq!(root.interpolate("${v:glob}"), "{a,b}");
}
