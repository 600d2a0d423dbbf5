//! Standard providers: time range, data, layout, editor

use crate::context::SceneContext;
use crate::error::SceneResult;
use crate::node::{NodeDefinition, NodeKind, SceneNode};
use crate::state::SceneState;
use crate::url::FieldUrlSync;
use crate::value::StateValue;
use once_cell::sync::Lazy;
use std::sync::Arc;

/// `from` field of a time range
pub const FROM_FIELD: &str = "from";
/// `to` field of a time range
pub const TO_FIELD: &str = "to";
/// Payload field of a data provider
pub const DATA_FIELD: &str = "data";
/// Children field of a layout
pub const CHILDREN_FIELD: &str = "children";

static TIME_RANGE: Lazy<Arc<NodeDefinition>> = Lazy::new(|| {
    Arc::new(
        NodeDefinition::new(NodeKind::TimeRange)
            .with_url_sync(FieldUrlSync::new([("from", FROM_FIELD), ("to", TO_FIELD)])),
    )
});

static DATA: Lazy<Arc<NodeDefinition>> = Lazy::new(|| Arc::new(NodeDefinition::new(NodeKind::Data)));

static LAYOUT: Lazy<Arc<NodeDefinition>> =
    Lazy::new(|| Arc::new(NodeDefinition::new(NodeKind::Layout)));

static EDITOR: Lazy<Arc<NodeDefinition>> =
    Lazy::new(|| Arc::new(NodeDefinition::new(NodeKind::Editor)));

/// Shared definition of time range nodes
#[must_use]
pub fn time_range_definition() -> Arc<NodeDefinition> {
    Arc::clone(&TIME_RANGE)
}

/// Time range provider; syncs `from`/`to` with the URL
///
/// # Errors
/// Never fails for these fields; returns `SceneResult` for uniformity with
/// other constructors
pub fn time_range(
    from: impl Into<String>,
    to: impl Into<String>,
    context: &SceneContext,
) -> SceneResult<SceneNode> {
    SceneNode::new(
        time_range_definition(),
        time_range_state(from, to),
        context,
    )
}

pub(crate) fn time_range_state(from: impl Into<String>, to: impl Into<String>) -> SceneState {
    SceneState::new()
        .with(FROM_FIELD, from.into())
        .with(TO_FIELD, to.into())
}

/// `(from, to)` of a time range node
#[must_use]
pub fn time_range_bounds(node: &SceneNode) -> (String, String) {
    let state = node.state();
    (
        state.get_str(FROM_FIELD).unwrap_or_default().to_string(),
        state.get_str(TO_FIELD).unwrap_or_default().to_string(),
    )
}

/// Shared definition of data provider nodes
#[must_use]
pub fn data_definition() -> Arc<NodeDefinition> {
    Arc::clone(&DATA)
}

/// Data provider holding `data`
///
/// # Errors
/// Never fails for this field
pub fn data_provider(data: impl Into<StateValue>, context: &SceneContext) -> SceneResult<SceneNode> {
    SceneNode::new(
        data_definition(),
        SceneState::new().with(DATA_FIELD, data),
        context,
    )
}

/// Shared definition of layout nodes
#[must_use]
pub fn layout_definition() -> Arc<NodeDefinition> {
    Arc::clone(&LAYOUT)
}

/// Layout with `children`
///
/// # Errors
/// Never fails for this field
pub fn layout(children: Vec<SceneNode>, context: &SceneContext) -> SceneResult<SceneNode> {
    SceneNode::new(
        layout_definition(),
        SceneState::new().with(CHILDREN_FIELD, StateValue::list(children)),
        context,
    )
}

/// Shared definition of editor nodes
#[must_use]
pub fn editor_definition() -> Arc<NodeDefinition> {
    Arc::clone(&EDITOR)
}

/// Editor node
///
/// # Errors
/// Never fails
pub fn editor(context: &SceneContext) -> SceneResult<SceneNode> {
    SceneNode::new(editor_definition(), SceneState::new(), context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_has_url_keys() {
        let ctx = SceneContext::new();
        let node = time_range("now-1h", "now", &ctx).unwrap();
        assert_eq!(node.url_keys(), vec!["from", "to"]);
        assert_eq!(time_range_bounds(&node), ("now-1h".to_string(), "now".to_string()));
    }

    #[test]
    fn layout_adopts_children() {
        let ctx = SceneContext::new();
        let child = editor(&ctx).unwrap();
        let parent = layout(vec![child.clone()], &ctx).unwrap();
        assert_eq!(child.parent(), Some(parent));
    }
}
