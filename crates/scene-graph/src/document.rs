//! Scene documents
//!
//! A [`SceneDocument`] is a serde description of a scene tree, readable from
//! JSON or TOML. Building it yields live nodes; exporting a tree yields a
//! document again. Behaviour (handlers, URL sync of custom nodes) is not part
//! of a document: built-in kinds get their standard definitions and
//! application kinds get a plain definition with the listed dependency paths.
//!
//! ```json
//! {
//!   "title": "Service overview",
//!   "root": {
//!     "kind": "scene",
//!     "timeRange": { "from": "now-1h", "to": "now" },
//!     "variables": [{ "name": "env", "type": "custom", "query": "dev, prod" }],
//!     "children": [
//!       { "kind": "panel", "dependencyPaths": ["title"], "state": { "title": "CPU ${env}" } }
//!     ]
//!   }
//! }
//! ```

use crate::context::SceneContext;
use crate::error::{DocumentError, SceneResult};
use crate::node::{NodeDefinition, NodeKind, SceneNode};
use crate::objects::{
    data_definition, editor_definition, layout_definition, time_range, time_range_bounds,
    time_range_definition, CHILDREN_FIELD,
};
use crate::state::{SceneState, TIME_RANGE_SLOT, VARIABLES_SLOT};
use crate::value::StateValue;
use crate::variables::set::{variable_set, variables};
use crate::variables::variable::{
    VariableBuilder, VariableType, MULTI_FIELD, NAME_FIELD, QUERY_FIELD, SKIP_URL_SYNC_FIELD,
    TEXT_FIELD, TYPE_FIELD, VALUE_FIELD,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// A scene tree description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Human readable title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Root node
    pub root: NodeDocument,
}

/// One node of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument {
    /// Kind name, e.g. `scene`, `layout` or an application kind
    pub kind: String,
    /// Identity key; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Object cache key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    /// Fields scanned for variable references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_paths: Vec<String>,
    /// Time range held in the `$timeRange` slot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRangeDocument>,
    /// Variables held in the `$variables` slot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<VariableDocument>,
    /// Plain state fields
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub state: BTreeMap<String, serde_json::Value>,
    /// Other fields holding a single node, e.g. `$data` or `body`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, NodeDocument>,
    /// Nodes of the `children` field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDocument>,
}

/// Time range bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRangeDocument {
    /// Start
    pub from: String,
    /// End
    pub to: String,
}

/// One variable of a `$variables` slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDocument {
    /// Variable name
    pub name: String,
    /// `constant`, `textbox` or `custom`
    #[serde(rename = "type", default = "default_variable_type")]
    pub variable_type: String,
    /// Current value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Display text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<serde_json::Value>,
    /// Option query of custom variables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Several options may be selected
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_multi: bool,
    /// Kept out of the URL
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_url_sync: bool,
}

fn default_variable_type() -> String {
    VariableType::TextBox.as_str().to_string()
}

impl SceneDocument {
    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns [`DocumentError::Json`] for malformed input
    pub fn from_json_str(source: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns [`DocumentError::Toml`] for malformed input
    pub fn from_toml_str(source: &str) -> Result<Self, DocumentError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a `.json` or `.toml` document
    ///
    /// # Errors
    /// Returns [`DocumentError::Io`] if the file cannot be read and
    /// [`DocumentError::UnsupportedFormat`] for other extensions
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let read = || {
            std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
                path: path.to_path_buf(),
                source,
            })
        };
        match extension.as_str() {
            "json" => Self::from_json_str(&read()?),
            "toml" => Self::from_toml_str(&read()?),
            other => Err(DocumentError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Pretty JSON form
    ///
    /// # Errors
    /// Returns [`DocumentError::Json`] if serialization fails
    pub fn to_json_string(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// TOML form
    ///
    /// # Errors
    /// Returns [`DocumentError::TomlWrite`] for values TOML cannot hold,
    /// such as `null`
    pub fn to_toml_string(&self) -> Result<String, DocumentError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build the described tree in `context`
    ///
    /// # Errors
    /// Returns [`DocumentError::Invalid`] for unknown variable types or
    /// misplaced nodes, and construction errors for reserved slot misuse
    pub fn build(&self, context: &SceneContext) -> SceneResult<SceneNode> {
        let root = self.root.build(context)?;
        tracing::debug!(title = ?self.title, key = %root.key(), "scene document built");
        Ok(root)
    }

    /// Describe the tree rooted at `root`
    ///
    /// # Errors
    /// Returns [`SceneError::NotSerializable`](crate::SceneError) if a
    /// field holds an opaque value
    pub fn export(root: &SceneNode) -> SceneResult<Self> {
        Ok(Self {
            title: None,
            root: NodeDocument::export(root)?,
        })
    }
}

impl NodeDocument {
    /// Build this node and its subtree
    ///
    /// # Errors
    /// As [`SceneDocument::build`]
    pub fn build(&self, context: &SceneContext) -> SceneResult<SceneNode> {
        let kind = NodeKind::from_name(&self.kind);
        let definition = self.definition(&kind)?;

        let mut state = SceneState::new();
        if let Some(key) = &self.key {
            state = state.with_key(key.clone());
        }
        if let Some(cache_key) = &self.cache_key {
            state = state.with_cache_key(cache_key.clone());
        }
        for (field, value) in &self.state {
            state = state.with(field.clone(), StateValue::from(value.clone()));
        }
        if let Some(range) = &self.time_range {
            state = state.with(TIME_RANGE_SLOT, time_range(range.from.clone(), range.to.clone(), context)?);
        }
        if !self.variables.is_empty() {
            let vars = self
                .variables
                .iter()
                .map(|var| var.build(context))
                .collect::<SceneResult<Vec<_>>>()?;
            state = state.with(VARIABLES_SLOT, variable_set(vars, context)?);
        }
        for (field, node) in &self.nodes {
            state = state.with(field.clone(), node.build(context)?);
        }
        if !self.children.is_empty() {
            let children = self
                .children
                .iter()
                .map(|child| child.build(context))
                .collect::<SceneResult<Vec<_>>>()?;
            state = state.with(CHILDREN_FIELD, StateValue::list(children));
        }

        SceneNode::new(definition, state, context)
    }

    fn definition(&self, kind: &NodeKind) -> SceneResult<Arc<NodeDefinition>> {
        let standard = match kind {
            NodeKind::TimeRange => Some(time_range_definition()),
            NodeKind::Data => Some(data_definition()),
            NodeKind::Layout => Some(layout_definition()),
            NodeKind::Editor => Some(editor_definition()),
            NodeKind::Variable | NodeKind::VariableSet => {
                return Err(DocumentError::Invalid(format!(
                    "'{kind}' nodes are declared through the `variables` list"
                ))
                .into());
            }
            NodeKind::Scene | NodeKind::Custom(_) => None,
        };
        Ok(match standard {
            Some(definition) if self.dependency_paths.is_empty() => definition,
            _ => Arc::new(NodeDefinition::new(kind.clone()).with_dependency_paths(self.dependency_paths.iter().cloned())),
        })
    }

    /// Describe `node` and its subtree
    ///
    /// # Errors
    /// As [`SceneDocument::export`]
    pub fn export(node: &SceneNode) -> SceneResult<Self> {
        let state = node.state();
        let mut doc = Self {
            kind: node.kind().as_str().to_string(),
            key: Some(node.key().to_string()),
            cache_key: state.cache_key().map(str::to_string),
            dependency_paths: node.definition().dependency_paths().to_vec(),
            time_range: None,
            variables: Vec::new(),
            state: BTreeMap::new(),
            nodes: BTreeMap::new(),
            children: Vec::new(),
        };

        for (field, value) in state.fields() {
            match (field, value) {
                (TIME_RANGE_SLOT, StateValue::Node(range)) if *range.kind() == NodeKind::TimeRange => {
                    let (from, to) = time_range_bounds(range);
                    doc.time_range = Some(TimeRangeDocument { from, to });
                }
                (VARIABLES_SLOT, StateValue::Node(set)) if *set.kind() == NodeKind::VariableSet => {
                    doc.variables = variables(set)
                        .iter()
                        .map(VariableDocument::export)
                        .collect::<SceneResult<_>>()?;
                }
                (CHILDREN_FIELD, StateValue::List(items)) if items.iter().all(|i| i.as_node().is_some()) => {
                    doc.children = items
                        .iter()
                        .filter_map(StateValue::as_node)
                        .map(NodeDocument::export)
                        .collect::<SceneResult<_>>()?;
                }
                (_, StateValue::Node(child)) => {
                    doc.nodes.insert(field.to_string(), NodeDocument::export(child)?);
                }
                _ => {
                    doc.state.insert(field.to_string(), value.to_json()?);
                }
            }
        }
        Ok(doc)
    }
}

impl VariableDocument {
    /// Build the variable node
    ///
    /// # Errors
    /// Returns [`DocumentError::Invalid`] for unknown variable types
    pub fn build(&self, context: &SceneContext) -> SceneResult<SceneNode> {
        let variable_type = VariableType::from_name(&self.variable_type).ok_or_else(|| {
            DocumentError::Invalid(format!(
                "unknown type '{}' for variable '{}'",
                self.variable_type, self.name
            ))
        })?;

        let mut builder = VariableBuilder::new(variable_type, self.name.clone());
        if let Some(value) = &self.value {
            builder = builder.value(StateValue::from(value.clone()));
        }
        if let Some(text) = &self.text {
            builder = builder.text(StateValue::from(text.clone()));
        }
        if let Some(query) = &self.query {
            builder = builder.query(query.clone());
        }
        if self.is_multi {
            builder = builder.multi(true);
        }
        if self.skip_url_sync {
            builder = builder.skip_url_sync(true);
        }
        builder.build(context)
    }

    /// Describe a variable node
    ///
    /// # Errors
    /// As [`SceneDocument::export`]
    pub fn export(node: &SceneNode) -> SceneResult<Self> {
        let flag = |field: &str| node.get(field).and_then(|v| v.as_bool()).unwrap_or(false);
        let json = |field: &str| node.get(field).map(|v| v.to_json()).transpose();
        Ok(Self {
            name: node.get_str(NAME_FIELD).unwrap_or_default(),
            variable_type: node.get_str(TYPE_FIELD).unwrap_or_else(default_variable_type),
            value: json(VALUE_FIELD)?,
            text: json(TEXT_FIELD)?,
            query: node.get_str(QUERY_FIELD),
            is_multi: flag(MULTI_FIELD),
            skip_url_sync: flag(SKIP_URL_SYNC_FIELD),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::{find_all, get_time_range};
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"{
        "title": "Service overview",
        "root": {
            "kind": "scene",
            "key": "root",
            "timeRange": { "from": "now-1h", "to": "now" },
            "variables": [
                { "name": "env", "type": "custom", "query": "dev, prod", "value": "prod" },
                { "name": "region", "value": "eu" }
            ],
            "children": [
                { "kind": "panel", "key": "cpu", "dependencyPaths": ["title"], "state": { "title": "CPU ${env}" } }
            ]
        }
    }"#;

    #[test]
    fn builds_tree_from_json() {
        let ctx = SceneContext::new();
        let root = SceneDocument::from_json_str(DOC).unwrap().build(&ctx).unwrap();
        assert_eq!(root.key(), "root");

        let panels = find_all(&root, |n| n.kind().as_str() == "panel");
        assert_eq!(panels.len(), 1);
        assert_eq!(panels[0].interpolate("${env}/${region}"), "prod/eu");
        assert!(panels[0].depends_on_variable("env"));
        assert_eq!(
            time_range_bounds(&get_time_range(&panels[0])),
            ("now-1h".to_string(), "now".to_string())
        );
    }

    #[test]
    fn export_round_trips() {
        let ctx = SceneContext::new();
        let doc = SceneDocument::from_json_str(DOC).unwrap();
        let exported = SceneDocument::export(&doc.build(&ctx).unwrap()).unwrap();

        assert_eq!(exported.root.children, doc.root.children);
        assert_eq!(exported.root.time_range, doc.root.time_range);
        assert_eq!(exported.root.variables[0].query.as_deref(), Some("dev, prod"));
        assert_eq!(exported.root.variables[1].variable_type, "textbox");
    }

    #[test]
    fn rejects_unknown_variable_type() {
        let ctx = SceneContext::new();
        let doc = SceneDocument::from_json_str(
            r#"{ "root": { "kind": "scene", "variables": [{ "name": "x", "type": "query" }] } }"#,
        )
        .unwrap();
        let err = doc.build(&ctx).unwrap_err();
        assert!(matches!(err, crate::SceneError::Document(DocumentError::Invalid(_))));
    }

    #[test]
    fn reads_toml() {
        let doc = SceneDocument::from_toml_str(
            r#"
            [root]
            kind = "layout"

            [[root.children]]
            kind = "panel"
            state = { title = "Memory" }
            "#,
        )
        .unwrap();
        assert_eq!(doc.root.children[0].state["title"], serde_json::json!("Memory"));
    }

    #[test]
    fn unsupported_extension() {
        let err = SceneDocument::from_path("scene.yaml").unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat(ext) if ext == "yaml"));
    }
}
