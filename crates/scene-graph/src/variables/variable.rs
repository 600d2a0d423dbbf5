//! Variable nodes
//!
//! A variable is a node of kind [`NodeKind::Variable`] with `name`, `value`
//! and `text` fields. Three flavours are provided:
//!
//! - constant: fixed value, never in the URL
//! - text box: free text, synced as `var-<name>`
//! - custom: options parsed from a comma separated `query`; the query may
//!   itself reference other variables and is re-evaluated when they change

use crate::context::SceneContext;
use crate::error::SceneResult;
use crate::interpolate::interpolate;
use crate::node::{DeactivationHandler, NodeDefinition, NodeKind, SceneNode};
use crate::state::{SceneState, StatePatch};
use crate::url::{to_url_value, UrlState, UrlSyncHandler, UrlValue};
use crate::value::StateValue;
use once_cell::sync::Lazy;
use regex::Regex;
use scene_template::{FormatVariable, VariableValue};
use std::fmt;
use std::sync::Arc;

/// Variable name field
pub const NAME_FIELD: &str = "name";
/// Current value field
pub const VALUE_FIELD: &str = "value";
/// Display text field
pub const TEXT_FIELD: &str = "text";
/// Option source of custom variables
pub const QUERY_FIELD: &str = "query";
/// Parsed options of custom variables
pub const OPTIONS_FIELD: &str = "options";
/// Whether several options may be selected
pub const MULTI_FIELD: &str = "isMulti";
/// Keeps the variable out of the URL when `true`
pub const SKIP_URL_SYNC_FIELD: &str = "skipUrlSync";
/// Variable flavour
pub const TYPE_FIELD: &str = "type";

static OPTION_SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\\,|[^,])+").expect("option split regex is valid")
});

static TEXT_VALUE_SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+:\s+").expect("text/value split regex is valid")
});

/// Variable flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    /// Fixed value
    Constant,
    /// Free text
    TextBox,
    /// Options from a comma separated list
    Custom,
}

impl VariableType {
    /// Name used in documents
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::TextBox => "textbox",
            Self::Custom => "custom",
        }
    }

    /// Parse a flavour name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "constant" => Some(Self::Constant),
            "textbox" => Some(Self::TextBox),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Shared node definition for this flavour
    #[must_use]
    pub fn definition(self) -> Arc<NodeDefinition> {
        match self {
            Self::Constant => Arc::clone(&CONSTANT),
            Self::TextBox => Arc::clone(&TEXT_BOX),
            Self::Custom => Arc::clone(&CUSTOM),
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static CONSTANT: Lazy<Arc<NodeDefinition>> =
    Lazy::new(|| Arc::new(NodeDefinition::new(NodeKind::Variable)));

static TEXT_BOX: Lazy<Arc<NodeDefinition>> = Lazy::new(|| {
    Arc::new(NodeDefinition::new(NodeKind::Variable).with_url_sync(VariableUrlSync))
});

static CUSTOM: Lazy<Arc<NodeDefinition>> = Lazy::new(|| {
    Arc::new(
        NodeDefinition::new(NodeKind::Variable)
            .with_dependency_paths([QUERY_FIELD])
            .with_url_sync(VariableUrlSync)
            .with_activation_handler(on_custom_activated)
            .with_variable_changed_handler(|node, _changed| {
                if let Err(err) = validate_and_update(node) {
                    tracing::warn!(key = %node.key(), error = %err, "failed to refresh variable options");
                }
            }),
    )
});

fn on_custom_activated(node: &SceneNode) -> Option<DeactivationHandler> {
    if let Err(err) = validate_and_update(node) {
        tracing::warn!(key = %node.key(), error = %err, "failed to validate variable on activation");
    }
    None
}

/// Builder for variable nodes
#[derive(Debug)]
pub struct VariableBuilder {
    variable_type: VariableType,
    state: SceneState,
}

impl VariableBuilder {
    /// Start a variable of `variable_type` named `name`
    #[must_use]
    pub fn new(variable_type: VariableType, name: impl Into<String>) -> Self {
        Self {
            variable_type,
            state: SceneState::new()
                .with(NAME_FIELD, name.into())
                .with(TYPE_FIELD, variable_type.as_str()),
        }
    }

    /// With identity key
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.state = self.state.with_key(key);
        self
    }

    /// With cache key
    #[must_use]
    pub fn cache_key(mut self, cache_key: impl Into<String>) -> Self {
        self.state = self.state.with_cache_key(cache_key);
        self
    }

    /// With current value
    #[must_use]
    pub fn value(mut self, value: impl Into<StateValue>) -> Self {
        self.state = self.state.with(VALUE_FIELD, value);
        self
    }

    /// With display text
    #[must_use]
    pub fn text(mut self, text: impl Into<StateValue>) -> Self {
        self.state = self.state.with(TEXT_FIELD, text);
        self
    }

    /// With option query (custom variables)
    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.state = self.state.with(QUERY_FIELD, query.into());
        self
    }

    /// Allow several selected options
    #[must_use]
    pub fn multi(mut self, multi: bool) -> Self {
        self.state = self.state.with(MULTI_FIELD, multi);
        self
    }

    /// Keep out of the URL
    #[must_use]
    pub fn skip_url_sync(mut self, skip: bool) -> Self {
        self.state = self.state.with(SKIP_URL_SYNC_FIELD, skip);
        self
    }

    /// Build the variable node
    ///
    /// # Errors
    /// As [`SceneNode::new`]
    pub fn build(self, context: &SceneContext) -> SceneResult<SceneNode> {
        let mut state = self.state;
        if !state.contains(TEXT_FIELD) {
            if let Some(value) = state.get(VALUE_FIELD).cloned() {
                state = state.with(TEXT_FIELD, value);
            }
        }
        SceneNode::new(self.variable_type.definition(), state, context)
    }
}

/// Constant variable
///
/// # Errors
/// As [`SceneNode::new`]
pub fn constant(
    name: impl Into<String>,
    value: impl Into<StateValue>,
    context: &SceneContext,
) -> SceneResult<SceneNode> {
    VariableBuilder::new(VariableType::Constant, name)
        .value(value)
        .build(context)
}

/// Text box variable
///
/// # Errors
/// As [`SceneNode::new`]
pub fn text_box(
    name: impl Into<String>,
    value: impl Into<String>,
    context: &SceneContext,
) -> SceneResult<SceneNode> {
    VariableBuilder::new(VariableType::TextBox, name)
        .value(value.into())
        .build(context)
}

/// Custom variable with options from `query`; the first option is selected
/// on activation when the value is not one of them
///
/// # Errors
/// As [`SceneNode::new`]
pub fn custom(
    name: impl Into<String>,
    query: impl Into<String>,
    context: &SceneContext,
) -> SceneResult<SceneNode> {
    VariableBuilder::new(VariableType::Custom, name)
        .query(query)
        .build(context)
}

/// One selectable option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableOption {
    /// Display text
    pub text: String,
    /// Value
    pub value: String,
}

impl VariableOption {
    fn to_state_value(&self) -> StateValue {
        StateValue::object([
            ("text", self.text.as_str()),
            ("value", self.value.as_str()),
        ])
    }

    fn from_state_value(value: &StateValue) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            text: map.get("text")?.as_str()?.to_string(),
            value: map.get("value")?.as_str()?.to_string(),
        })
    }
}

/// Parse a custom variable query: `a, b, c` or `text : value, ...`;
/// `\,` escapes a comma
#[must_use]
pub fn parse_custom_options(query: &str) -> Vec<VariableOption> {
    OPTION_SPLIT
        .find_iter(query)
        .map(|m| m.as_str().trim().replace("\\,", ","))
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = TEXT_VALUE_SPLIT.split(&entry).collect();
            if let [text, value] = parts.as_slice() {
                VariableOption {
                    text: text.trim().to_string(),
                    value: value.trim().to_string(),
                }
            } else {
                VariableOption {
                    text: entry.clone(),
                    value: entry.clone(),
                }
            }
        })
        .collect()
}

/// Typed view over a variable node
#[derive(Clone)]
pub struct Variable {
    node: SceneNode,
    name: String,
}

impl Variable {
    /// View `node` as a variable; `None` for other kinds
    #[must_use]
    pub fn from_node(node: SceneNode) -> Option<Self> {
        if *node.kind() != NodeKind::Variable {
            return None;
        }
        let name = node.get_str(NAME_FIELD)?;
        Some(Self { node, name })
    }

    /// Underlying node
    #[inline]
    #[must_use]
    pub fn node(&self) -> &SceneNode {
        &self.node
    }

    /// Variable name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable flavour
    #[must_use]
    pub fn variable_type(&self) -> Option<VariableType> {
        self.node
            .get_str(TYPE_FIELD)
            .and_then(|t| VariableType::from_name(&t))
    }

    /// Current value, optionally navigated by a field path
    #[must_use]
    pub fn get_value(&self, field_path: Option<&str>) -> VariableValue {
        let value = self
            .node
            .get(VALUE_FIELD)
            .map(|v| v.to_variable_value())
            .unwrap_or_default();
        match field_path {
            Some(path) => value.at_path(path),
            None => value,
        }
    }

    /// Display text; multi-values are joined with the configured separator
    #[must_use]
    pub fn get_value_text(&self, field_path: Option<&str>) -> String {
        if field_path.is_some() {
            return self.get_value(field_path).to_plain_string();
        }
        let separator = &self.node.context().config().multi_value_separator;
        let text = match self.node.get(TEXT_FIELD) {
            Some(text) if !text.is_null() => text.to_variable_value(),
            _ => self.get_value(None),
        };
        match text {
            VariableValue::List(items) => items
                .iter()
                .map(VariableValue::to_plain_string)
                .collect::<Vec<_>>()
                .join(separator),
            other => other.to_plain_string(),
        }
    }

    /// Select a new value and text
    ///
    /// # Errors
    /// Propagates `set_state` failures
    pub fn set_value(&self, value: impl Into<StateValue>, text: impl Into<StateValue>) -> SceneResult<()> {
        self.node.set_state(
            StatePatch::new()
                .set(VALUE_FIELD, value)
                .set(TEXT_FIELD, text),
        )
    }

    /// Parsed options of a custom variable
    #[must_use]
    pub fn options(&self) -> Vec<VariableOption> {
        self.node
            .get(OPTIONS_FIELD)
            .and_then(|options| {
                options
                    .as_list()
                    .map(|items| items.iter().filter_map(VariableOption::from_state_value).collect())
            })
            .unwrap_or_default()
    }

    /// Whether several options may be selected
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.node
            .get(MULTI_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

impl FormatVariable for Variable {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self, field_path: Option<&str>) -> VariableValue {
        self.get_value(field_path)
    }

    fn value_text(&self, field_path: Option<&str>) -> String {
        self.get_value_text(field_path)
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("key", &self.node.key())
            .finish()
    }
}

/// Re-evaluate a custom variable's options and repair its selection
///
/// The query is interpolated against the variable's own scope. Options are
/// only written when they changed; the value is reset to the first option
/// when the current selection is no longer offered.
///
/// # Errors
/// Propagates `set_state` failures
pub fn validate_and_update(node: &SceneNode) -> SceneResult<()> {
    let Some(variable) = Variable::from_node(node.clone()) else {
        return Ok(());
    };
    let query = node.get_str(QUERY_FIELD).unwrap_or_default();
    let options = parse_custom_options(&interpolate(node, &query, None, None));

    let mut patch = StatePatch::new();
    if variable.options() != options {
        patch.insert(
            OPTIONS_FIELD,
            StateValue::list(options.iter().map(VariableOption::to_state_value)),
        );
    }

    let selected: Vec<String> = match variable.get_value(None) {
        VariableValue::List(items) => items.iter().map(VariableValue::to_plain_string).collect(),
        VariableValue::Null => Vec::new(),
        other => vec![other.to_plain_string()],
    };
    let valid: Vec<&VariableOption> = selected
        .iter()
        .filter_map(|value| options.iter().find(|o| o.value == *value))
        .collect();

    if valid.is_empty() {
        let (value, text) = options
            .first()
            .map_or((String::new(), String::new()), |o| (o.value.clone(), o.text.clone()));
        if selected != [value.clone()] {
            patch.insert(VALUE_FIELD, value);
            patch.insert(TEXT_FIELD, text);
        }
    } else if valid.len() != selected.len() {
        let (values, texts): (Vec<&str>, Vec<&str>) = valid
            .iter()
            .map(|o| (o.value.as_str(), o.text.as_str()))
            .unzip();
        patch.insert(VALUE_FIELD, StateValue::list(values));
        patch.insert(TEXT_FIELD, StateValue::list(texts));
    }

    if patch.is_empty() {
        return Ok(());
    }
    tracing::debug!(key = %node.key(), name = %variable.name(), "variable options updated");
    node.set_state(patch)
}

/// URL sync for text box and custom variables: one `var-<name>` key
#[derive(Debug, Clone, Copy, Default)]
pub struct VariableUrlSync;

impl VariableUrlSync {
    fn url_key(node: &SceneNode) -> Option<String> {
        if node
            .get(SKIP_URL_SYNC_FIELD)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return None;
        }
        node.get_str(NAME_FIELD).map(|name| format!("var-{name}"))
    }
}

impl UrlSyncHandler for VariableUrlSync {
    fn keys(&self, node: &SceneNode) -> Vec<String> {
        Self::url_key(node).into_iter().collect()
    }

    fn get_url_state(&self, node: &SceneNode) -> UrlState {
        let mut state = UrlState::new();
        if let Some(key) = Self::url_key(node) {
            let value = node.get(VALUE_FIELD).map_or(UrlValue::Null, |v| to_url_value(&v));
            state.insert(key, value);
        }
        state
    }

    fn update_from_url(&self, node: &SceneNode, values: &UrlState) -> SceneResult<()> {
        let Some(key) = Self::url_key(node) else {
            return Ok(());
        };
        let Some(variable) = Variable::from_node(node.clone()) else {
            return Ok(());
        };
        let urls: Vec<String> = match values.get(&key) {
            None | Some(UrlValue::Null) => return Ok(()),
            Some(value) => value.values(),
        };

        let options = variable.options();
        let text_of = |value: &str| {
            options
                .iter()
                .find(|o| o.value == value)
                .map_or_else(|| value.to_string(), |o| o.text.clone())
        };
        let keep_list = variable.is_multi()
            || matches!(node.get(VALUE_FIELD), Some(StateValue::List(_)))
            || urls.len() > 1;

        if keep_list {
            let texts: Vec<String> = urls.iter().map(|v| text_of(v)).collect();
            variable.set_value(StateValue::list(urls), StateValue::list(texts))
        } else {
            let value = urls.into_iter().next().unwrap_or_default();
            let text = text_of(&value);
            variable.set_value(value, text)
        }
    }
}
