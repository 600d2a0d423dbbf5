//! Interpolation against the scene graph
//!
//! Token names resolve first from the caller's [`ScopedVars`], then from the
//! nearest variable set on the path from the node to the root. Tokens that
//! resolve nowhere are left verbatim.

use crate::node::SceneNode;
use crate::traversal::lookup_variable;
use crate::variables::scoped::ScopedVars;
use crate::variables::variable::Variable;
use scene_template::{has_tokens, FormatVariable, Interpolation, Interpolator, VariableResolver};

struct NodeResolver<'a> {
    node: &'a SceneNode,
    scoped: Option<&'a ScopedVars>,
}

impl VariableResolver for NodeResolver<'_> {
    fn resolve(&self, name: &str) -> Option<Box<dyn FormatVariable + '_>> {
        if let Some(scoped) = self.scoped.and_then(|vars| vars.variable(name)) {
            return Some(Box::new(scoped));
        }
        let variable = Variable::from_node(lookup_variable(name, self.node)?)?;
        Some(Box::new(variable))
    }
}

/// Interpolate `template` in the scope of `node`
///
/// `format` applies to tokens without their own format and defaults to the
/// context's configured format.
#[must_use]
pub fn interpolate(
    node: &SceneNode,
    template: &str,
    scoped_vars: Option<&ScopedVars>,
    format: Option<&str>,
) -> String {
    if !has_tokens(template) {
        return template.to_string();
    }
    let context = node.context();
    let format = format.or(Some(context.config().default_format.as_str()));
    let resolver = NodeResolver {
        node,
        scoped: scoped_vars,
    };
    Interpolator::new(context.formats()).interpolate(template, &resolver, format)
}

/// Like [`interpolate`], also reporting each token encountered
#[must_use]
pub fn interpolate_with_report(
    node: &SceneNode,
    template: &str,
    scoped_vars: Option<&ScopedVars>,
    format: Option<&str>,
) -> (String, Vec<Interpolation>) {
    let context = node.context();
    let format = format.or(Some(context.config().default_format.as_str()));
    let resolver = NodeResolver {
        node,
        scoped: scoped_vars,
    };
    Interpolator::new(context.formats()).interpolate_with_report(template, &resolver, format)
}

impl SceneNode {
    /// Interpolate `template` in this node's scope with the default format
    #[must_use]
    pub fn interpolate(&self, template: &str) -> String {
        interpolate(self, template, None, None)
    }
}
