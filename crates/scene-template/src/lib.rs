//! Scene Template System
//!
//! Variable token syntax, value formats and interpolation, independent of the
//! scene graph that supplies variable values.
//!
//! # Core Concepts
//!
//! - [`Token`]: one `${name.path:format:args}`, `$name` or `[[name:format]]`
//!   reference found in a template
//! - [`FormatRegistry`]: named value formatters (`glob`, `csv`, `regex`, ...)
//! - [`FormatVariable`]: the contract a variable exposes to formatters
//! - [`VariableResolver`]: maps a token name to a [`FormatVariable`]
//! - [`Interpolator`]: replaces tokens, leaving unresolved ones verbatim
//!
//! # Example
//!
//! ```rust
//! use scene_template::{FormatRegistry, Interpolator, StaticResolver, VariableValue};
//!
//! let registry = FormatRegistry::with_defaults();
//! let mut resolver = StaticResolver::new();
//! resolver.insert("host", VariableValue::list(["a", "b"]));
//!
//! let out = Interpolator::new(&registry).interpolate("up{${host}}", &resolver, None);
//! assert_eq!(out, "up{{a,b}}");
//! ```

#![warn(unreachable_pub)]

mod error;
mod format;
mod formats;
mod interpolate;
mod token;
mod value;

pub use error::FormatError;
pub use format::{FormatContext, FormatEntry, FormatId, FormatInput, FormatRegistry, FormatterFn};
pub use interpolate::{Interpolation, Interpolator, StaticResolver, VariableResolver};
pub use token::{extract_names, has_tokens, tokens, Token, TokenSyntax};
pub use value::{FormatVariable, VariableValue};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for template interpolation
    pub use crate::{
        FormatRegistry, FormatVariable, Interpolation, Interpolator, Token, VariableResolver,
        VariableValue,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
