//! Variables: nodes, variable sets and scoped values

pub mod scoped;
pub mod set;
pub mod variable;

pub use scoped::{ScopedVar, ScopedVars};
pub use set::{get_by_name, notify_dependents, variable_set, variable_set_definition, variables, VARIABLES_FIELD};
pub use variable::{
    constant, custom, parse_custom_options, text_box, validate_and_update, Variable, VariableBuilder,
    VariableOption, VariableType, VariableUrlSync, VALUE_FIELD,
};
