//! Shared helpers for the tether engine: the JSON path language, locator
//! evaluation, URL template expansion, body reconciliation and a handful of
//! parsing utilities.

pub mod date_handling;
pub mod error;
pub mod expand;
pub mod http;
pub mod json_path;
pub mod locate;
pub mod reconcile;

pub use error::{PathError, ReconcileError};
pub use expand::{ExpandContext, Template, expand, render_json_template, render_json_value, validate_template};
pub use json_path::{ConcretePath, JsonPath, value_to_string};
pub use locate::{locate, locate_in_body, validate_locator};
pub use reconcile::{
    create_merge_patch, filter_attrs, modify_body, modify_body_for_import, nullify, subtract_skeleton,
};
