use thiserror::Error;

/// Errors raised while parsing or evaluating JSON paths and URL templates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("invalid path '{path}': {reason}")]
    Syntax { path: String, reason: String },

    /// A write operation was given a path containing wildcards or queries.
    #[error("path '{path}' does not address a single location")]
    NotConcrete { path: String },

    /// A `$(body.x)` reference pointed at nothing.
    #[error("'{reference}' is absent from the body")]
    Missing { reference: String },

    #[error("invalid template '{template}': {reason}")]
    Template { template: String, reason: String },

    #[error("unknown template function '{name}'")]
    UnknownFunction { name: String },
}

impl PathError {
    pub fn syntax(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn template(template: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Template {
            template: template.into(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while reconciling a desired body against a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// Import templates describe array elements with at most one entry.
    #[error("import template array at '{path}' has {len} elements; at most one is allowed")]
    ImportArrayTooLong { path: String, len: usize },

    #[error(transparent)]
    Path(#[from] PathError),
}
