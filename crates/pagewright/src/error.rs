//! Error types for view composition.
//!
//! [`ViewError`] is the single error type returned by every public operation.
//! It hides the underlying template engine's errors behind stable variants so
//! callers can match on what went wrong (missing view, unreadable file, bad
//! template, failed execution) without depending on MiniJinja directly.

use std::path::PathBuf;

use thiserror::Error;

use crate::resolve::TemplateKind;
use crate::session::SessionPhase;

/// Error type for resolution, compilation and rendering.
#[derive(Debug, Error)]
pub enum ViewError {
    /// No candidate path named an existing file.
    #[error("{kind} `{name}` not found")]
    ViewNotFound { kind: TemplateKind, name: String },

    /// The file existed but could not be read.
    #[error("failed to read template {}: {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine rejected the template source.
    #[error("template `{name}` failed to compile: {detail}")]
    TemplateSyntax { name: String, detail: String },

    /// The template compiled but failed while executing.
    #[error("template `{name}` failed to render: {detail}")]
    Execution { name: String, detail: String },

    /// A JSON-encoded model or data argument was malformed.
    #[error("invalid JSON model: {detail}")]
    Decode { detail: String },

    /// Partials included each other deeper than the session allows.
    #[error("render of `{name}` exceeds the nesting limit of {limit}")]
    RenderDepth { name: String, limit: usize },

    /// A phase was started out of order, e.g. on a session that already ran.
    #[error("cannot start the {operation} phase of a session in phase {phase:?}")]
    OutOfOrder {
        operation: &'static str,
        phase: SessionPhase,
    },

    /// The connection configuration is unusable.
    #[error("invalid view configuration: {detail}")]
    Config { detail: String },
}

impl ViewError {
    pub(crate) fn syntax(name: &str, err: minijinja::Error) -> Self {
        ViewError::TemplateSyntax {
            name: name.to_string(),
            detail: describe(&err),
        }
    }

    pub(crate) fn execution(name: &str, err: minijinja::Error) -> Self {
        ViewError::Execution {
            name: name.to_string(),
            detail: describe(&err),
        }
    }

    /// Returns `true` for a failed lookup of the given kind.
    pub fn is_not_found(&self, kind: TemplateKind) -> bool {
        matches!(self, ViewError::ViewNotFound { kind: k, .. } if *k == kind)
    }
}

impl From<serde_json::Error> for ViewError {
    fn from(err: serde_json::Error) -> Self {
        ViewError::Decode {
            detail: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ViewError {
    fn from(err: serde_yaml::Error) -> Self {
        ViewError::Config {
            detail: err.to_string(),
        }
    }
}

// MiniJinja nests helper failures as sources; keep the whole chain in the message.
fn describe(err: &minijinja::Error) -> String {
    let mut detail = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        detail.push_str(": ");
        detail.push_str(&inner.to_string());
        source = inner.source();
    }
    detail
}

/// Result type for view operations.
pub type Result<T> = std::result::Result<T, ViewError>;
