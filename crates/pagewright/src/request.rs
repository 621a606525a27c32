//! Per-call render input.

use std::collections::BTreeMap;

use minijinja::Value;
use serde::Serialize;
use serde_json::Map;

use crate::error::{Result, ViewError};

/// Everything a single [`parse`](crate::Connection::parse) call renders from.
///
/// ```rust
/// use pagewright::ViewRequest;
/// use serde_json::json;
///
/// let request = ViewRequest::new("users/list")
///     .language("en")
///     .site("shop")
///     .insert("user", json!({ "name": "Ada" }))
///     .model(json!({ "page": 2 }));
/// assert_eq!(request.view, "users/list");
/// assert_eq!(request.site.as_deref(), Some("shop"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ViewRequest {
    /// Body view name, or inline template source if it contains a newline.
    pub view: String,
    /// Language segment used in candidate paths.
    pub language: String,
    /// Optional site segment used in candidate paths.
    pub site: Option<String>,
    /// Top-level template variables, visible to body, layout and partials.
    pub data: Map<String, serde_json::Value>,
    /// Model for the body view, exposed as `model`.
    pub model: Option<serde_json::Value>,
    /// Extra template functions. Built-in composition helpers win on clashes.
    pub helpers: BTreeMap<String, Value>,
}

impl ViewRequest {
    /// Creates a request for `view`.
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            ..Self::default()
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Sets one top-level variable.
    pub fn insert(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Merges every field of `data` into the top-level variables.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Decode`] if `data` does not serialize to a map.
    pub fn with_data<T: Serialize>(mut self, data: &T) -> Result<Self> {
        match serde_json::to_value(data)? {
            serde_json::Value::Object(map) => {
                self.data.extend(map);
                Ok(self)
            }
            other => Err(ViewError::Decode {
                detail: format!("view data must be a map, got {other}"),
            }),
        }
    }

    /// Sets the body model.
    pub fn model(mut self, model: serde_json::Value) -> Self {
        self.model = Some(model);
        self
    }

    /// Registers a caller-supplied helper.
    ///
    /// ```rust
    /// use minijinja::Value;
    /// use pagewright::ViewRequest;
    ///
    /// let request = ViewRequest::new("home")
    ///     .helper("shout", Value::from_function(|s: String| s.to_uppercase()));
    /// assert!(request.helpers.contains_key("shout"));
    /// ```
    pub fn helper(mut self, name: impl Into<String>, helper: Value) -> Self {
        self.helpers.insert(name.into(), helper);
        self
    }
}
