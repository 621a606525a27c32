//! Connection-level configuration.
//!
//! A [`ViewConfig`] is fixed when a [`Connection`](crate::Connection) is
//! created. Every field that is missing or empty receives its own default
//! exactly once, in [`ViewConfig::normalized`].
//!
//! Configuration can be built in code or loaded from YAML or JSON:
//!
//! ```rust
//! use pagewright::ViewConfig;
//!
//! let config = ViewConfig::from_yaml("root: ./templates\nshared: common\n").unwrap();
//! assert_eq!(config.root.to_str(), Some("./templates"));
//! assert_eq!(config.shared, "common");
//! assert_eq!(config.left, "{%");
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewError};

/// Default left block delimiter.
pub const DEFAULT_LEFT: &str = "{%";
/// Default right block delimiter.
pub const DEFAULT_RIGHT: &str = "%}";
/// Default template root.
pub const DEFAULT_ROOT: &str = "asset/views";
/// Default name of shared-template subdirectories.
pub const DEFAULT_SHARED: &str = "shared";

/// Template delimiters and directory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    /// Left block delimiter. Expressions keep `{{ }}`.
    pub left: String,
    /// Right block delimiter.
    pub right: String,
    /// Base directory all candidate paths start from.
    pub root: PathBuf,
    /// Name of the shared-template subdirectory at each level.
    pub shared: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            left: DEFAULT_LEFT.to_string(),
            right: DEFAULT_RIGHT.to_string(),
            root: PathBuf::from(DEFAULT_ROOT),
            shared: DEFAULT_SHARED.to_string(),
        }
    }
}

impl ViewConfig {
    /// Creates a configuration with all defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the template root.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Sets the shared subdirectory name.
    pub fn shared(mut self, shared: impl Into<String>) -> Self {
        self.shared = shared.into();
        self
    }

    /// Sets the block delimiter pair.
    pub fn delimiters(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left = left.into();
        self.right = right.into();
        self
    }

    /// Parses a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parses a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| ViewError::Config {
            detail: err.to_string(),
        })
    }

    /// Loads a `.yaml`, `.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| ViewError::ReadFailure {
            path: path.to_path_buf(),
            source: err,
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&text),
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            _ => Err(ViewError::Config {
                detail: format!("unsupported config format: {}", path.display()),
            }),
        }
    }

    /// Replaces every empty field with its own default.
    pub fn normalized(mut self) -> Self {
        if self.left.is_empty() {
            self.left = DEFAULT_LEFT.to_string();
        }
        if self.right.is_empty() {
            self.right = DEFAULT_RIGHT.to_string();
        }
        if self.root.as_os_str().is_empty() {
            self.root = PathBuf::from(DEFAULT_ROOT);
        }
        if self.shared.is_empty() {
            self.shared = DEFAULT_SHARED.to_string();
        }
        self
    }

    /// Whether the block delimiters differ from MiniJinja's built-in ones.
    pub fn has_custom_delimiters(&self) -> bool {
        self.left != DEFAULT_LEFT || self.right != DEFAULT_RIGHT
    }
}
