//! Template compilation and execution.
//!
//! [`Engine`] wraps a MiniJinja [`Environment`] configured with the
//! connection's delimiters and any registered helpers. It is never compiled
//! into directly: each template is compiled into a private [`fork`](Engine::fork)
//! of the engine, which yields a self-contained [`CompiledTemplate`]. Forking
//! is the isolation boundary between render sessions; two sessions never
//! register templates in the same environment.

use std::fmt;
use std::sync::Arc;

use minijinja::syntax::SyntaxConfig;
use minijinja::{Environment, Value};

use crate::config::ViewConfig;
use crate::error::{Result, ViewError};

/// A configured, helper-carrying template environment.
///
/// # Example
///
/// ```rust
/// use pagewright::engine::Engine;
/// use pagewright::ViewConfig;
/// use minijinja::context;
///
/// let engine = Engine::new(&ViewConfig::default()).unwrap();
/// let page = engine.fork().compile("hello", "Hello, {{ name }}!").unwrap();
/// assert_eq!(page.execute(context! { name => "World" }).unwrap(), "Hello, World!");
/// ```
#[derive(Clone)]
pub struct Engine {
    env: Environment<'static>,
}

impl Engine {
    /// Creates an engine using the configured block delimiters.
    ///
    /// Undefined variables render as empty; calling an unknown function is
    /// an execution error.
    ///
    /// # Errors
    ///
    /// Returns [`ViewError::Config`] if the delimiters cannot be used, for
    /// example when they collide with the `{{ }}` expression markers.
    pub fn new(config: &ViewConfig) -> Result<Self> {
        let mut env = Environment::new();

        if config.has_custom_delimiters() {
            let syntax = SyntaxConfig::builder()
                .block_delimiters(config.left.clone(), config.right.clone())
                .build()
                .map_err(|err| ViewError::Config {
                    detail: err.to_string(),
                })?;
            env.set_syntax(syntax);
        }

        Ok(Self { env })
    }

    /// Returns an independent copy sharing nothing mutable with `self`.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Makes `value` visible to templates under `name`.
    ///
    /// Callable values become template functions. A later registration under
    /// the same name replaces the earlier one.
    pub fn add_global(&mut self, name: impl Into<String>, value: Value) {
        self.env.add_global(name.into(), value);
    }

    /// Compiles `source` under `name`, consuming this fork.
    pub fn compile(mut self, name: &str, source: &str) -> Result<CompiledTemplate> {
        self.env
            .add_template_owned(name.to_string(), source.to_string())
            .map_err(|err| ViewError::syntax(name, err))?;
        Ok(CompiledTemplate {
            env: Arc::new(self.env),
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

/// A compiled template that can be executed any number of times.
///
/// Cloning is cheap; clones share the compiled form.
#[derive(Clone)]
pub struct CompiledTemplate {
    env: Arc<Environment<'static>>,
    name: String,
}

impl CompiledTemplate {
    /// Name the template was compiled under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executes the template against `ctx`.
    pub fn execute(&self, ctx: Value) -> Result<String> {
        let template = self
            .env
            .get_template(&self.name)
            .map_err(|err| ViewError::execution(&self.name, err))?;
        template
            .render(ctx)
            .map_err(|err| ViewError::execution(&self.name, err))
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
