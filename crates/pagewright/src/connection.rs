//! Host-facing entry point.

use std::sync::Arc;

use tracing::info_span;

use crate::config::ViewConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::request::ViewRequest;
use crate::session::RenderSession;
use crate::source::{FsSource, ViewSource};

/// Load report for a connection. This engine holds no per-request resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Health {
    pub workload: u64,
}

/// A configured view engine.
///
/// A connection is immutable once created and can be shared across threads;
/// every [`parse`](Self::parse) call gets its own [`RenderSession`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use pagewright::source::MemorySource;
/// use pagewright::{Connection, ViewConfig, ViewRequest};
///
/// let source = MemorySource::new()
///     .with_file("views/en/home.html", r#"{{ title("Home") }}{{ layout("main") }}Welcome"#)
///     .with_file("views/main.html", "<title>{{ title() }}</title>{{ body() }}");
///
/// let conn = Connection::with_source(ViewConfig::new().root("views"), Arc::new(source)).unwrap();
/// let html = conn.parse(&ViewRequest::new("home").language("en")).unwrap();
/// assert_eq!(html, "<title>Home</title>Welcome");
/// ```
#[derive(Clone)]
pub struct Connection {
    config: Arc<ViewConfig>,
    engine: Engine,
    source: Arc<dyn ViewSource>,
}

impl Connection {
    /// Creates a connection reading templates from the filesystem.
    pub fn connect(config: ViewConfig) -> Result<Self> {
        Self::with_source(config, Arc::new(FsSource))
    }

    /// Creates a connection reading templates from `source`.
    ///
    /// Empty configuration fields receive their defaults here, once.
    pub fn with_source(config: ViewConfig, source: Arc<dyn ViewSource>) -> Result<Self> {
        let config = config.normalized();
        let engine = Engine::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            engine,
            source,
        })
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    /// No-op; the engine holds no resources between requests.
    pub fn open(&self) -> Result<()> {
        Ok(())
    }

    pub fn health(&self) -> Result<Health> {
        Ok(Health::default())
    }

    /// No-op; see [`open`](Self::open).
    pub fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Starts a session without running it, for phase-by-phase control.
    ///
    /// Each session runs once; phases started out of order fail with
    /// [`ViewError::OutOfOrder`](crate::ViewError::OutOfOrder).
    pub fn session(&self, request: ViewRequest) -> Arc<RenderSession> {
        RenderSession::start(
            Arc::clone(&self.config),
            &self.engine,
            Arc::clone(&self.source),
            request,
        )
    }

    /// Renders `request` into a complete page.
    ///
    /// # Errors
    ///
    /// Fails if the body or selected layout cannot be resolved, read,
    /// compiled or executed. Partial failures do not fail the page.
    pub fn parse(&self, request: &ViewRequest) -> Result<String> {
        let _span = info_span!(
            "parse",
            view = %request.view.lines().next().unwrap_or_default(),
            language = %request.language,
            site = request.site.as_deref().unwrap_or_default(),
        )
        .entered();

        self.session(request.clone()).run()
    }
}
