//! # Pagewright - Server-Side Page Composition
//!
//! `pagewright` assembles HTML pages from a body view, an optional layout and
//! any number of partials, looked up through a cascade of site, language and
//! shared template directories. Templates are MiniJinja.
//!
//! ## Core Concepts
//!
//! - [`Connection`]: A configured engine; call [`Connection::parse`] per page
//! - [`ViewRequest`]: The view to render, its language/site and data
//! - [`RenderSession`]: Mutable per-page state shared by body and layout
//! - [`resolve`]: The candidate cascade that maps names to files
//! - [`helpers`]: Template functions that drive composition
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use pagewright::source::MemorySource;
//! use pagewright::{Connection, ViewConfig, ViewRequest};
//!
//! let source = MemorySource::new()
//!     .with_file(
//!         "views/en/orders.html",
//!         r#"{{ title("Orders") }}{{ style("/orders.css") }}{{ layout("page") }}<ul>{{ render("row", {"id": 7}) }}</ul>"#,
//!     )
//!     .with_file("views/en/row.html", "<li>#{{ model.id }}</li>")
//!     .with_file(
//!         "views/shared/page.html",
//!         "<title>{{ title() }}</title>{{ styles() }}<main>{{ body() }}</main>",
//!     );
//!
//! let conn = Connection::with_source(ViewConfig::new().root("views"), Arc::new(source)).unwrap();
//! let html = conn.parse(&ViewRequest::new("orders").language("en")).unwrap();
//! assert_eq!(
//!     html,
//!     r#"<title>Orders</title><link type="text/css" rel="stylesheet" href="/orders.css" /><main><ul><li>#7</li></ul></main>"#
//! );
//! ```
//!
//! ## Render Phases
//!
//! 1. **Body** runs first. Helpers it calls record head elements and may pick
//!    a layout with `layout(name, model?)`.
//! 2. **Layout** runs only if one was picked, reading back `title()`,
//!    `metas()`, `styles()`, `scripts()` and `body()`.
//! 3. **Render** runs on demand for every `render(name, model?)` call.
//!    Partials are compiled once per page and can be included any number of
//!    times.
//!
//! Body and layout failures fail the page. A failing partial is replaced by
//! a visible `render error: ...` message and the page still completes.
//!
//! ## Template Resolution
//!
//! Names are tried from most to least specific: site and language first,
//! then language, site, shared directories and finally the root. Layouts and
//! partials first look next to the body template. See [`resolve`] for the
//! full cascade. A name containing a newline is treated as template source.
//!
//! ## Configuration
//!
//! [`ViewConfig`] sets the block delimiters (MiniJinja's `{% %}` by default),
//! the template root and the shared directory name. It can be loaded from
//! YAML or JSON.

pub mod config;
mod connection;
pub mod engine;
pub mod error;
pub mod helpers;
mod pipeline;
mod request;
pub mod resolve;
pub mod session;
pub mod source;

pub use config::ViewConfig;
pub use connection::{Connection, Health};
pub use engine::{CompiledTemplate, Engine};
pub use error::{Result, ViewError};
pub use request::ViewRequest;
pub use resolve::{candidates, Lookup, ResolveContext, ResolvedTemplate, TemplateKind};
pub use session::{HeadElements, HeadField, RenderSession, SessionPhase};
pub use source::{FileKind, FsSource, MemorySource, ViewSource};
