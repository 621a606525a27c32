//! The three render phases.
//!
//! A page is produced in strictly sequential phases over one
//! [`RenderSession`]:
//!
//! 1. **Body**: resolve, compile and execute the requested view. Helpers
//!    called along the way record head elements and may select a layout.
//!    The directory the view came from becomes the session's current
//!    directory.
//! 2. **Layout**: if a layout was selected, resolve it (current directory
//!    first) and execute it with the layout model. It reads the body output
//!    and head elements back through the same helpers. Without a layout the
//!    body output is the page.
//! 3. **Render**: on demand, whenever a template calls `render()`. Partials
//!    are compiled once per session and re-executed per call.
//!
//! Body and layout failures abort the page. Partial failures are reported
//! inline by the `render` helper.

use std::path::PathBuf;

use minijinja::Value;
use tracing::{debug, debug_span};

use crate::error::{Result, ViewError};
use crate::resolve::{self, Lookup, ResolvedTemplate, TemplateKind};
use crate::session::{empty_model, RenderSession, SessionPhase, MAX_RENDER_DEPTH};

impl RenderSession {
    /// Runs body and layout phases for the session's request.
    ///
    /// A session runs once; a second call fails with
    /// [`ViewError::OutOfOrder`] and leaves the session untouched.
    pub fn run(&self) -> Result<String> {
        let model = self
            .request
            .model
            .as_ref()
            .map(Value::from_serialize)
            .unwrap_or_else(|| Value::from(()));
        let view = self.request.view.clone();
        self.body(&view, model)?;
        self.layout()
    }

    /// Body phase: renders `name` and records its output and directory.
    pub fn body(&self, name: &str, model: Value) -> Result<String> {
        let _span = debug_span!("body", view = %short(name)).entered();
        self.advance("body", &[SessionPhase::Created], SessionPhase::BodyRendering)?;

        let resolved = self.resolve(TemplateKind::Body, name)?;
        if let Some(dir) = resolved.dir() {
            self.state().current_dir = Some(dir.to_path_buf());
        }

        let compiled = self.engine.fork().compile(&resolved.name, &resolved.source)?;
        let output = compiled.execute(self.context(model))?;

        let mut state = self.state();
        state.body = output.clone();
        state.phase = if state.layout.is_empty() {
            SessionPhase::NoLayout
        } else {
            SessionPhase::LayoutSelected
        };
        Ok(output)
    }

    /// Layout phase: wraps the body output in the selected layout.
    ///
    /// Returns the body output unchanged when no layout was selected.
    pub fn layout(&self) -> Result<String> {
        let (name, model) = {
            let state = self.state();
            (state.layout.clone(), state.layout_model.clone())
        };

        if name.is_empty() {
            debug!("no layout selected");
            self.advance("layout", &[SessionPhase::NoLayout], SessionPhase::Done)?;
            return Ok(self.body_output());
        }

        let _span = debug_span!("layout", layout = %short(&name)).entered();
        self.advance(
            "layout",
            &[SessionPhase::LayoutSelected],
            SessionPhase::LayoutRendering,
        )?;

        let resolved = self.resolve(TemplateKind::Layout, &name)?;
        let compiled = self.engine.fork().compile(&resolved.name, &resolved.source)?;
        let output = compiled.execute(self.context(model))?;

        self.set_phase(SessionPhase::Done);
        Ok(output)
    }

    /// Partial render phase.
    ///
    /// File-backed partials are looked up in the session cache by resolved
    /// path before anything is read, so each is read and compiled at most
    /// once per session. `model` defaults to an empty mapping.
    pub fn render(&self, name: &str, model: Option<Value>) -> Result<String> {
        let _depth = DepthGuard::enter(self, name)?;
        let _span = debug_span!("render", partial = %short(name)).entered();

        let compiled = match self.lookup(TemplateKind::Partial, name)? {
            Lookup::Inline { name, source } => self.engine.fork().compile(&name, &source)?,
            Lookup::File(path) => {
                let key = path.to_string_lossy().into_owned();
                let cached = self.state().compiled.get(&key).cloned();
                match cached {
                    Some(compiled) => {
                        debug!(path = %key, "partial cache hit");
                        compiled
                    }
                    None => {
                        debug!(path = %key, "partial cache miss");
                        let resolved = ResolvedTemplate::load(Lookup::File(path), &*self.source)?;
                        let compiled =
                            self.engine.fork().compile(&resolved.name, &resolved.source)?;
                        self.state().compiled.insert(key, compiled.clone());
                        compiled
                    }
                }
            }
        };

        compiled.execute(self.context(model.unwrap_or_else(empty_model)))
    }

    /// Moves to `next` if the session is in one of `allowed`; sessions only
    /// ever move forward.
    fn advance(
        &self,
        operation: &'static str,
        allowed: &[SessionPhase],
        next: SessionPhase,
    ) -> Result<()> {
        let mut state = self.state();
        if !allowed.contains(&state.phase) {
            return Err(ViewError::OutOfOrder {
                operation,
                phase: state.phase,
            });
        }
        state.phase = next;
        Ok(())
    }

    fn lookup(&self, kind: TemplateKind, name: &str) -> Result<Lookup> {
        self.with_resolve_context(|ctx| resolve::lookup(kind, name, ctx, &*self.source))
    }

    fn resolve(&self, kind: TemplateKind, name: &str) -> Result<ResolvedTemplate> {
        let found = self.lookup(kind, name)?;
        ResolvedTemplate::load(found, &*self.source)
    }

    /// Paths of the partials compiled so far, in no particular order.
    pub fn compiled_partials(&self) -> Vec<PathBuf> {
        self.state().compiled.keys().map(PathBuf::from).collect()
    }
}

/// Tracks `render()` nesting; decrements on drop.
struct DepthGuard<'a> {
    session: &'a RenderSession,
}

impl<'a> DepthGuard<'a> {
    fn enter(session: &'a RenderSession, name: &str) -> Result<Self> {
        let mut state = session.state();
        if state.depth >= MAX_RENDER_DEPTH {
            return Err(ViewError::RenderDepth {
                name: short(name).to_string(),
                limit: MAX_RENDER_DEPTH,
            });
        }
        state.depth += 1;
        Ok(Self { session })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.session.state().depth -= 1;
    }
}

/// First line of a name, so inline sources stay readable in logs and errors.
fn short(name: &str) -> &str {
    name.lines().next().unwrap_or_default()
}
