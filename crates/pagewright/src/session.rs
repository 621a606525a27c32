//! Per-request composition state.
//!
//! A [`RenderSession`] is created for every top-level render and dropped when
//! it completes. It is the only channel between the body template, which runs
//! first, and the layout template, which runs afterward: helpers invoked by
//! the body (`title("...")`, `meta(...)`, `layout(...)`) write into the
//! session, and the same helpers invoked by the layout read it back.
//!
//! # Ownership
//!
//! Sessions are always handled through an `Arc`. The session's private
//! [`Engine`] carries the helper functions, and those helpers hold only a
//! `Weak` reference back to the session, so compiled templates cached inside
//! the session never keep it alive.
//!
//! # Locking
//!
//! State lives behind a mutex that is only held for short reads and writes.
//! It is never held while a template executes, so helpers called from nested
//! partials can always take it.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use minijinja::Value;
use tracing::debug;

use crate::config::ViewConfig;
use crate::engine::{CompiledTemplate, Engine};
use crate::helpers;
use crate::request::ViewRequest;
use crate::resolve::ResolveContext;
use crate::source::ViewSource;

/// Maximum nesting of `render()` calls within one session.
pub const MAX_RENDER_DEPTH: usize = 16;

/// Top-level progress of a session.
///
/// ```text
/// Created → BodyRendering → LayoutSelected → LayoutRendering → Done
///                         ↘ NoLayout ────────────────────────↗
/// ```
///
/// Nested partial renders do not change the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    BodyRendering,
    LayoutSelected,
    NoLayout,
    LayoutRendering,
    Done,
}

/// Single-valued head fields, last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadField {
    Title,
    Author,
    Keywords,
    Description,
}

/// Head-level metadata accumulated by helpers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadElements {
    pub title: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    /// Pre-rendered `<meta>` tags, in call order.
    pub metas: Vec<String>,
    /// Pre-rendered stylesheet `<link>` tags, in call order.
    pub styles: Vec<String>,
    /// Pre-rendered `<script>` tags, in call order.
    pub scripts: Vec<String>,
}

impl HeadElements {
    fn field_mut(&mut self, field: HeadField) -> &mut Option<String> {
        match field {
            HeadField::Title => &mut self.title,
            HeadField::Author => &mut self.author,
            HeadField::Keywords => &mut self.keywords,
            HeadField::Description => &mut self.description,
        }
    }

    /// Stored value of `field`, empty if unset.
    pub fn get(&self, field: HeadField) -> &str {
        let value = match field {
            HeadField::Title => &self.title,
            HeadField::Author => &self.author,
            HeadField::Keywords => &self.keywords,
            HeadField::Description => &self.description,
        };
        value.as_deref().unwrap_or_default()
    }
}

pub(crate) struct SessionState {
    pub(crate) phase: SessionPhase,
    pub(crate) layout: String,
    pub(crate) layout_model: Value,
    pub(crate) body: String,
    pub(crate) current_dir: Option<PathBuf>,
    pub(crate) head: HeadElements,
    pub(crate) compiled: HashMap<String, CompiledTemplate>,
    pub(crate) depth: usize,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: SessionPhase::Created,
            layout: String::new(),
            layout_model: empty_model(),
            body: String::new(),
            current_dir: None,
            head: HeadElements::default(),
            compiled: HashMap::new(),
            depth: 0,
        }
    }
}

/// Mutable state and private engine for one top-level render.
pub struct RenderSession {
    pub(crate) config: Arc<ViewConfig>,
    pub(crate) source: Arc<dyn ViewSource>,
    pub(crate) request: ViewRequest,
    pub(crate) engine: Engine,
    data: BTreeMap<String, Value>,
    state: Mutex<SessionState>,
}

impl RenderSession {
    /// Starts a session for `request`.
    ///
    /// The session's engine is a fork of `base` carrying the caller's helpers
    /// first and the composition helpers on top, so built-in names always win.
    pub fn start(
        config: Arc<ViewConfig>,
        base: &Engine,
        source: Arc<dyn ViewSource>,
        request: ViewRequest,
    ) -> Arc<Self> {
        Arc::new_cyclic(|session: &Weak<RenderSession>| {
            let mut engine = base.fork();
            for (name, helper) in &request.helpers {
                if helpers::HELPER_NAMES.contains(&name.as_str()) {
                    debug!(helper = %name, "caller helper shadowed by built-in");
                    continue;
                }
                engine.add_global(name.clone(), helper.clone());
            }
            helpers::register(&mut engine, session);

            let data = request
                .data
                .iter()
                .map(|(key, value)| (key.clone(), Value::from_serialize(value)))
                .collect();

            Self {
                config,
                source,
                request,
                engine,
                data,
                state: Mutex::new(SessionState::new()),
            }
        })
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The request this session renders.
    pub fn request(&self) -> &ViewRequest {
        &self.request
    }

    pub fn phase(&self) -> SessionPhase {
        self.state().phase
    }

    /// Selected layout name; empty when none was selected.
    pub fn layout_name(&self) -> String {
        self.state().layout.clone()
    }

    pub fn layout_model(&self) -> Value {
        self.state().layout_model.clone()
    }

    /// Output of the body phase; empty until it completes.
    pub fn body_output(&self) -> String {
        self.state().body.clone()
    }

    /// Directory the body template was found in.
    pub fn current_dir(&self) -> Option<PathBuf> {
        self.state().current_dir.clone()
    }

    /// Snapshot of the accumulated head elements.
    pub fn head(&self) -> HeadElements {
        self.state().head.clone()
    }

    /// Number of partials compiled so far.
    pub fn compiled_count(&self) -> usize {
        self.state().compiled.len()
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        self.state().phase = phase;
    }

    pub(crate) fn select_layout(&self, name: String, model: Value) {
        let mut state = self.state();
        state.layout = name;
        state.layout_model = model;
    }

    pub(crate) fn head_field(&self, field: HeadField) -> String {
        self.state().head.get(field).to_string()
    }

    pub(crate) fn set_head_field(&self, field: HeadField, value: String) {
        *self.state().head.field_mut(field) = Some(value);
    }

    pub(crate) fn push_meta(&self, tag: String) {
        self.state().head.metas.push(tag);
    }

    pub(crate) fn push_style(&self, tag: String) {
        self.state().head.styles.push(tag);
    }

    pub(crate) fn push_script(&self, tag: String) {
        self.state().head.scripts.push(tag);
    }

    /// Runs `f` with a resolution context reflecting the current directory.
    pub(crate) fn with_resolve_context<R>(&self, f: impl FnOnce(&ResolveContext<'_>) -> R) -> R {
        let current_dir = self.current_dir();
        let ctx = ResolveContext {
            root: &self.config.root,
            site: self.request.site.as_deref(),
            language: &self.request.language,
            shared: &self.config.shared,
            current_dir: current_dir.as_deref(),
        };
        f(&ctx)
    }

    /// Request data plus `model`, the variables every template sees.
    pub(crate) fn context(&self, model: Value) -> Value {
        let mut ctx = self.data.clone();
        ctx.insert("model".to_string(), model);
        Value::from(ctx)
    }
}

/// The empty mapping used when no model is supplied.
pub fn empty_model() -> Value {
    Value::from(BTreeMap::<String, Value>::new())
}
