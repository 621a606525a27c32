//! Cascading template path resolution.
//!
//! A logical view name such as `"users/list"` can live in many places: under
//! a site and language, in a shared directory, or at the global root. This
//! module turns a name into an ordered list of candidate paths, most specific
//! first, and picks the first one that exists.
//!
//! # Design
//!
//! Resolution is split in two:
//!
//! 1. [`candidates`] is a pure function from `(kind, name, context)` to the
//!    ordered candidate list. It never touches storage.
//! 2. [`lookup`] walks that list against a [`ViewSource`] and returns the
//!    first regular file.
//!
//! # Precedence
//!
//! Specificity cascades from site and language down to the global root.
//! Layouts and partials additionally try the directory the body was found in
//! first, so templates placed next to a view override shared ones:
//!
//! | Body | Layout / Partial |
//! |------|------------------|
//! | | `current_dir/name.html` |
//! | `root/site/lang/name.html` | `root/site/lang/name.html` |
//! | `root/site/shared/lang/name.html` | `root/site/lang/shared/name.html` |
//! | `root/lang/name.html` (+ `name/index.html`) | `root/lang/name.html` |
//! | `root/lang/shared/name.html` (+ index) | `root/lang/shared/name.html` |
//! | `root/site/name.html` (+ index) | `root/site/name.html` |
//! | `root/site/shared/name.html` | `root/site/shared/name.html` |
//! | `root/name.html` (+ index) | `root/shared/name.html` |
//! | `root/shared/name.html` (+ index) | `root/name.html` |
//!
//! Site rows are only generated when a site is set.
//!
//! # Inline Sources
//!
//! A name containing a newline is template source, not a path. It skips
//! resolution entirely and receives a generated unique name.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Result, ViewError};
use crate::source::ViewSource;

/// Suffix appended to every logical name.
pub const TEMPLATE_EXTENSION: &str = ".html";

/// File used for directory-style body views.
pub const INDEX_FILE: &str = "index.html";

/// Which pipeline phase a lookup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKind {
    Body,
    Layout,
    Partial,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TemplateKind::Body => "view",
            TemplateKind::Layout => "layout",
            TemplateKind::Partial => "partial",
        };
        f.write_str(label)
    }
}

/// Request-level inputs to the cascade.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub root: &'a Path,
    pub site: Option<&'a str>,
    pub language: &'a str,
    pub shared: &'a str,
    /// Directory the body template was found in, if any.
    pub current_dir: Option<&'a Path>,
}

/// Outcome of a successful lookup, before any content is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Inline source under a generated name.
    Inline { name: String, source: String },
    /// An existing template file.
    File(PathBuf),
}

impl Lookup {
    /// The name the template is compiled under.
    pub fn name(&self) -> String {
        match self {
            Lookup::Inline { name, .. } => name.clone(),
            Lookup::File(path) => path.to_string_lossy().into_owned(),
        }
    }
}

/// A template paired with its source text, ready to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub name: String,
    pub path: Option<PathBuf>,
    pub source: String,
}

impl ResolvedTemplate {
    /// Reads the content behind a lookup.
    pub fn load(lookup: Lookup, source: &dyn ViewSource) -> Result<Self> {
        match lookup {
            Lookup::Inline { name, source } => Ok(Self {
                name,
                path: None,
                source,
            }),
            Lookup::File(path) => {
                let text = source
                    .read(&path)
                    .map_err(|err| ViewError::ReadFailure {
                        path: path.clone(),
                        source: err,
                    })?;
                Ok(Self {
                    name: path.to_string_lossy().into_owned(),
                    path: Some(path),
                    source: text,
                })
            }
        }
    }

    /// Directory containing the template file; `None` for inline sources.
    pub fn dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }
}

/// Whether `name` is inline template source rather than a view name.
pub fn is_inline(name: &str) -> bool {
    name.contains('\n')
}

/// Generates a unique name for an inline template.
///
/// The `.html` suffix keeps auto-escaping consistent with file templates.
pub fn inline_name() -> String {
    format!("inline-{}{}", uuid::Uuid::new_v4(), TEMPLATE_EXTENSION)
}

/// Builds the ordered candidate list for `name`.
///
/// Duplicates (possible when the language is empty) are dropped, keeping the
/// first occurrence.
pub fn candidates(kind: TemplateKind, name: &str, ctx: &ResolveContext<'_>) -> Vec<PathBuf> {
    let name = name.trim_start_matches('/');
    let file = format!("{name}{TEMPLATE_EXTENSION}");
    let lang = ctx.language;
    let shared = ctx.shared;

    let mut out = Cascade::new(ctx.root);
    match kind {
        TemplateKind::Body => {
            if let Some(site) = ctx.site {
                out.push(&[site, lang], &file);
                out.push(&[site, shared, lang], &file);
            }
            out.push_with_index(&[lang], name);
            out.push_with_index(&[lang, shared], name);
            if let Some(site) = ctx.site {
                out.push_with_index(&[site], name);
                out.push(&[site, shared], &file);
            }
            out.push_with_index(&[], name);
            out.push_with_index(&[shared], name);
        }
        TemplateKind::Layout | TemplateKind::Partial => {
            if let Some(dir) = ctx.current_dir {
                out.push_path(dir.join(&file));
            }
            if let Some(site) = ctx.site {
                out.push(&[site, lang], &file);
                out.push(&[site, lang, shared], &file);
            }
            out.push(&[lang], &file);
            out.push(&[lang, shared], &file);
            if let Some(site) = ctx.site {
                out.push(&[site], &file);
                out.push(&[site, shared], &file);
            }
            out.push(&[shared], &file);
            out.push(&[], &file);
        }
    }
    out.finish()
}

/// Finds the template for `name`.
///
/// Inline sources never touch `source`. Otherwise the first candidate that is
/// a regular file wins.
pub fn lookup(
    kind: TemplateKind,
    name: &str,
    ctx: &ResolveContext<'_>,
    source: &dyn ViewSource,
) -> Result<Lookup> {
    if is_inline(name) {
        let generated = inline_name();
        debug!(%kind, name = %generated, "using inline template source");
        return Ok(Lookup::Inline {
            name: generated,
            source: name.to_string(),
        });
    }

    for candidate in candidates(kind, name, ctx) {
        trace!(%kind, path = %candidate.display(), "probing template candidate");
        if source.is_file(&candidate) {
            debug!(%kind, name, path = %candidate.display(), "resolved template");
            return Ok(Lookup::File(candidate));
        }
    }

    Err(ViewError::ViewNotFound {
        kind,
        name: name.to_string(),
    })
}

/// Looks up and reads `name` in one step.
pub fn resolve(
    kind: TemplateKind,
    name: &str,
    ctx: &ResolveContext<'_>,
    source: &dyn ViewSource,
) -> Result<ResolvedTemplate> {
    let found = lookup(kind, name, ctx, source)?;
    ResolvedTemplate::load(found, source)
}

/// Ordered, de-duplicated candidate accumulator.
struct Cascade<'a> {
    root: &'a Path,
    paths: Vec<PathBuf>,
}

impl<'a> Cascade<'a> {
    fn new(root: &'a Path) -> Self {
        Self {
            root,
            paths: Vec::new(),
        }
    }

    fn dir(&self, segments: &[&str]) -> PathBuf {
        segments
            .iter()
            .filter(|segment| !segment.is_empty())
            .fold(self.root.to_path_buf(), |dir, segment| dir.join(segment))
    }

    fn push(&mut self, segments: &[&str], file: &str) {
        let path = self.dir(segments).join(file);
        self.push_path(path);
    }

    /// Pushes `dir/name.html` followed by `dir/name/index.html`.
    fn push_with_index(&mut self, segments: &[&str], name: &str) {
        let dir = self.dir(segments);
        self.push_path(dir.join(format!("{name}{TEMPLATE_EXTENSION}")));
        self.push_path(dir.join(name).join(INDEX_FILE));
    }

    fn push_path(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    fn finish(self) -> Vec<PathBuf> {
        self.paths
    }
}
