//! Composition helpers exposed to templates.
//!
//! These functions are the only way a template can change the session it
//! renders in. Each is bound to one [`RenderSession`] through a `Weak`
//! reference captured at registration.
//!
//! ## Layout selection
//!
//! - `layout(name, model?)` - Wrap the body in layout `name`. The model may be
//!   a map or a JSON-encoded string. Last call wins.
//!
//! ## Head fields
//!
//! `title`, `author`, `keywords` and `description` share one contract: called
//! with a value they store it and output nothing; called without arguments
//! they output the stored value unescaped.
//!
//! ```jinja
//! {# body #}
//! {{ title("Orders") }}
//! {# layout #}
//! <title>{{ title() }}</title>
//! ```
//!
//! ## Head elements
//!
//! - `meta(name, content, http_equiv?)`, `style(href, media?)`,
//!   `script(src, type?)` - Append one element, output nothing.
//! - `metas()`, `styles()`, `scripts()` - Output the elements, one per line.
//!
//! ## Assembly
//!
//! - `body()` - The body output, for use inside layouts.
//! - `render(name, model?)` - Render a partial inline. Failures become a
//!   visible `render error: ...` string instead of aborting the page.

use std::sync::{Arc, Weak};

use minijinja::value::ValueKind;
use minijinja::{Error, ErrorKind, Value};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::Result;
use crate::session::{empty_model, HeadField, RenderSession};

/// Names of the built-in helpers, which caller helpers cannot override.
pub const HELPER_NAMES: &[&str] = &[
    "layout",
    "title",
    "author",
    "keywords",
    "description",
    "body",
    "render",
    "meta",
    "metas",
    "style",
    "styles",
    "script",
    "scripts",
];

/// Default `type` attribute for `script()`.
pub const DEFAULT_SCRIPT_TYPE: &str = "text/javascript";

/// Formats a `<meta>` element.
pub fn meta_tag(name: &str, content: &str, http_equiv: bool) -> String {
    if http_equiv {
        format!(r#"<meta http-equiv="{name}" content="{content}" />"#)
    } else {
        format!(r#"<meta name="{name}" content="{content}" />"#)
    }
}

/// Formats a stylesheet `<link>` element.
pub fn style_link(href: &str, media: Option<&str>) -> String {
    match media.filter(|m| !m.is_empty()) {
        Some(media) => {
            format!(r#"<link type="text/css" rel="stylesheet" href="{href}" media="{media}" />"#)
        }
        None => format!(r#"<link type="text/css" rel="stylesheet" href="{href}" />"#),
    }
}

/// Formats a `<script>` element.
pub fn script_tag(src: &str, script_type: Option<&str>) -> String {
    let script_type = script_type.unwrap_or(DEFAULT_SCRIPT_TYPE);
    format!(r#"<script type="{script_type}" src="{src}"></script>"#)
}

/// Interprets the optional model argument of `layout()`.
///
/// Maps are used as-is. Strings are decoded as JSON objects; anything that
/// fails to decode, like any other type, falls back to an empty mapping.
pub fn layout_model(model: Option<Value>) -> Value {
    let Some(model) = model else {
        return empty_model();
    };
    if model.kind() == ValueKind::Map {
        return model;
    }
    match model.as_str() {
        Some(text) => decode_model(text).unwrap_or_else(|err| {
            debug!(%err, "ignoring undecodable layout model");
            empty_model()
        }),
        None => empty_model(),
    }
}

fn decode_model(text: &str) -> Result<Value> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
    Ok(Value::from_serialize(&map))
}

fn upgrade(session: &Weak<RenderSession>) -> std::result::Result<Arc<RenderSession>, Error> {
    session
        .upgrade()
        .ok_or_else(|| Error::new(ErrorKind::InvalidOperation, "render session has ended"))
}

fn nothing() -> Value {
    Value::from("")
}

/// Registers every composition helper on `engine`, bound to `session`.
pub(crate) fn register(engine: &mut Engine, session: &Weak<RenderSession>) {
    let s = session.clone();
    engine.add_global(
        "layout",
        Value::from_function(
            move |name: String, model: Option<Value>| -> std::result::Result<Value, Error> {
                let session = upgrade(&s)?;
                debug!(layout = %name, "layout selected");
                session.select_layout(name, layout_model(model));
                Ok(nothing())
            },
        ),
    );

    register_head_field(engine, session, "title", HeadField::Title);
    register_head_field(engine, session, "author", HeadField::Author);
    register_head_field(engine, session, "keywords", HeadField::Keywords);
    register_head_field(engine, session, "description", HeadField::Description);

    let s = session.clone();
    engine.add_global(
        "body",
        Value::from_function(move || -> std::result::Result<Value, Error> {
            let session = upgrade(&s)?;
            Ok(Value::from_safe_string(session.body_output()))
        }),
    );

    let s = session.clone();
    engine.add_global(
        "render",
        Value::from_function(
            move |name: String, model: Option<Value>| -> std::result::Result<Value, Error> {
                let session = upgrade(&s)?;
                match session.render(&name, model) {
                    Ok(html) => Ok(Value::from_safe_string(html)),
                    Err(err) => {
                        warn!(partial = %name, %err, "partial render failed");
                        // Plain string, so it is escaped like any other output.
                        Ok(Value::from(format!("render error: {err}")))
                    }
                }
            },
        ),
    );

    let s = session.clone();
    engine.add_global(
        "meta",
        Value::from_function(
            move |name: String,
                  content: String,
                  http_equiv: Option<bool>|
                  -> std::result::Result<Value, Error> {
                let session = upgrade(&s)?;
                session.push_meta(meta_tag(&name, &content, http_equiv.unwrap_or(false)));
                Ok(nothing())
            },
        ),
    );

    let s = session.clone();
    engine.add_global(
        "style",
        Value::from_function(
            move |href: String, media: Option<String>| -> std::result::Result<Value, Error> {
                let session = upgrade(&s)?;
                session.push_style(style_link(&href, media.as_deref()));
                Ok(nothing())
            },
        ),
    );

    let s = session.clone();
    engine.add_global(
        "script",
        Value::from_function(
            move |src: String, script_type: Option<String>| -> std::result::Result<Value, Error> {
                let session = upgrade(&s)?;
                session.push_script(script_tag(&src, script_type.as_deref()));
                Ok(nothing())
            },
        ),
    );

    // Listing helpers: newline-joined, unescaped.
    let s = session.clone();
    engine.add_global(
        "metas",
        Value::from_function(move || -> std::result::Result<Value, Error> {
            let session = upgrade(&s)?;
            Ok(Value::from_safe_string(session.head().metas.join("\n")))
        }),
    );

    let s = session.clone();
    engine.add_global(
        "styles",
        Value::from_function(move || -> std::result::Result<Value, Error> {
            let session = upgrade(&s)?;
            Ok(Value::from_safe_string(session.head().styles.join("\n")))
        }),
    );

    let s = session.clone();
    engine.add_global(
        "scripts",
        Value::from_function(move || -> std::result::Result<Value, Error> {
            let session = upgrade(&s)?;
            Ok(Value::from_safe_string(session.head().scripts.join("\n")))
        }),
    );
}

fn register_head_field(
    engine: &mut Engine,
    session: &Weak<RenderSession>,
    name: &'static str,
    field: HeadField,
) {
    let s = session.clone();
    engine.add_global(
        name,
        Value::from_function(
            move |value: Option<String>| -> std::result::Result<Value, Error> {
                let session = upgrade(&s)?;
                match value {
                    Some(value) => {
                        session.set_head_field(field, value);
                        Ok(nothing())
                    }
                    None => Ok(Value::from_safe_string(session.head_field(field))),
                }
            },
        ),
    );
}
