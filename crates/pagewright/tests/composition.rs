//! End-to-end composition tests.
//!
//! These run full `parse` calls against in-memory trees (when read counts
//! matter) and real temporary directories (to cover the filesystem source).

use std::path::Path;
use std::sync::Arc;

use minijinja::Value;
use pagewright::{Connection, MemorySource, TemplateKind, ViewConfig, ViewError, ViewRequest};
use serde_json::json;
use tempfile::TempDir;

fn memory_connection(source: MemorySource) -> (Connection, Arc<MemorySource>) {
    let source = Arc::new(source);
    let conn = Connection::with_source(ViewConfig::new().root("views"), source.clone()).unwrap();
    (conn, source)
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

// ============================================================================
// Body / layout composition
// ============================================================================

#[test]
fn body_feeds_title_and_meta_into_layout() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file(
                "views/page.html",
                r#"{{ title("Hi") }}{{ meta("x", "y") }}{{ layout("main") }}body-text"#,
            )
            .with_file(
                "views/main.html",
                "<title>{{ title() }}</title>{{ metas() }}{{ body() }}",
            ),
    );

    let html = conn.parse(&ViewRequest::new("page")).unwrap();
    assert_eq!(html, r#"<title>Hi</title><meta name="x" content="y" />body-text"#);
}

#[test]
fn no_layout_returns_body_unchanged() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/plain.html", "<p>{{ greeting }}</p>"),
    );
    let request = ViewRequest::new("plain").insert("greeting", json!("hello"));
    assert_eq!(conn.parse(&request).unwrap(), "<p>hello</p>");
}

#[test]
fn missing_layout_is_fatal() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/page.html", r#"{{ layout("missing") }}text"#),
    );

    let err = conn.parse(&ViewRequest::new("page")).unwrap_err();
    match err {
        ViewError::ViewNotFound { kind, name } => {
            assert_eq!(kind, TemplateKind::Layout);
            assert_eq!(name, "missing");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn missing_body_is_fatal() {
    let (conn, _) = memory_connection(MemorySource::new());
    let err = conn.parse(&ViewRequest::new("nowhere")).unwrap_err();
    assert!(err.is_not_found(TemplateKind::Body));
}

#[test]
fn title_is_empty_until_set_and_last_write_wins() {
    let (conn, _) = memory_connection(MemorySource::new().with_file(
        "views/page.html",
        r#"[{{ title() }}]{{ title("Home") }}[{{ title() }}]{{ title("About") }}[{{ title() }}]"#,
    ));
    assert_eq!(
        conn.parse(&ViewRequest::new("page")).unwrap(),
        "[][Home][About]"
    );
}

#[test]
fn head_fields_are_not_escaped() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file(
                "views/page.html",
                r#"{{ description("Fish & Chips") }}{{ layout("main") }}"#,
            )
            .with_file("views/main.html", "{{ description() }}|{{ author() }}"),
    );
    assert_eq!(conn.parse(&ViewRequest::new("page")).unwrap(), "Fish & Chips|");
}

#[test]
fn last_layout_call_wins() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file(
                "views/page.html",
                r#"{{ layout("first") }}{{ layout("second", {"tag": "b"}) }}x"#,
            )
            .with_file("views/first.html", "first")
            .with_file("views/second.html", "{{ model.tag }}:{{ body() }}"),
    );
    assert_eq!(conn.parse(&ViewRequest::new("page")).unwrap(), "b:x");
}

#[test]
fn layout_model_from_json_string() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file(
                "views/page.html",
                r#"{{ layout("main", '{"section": "news"}') }}x"#,
            )
            .with_file("views/main.html", "{{ model.section }}"),
    );
    assert_eq!(conn.parse(&ViewRequest::new("page")).unwrap(), "news");
}

#[test]
fn malformed_layout_model_degrades_to_empty() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file("views/page.html", r#"{{ layout("main", "{not json") }}x"#)
            .with_file("views/main.html", "{{ model | length }}:{{ body() }}"),
    );
    assert_eq!(conn.parse(&ViewRequest::new("page")).unwrap(), "0:x");
}

#[test]
fn styles_and_scripts_accumulate_in_order() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file(
                "views/page.html",
                concat!(
                    r#"{{ style("/a.css") }}{{ style("/p.css", "print") }}"#,
                    r#"{{ script("/a.js") }}{{ script("/m.js", "module") }}"#,
                    r#"{{ meta("refresh", "5", true) }}{{ layout("main") }}"#,
                ),
            )
            .with_file("views/main.html", "{{ styles() }}\n{{ scripts() }}\n{{ metas() }}"),
    );

    let html = conn.parse(&ViewRequest::new("page")).unwrap();
    assert_eq!(
        html,
        concat!(
            r#"<link type="text/css" rel="stylesheet" href="/a.css" />"#,
            "\n",
            r#"<link type="text/css" rel="stylesheet" href="/p.css" media="print" />"#,
            "\n",
            r#"<script type="text/javascript" src="/a.js"></script>"#,
            "\n",
            r#"<script type="module" src="/m.js"></script>"#,
            "\n",
            r#"<meta http-equiv="refresh" content="5" />"#,
        )
    );
}

#[test]
fn body_model_and_data_are_visible() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/page.html", "{{ site_name }}/{{ model.id }}"),
    );
    let request = ViewRequest::new("page")
        .insert("site_name", json!("acme"))
        .model(json!({ "id": 9 }));
    assert_eq!(conn.parse(&request).unwrap(), "acme/9");
}

#[test]
fn inline_body_and_layout() {
    let (conn, source) = memory_connection(MemorySource::new());
    let request = ViewRequest::new("{{ layout(wrapper) }}\ninline")
        .insert("wrapper", json!("\n<b>{{ body() }}</b>"));
    assert_eq!(conn.parse(&request).unwrap(), "\n<b>\ninline</b>");
    assert_eq!(source.total_reads(), 0);
}

#[test]
fn body_syntax_error_is_fatal() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/page.html", "{% if %}"),
    );
    let err = conn.parse(&ViewRequest::new("page")).unwrap_err();
    assert!(matches!(err, ViewError::TemplateSyntax { .. }));
}

#[test]
fn layout_execution_error_is_fatal() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file("views/page.html", r#"{{ layout("main") }}"#)
            .with_file("views/main.html", "{{ no_such_function() }}"),
    );
    let err = conn.parse(&ViewRequest::new("page")).unwrap_err();
    assert!(matches!(err, ViewError::Execution { .. }));
}

// ============================================================================
// Helpers supplied by the caller
// ============================================================================

#[test]
fn caller_helpers_are_callable() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/page.html", r#"{{ shout("hey") }}"#),
    );
    let request = ViewRequest::new("page")
        .helper("shout", Value::from_function(|s: String| s.to_uppercase()));
    assert_eq!(conn.parse(&request).unwrap(), "HEY");
}

#[test]
fn builtin_helpers_win_over_caller_helpers() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/page.html", r#"{{ title("Real") }}[{{ title() }}]"#),
    );
    let request = ViewRequest::new("page")
        .helper("title", Value::from_function(|| "fake".to_string()));
    assert_eq!(conn.parse(&request).unwrap(), "[Real]");
}

// ============================================================================
// Partials
// ============================================================================

#[test]
fn partial_rendered_twice_is_read_once() {
    let (conn, source) = memory_connection(
        MemorySource::new()
            .with_file(
                "views/list.html",
                r#"{{ render("partial", {"n": "a"}) }}|{{ render("partial", {"n": "b"}) }}"#,
            )
            .with_file("views/partial.html", "<i>{{ model.n }}</i>"),
    );

    let html = conn.parse(&ViewRequest::new("list")).unwrap();
    assert_eq!(html, "<i>a</i>|<i>b</i>");
    assert_eq!(source.read_count("views/partial.html"), 1);
}

#[test]
fn partial_cache_is_per_session() {
    let (conn, source) = memory_connection(
        MemorySource::new()
            .with_file("views/list.html", r#"{{ render("partial") }}"#)
            .with_file("views/partial.html", "p"),
    );

    conn.parse(&ViewRequest::new("list")).unwrap();
    conn.parse(&ViewRequest::new("list")).unwrap();
    assert_eq!(source.read_count("views/partial.html"), 2);
}

#[test]
fn missing_partial_renders_inline_error() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/page.html", r#"before {{ render("bad") }} after"#),
    );

    let html = conn.parse(&ViewRequest::new("page")).unwrap();
    assert!(html.starts_with("before render error:"), "got: {html}");
    assert!(html.ends_with(" after"));
}

#[test]
fn inline_render_error_is_escaped() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/page.html", r#"{{ render("a/bad") }}"#),
    );
    assert_eq!(
        conn.parse(&ViewRequest::new("page")).unwrap(),
        "render error: partial `a&#x2f;bad` not found"
    );
}

#[test]
fn broken_partial_does_not_fail_layout() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file("views/page.html", r#"{{ layout("main") }}ok"#)
            .with_file("views/main.html", r#"{{ body() }}|{{ render("broken") }}"#)
            .with_file("views/broken.html", "{% for %}"),
    );

    let html = conn.parse(&ViewRequest::new("page")).unwrap();
    assert!(html.starts_with("ok|render error:"), "got: {html}");
}

#[test]
fn partials_can_set_head_fields_for_layout() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file("views/page.html", r#"{{ render("seo") }}{{ layout("main") }}x"#)
            .with_file("views/seo.html", r#"{{ keywords("a,b") }}"#)
            .with_file("views/main.html", "{{ keywords() }}:{{ body() }}"),
    );
    assert_eq!(conn.parse(&ViewRequest::new("page")).unwrap(), "a,b:x");
}

#[test]
fn nested_partials_share_the_cache() {
    let (conn, source) = memory_connection(
        MemorySource::new()
            .with_file("views/page.html", r#"{{ render("outer") }}{{ render("inner") }}"#)
            .with_file("views/outer.html", r#"({{ render("inner") }})"#)
            .with_file("views/inner.html", "i"),
    );
    assert_eq!(conn.parse(&ViewRequest::new("page")).unwrap(), "(i)i");
    assert_eq!(source.read_count("views/inner.html"), 1);
}

// ============================================================================
// Resolution through the pipeline
// ============================================================================

#[test]
fn site_scoped_body_wins() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file("views/shop/en/page.html", "site")
            .with_file("views/en/page.html", "global"),
    );
    let request = ViewRequest::new("page").language("en").site("shop");
    assert_eq!(conn.parse(&request).unwrap(), "site");
}

#[test]
fn partial_next_to_body_overrides_shared() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file("views/en/users/list.html", r#"{{ render("row") }}"#)
            .with_file("views/en/users/row.html", "local")
            .with_file("views/shared/row.html", "shared"),
    );
    let request = ViewRequest::new("users/list").language("en");
    assert_eq!(conn.parse(&request).unwrap(), "local");
}

#[test]
fn layout_next_to_body_overrides_shared() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file("views/en/blog/post.html", r#"{{ layout("main") }}x"#)
            .with_file("views/en/blog/main.html", "local:{{ body() }}")
            .with_file("views/shared/main.html", "shared:{{ body() }}"),
    );
    let request = ViewRequest::new("blog/post").language("en");
    assert_eq!(conn.parse(&request).unwrap(), "local:x");
}

#[test]
fn directory_style_body_uses_index() {
    let (conn, _) = memory_connection(
        MemorySource::new().with_file("views/en/docs/index.html", "docs home"),
    );
    let request = ViewRequest::new("docs").language("en");
    assert_eq!(conn.parse(&request).unwrap(), "docs home");
}

#[test]
fn filesystem_tree_end_to_end() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "shop/en/home.html",
        r#"{{ title("Shop") }}{{ layout("site") }}<h1>{{ render("banner", {"text": model.headline}) }}</h1>"#,
    );
    write(root, "shop/en/banner.html", "{{ model.text }}");
    write(root, "shared/site.html", "<title>{{ title() }}</title>{{ body() }}");
    write(root, "shared/banner.html", "wrong banner");

    let conn = Connection::connect(ViewConfig::new().root(root)).unwrap();
    let request = ViewRequest::new("home")
        .language("en")
        .site("shop")
        .model(json!({ "headline": "Sale" }));
    assert_eq!(
        conn.parse(&request).unwrap(),
        "<title>Shop</title><h1>Sale</h1>"
    );
}

#[test]
fn concurrent_parses_do_not_share_state() {
    let (conn, _) = memory_connection(
        MemorySource::new()
            .with_file("views/page.html", r#"{{ title(name) }}{{ layout("main") }}"#)
            .with_file("views/main.html", r#"{{ title() }}{{ render("p") }}"#)
            .with_file("views/p.html", "."),
    );
    let conn = Arc::new(conn);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let conn = Arc::clone(&conn);
            std::thread::spawn(move || {
                let name = format!("t{i}");
                let request = ViewRequest::new("page").insert("name", json!(name.clone()));
                (name, conn.parse(&request).unwrap())
            })
        })
        .collect();

    for handle in handles {
        let (name, html) = handle.join().unwrap();
        assert_eq!(html, format!("{name}."));
    }
}
