//! `pagewright` command line: render a view or inspect its resolution cascade.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pagewright::{
    candidates, Connection, FsSource, ResolveContext, TemplateKind, ViewConfig, ViewRequest,
    ViewSource,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "PAGEWRIGHT_LOG";

#[derive(Debug, Parser)]
#[command(name = "pagewright", version, about = "Compose HTML pages from layered templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a view and print the page to stdout
    Render {
        #[command(flatten)]
        target: Target,

        /// JSON object merged into the template context
        #[arg(long, value_name = "FILE.json")]
        data: Option<PathBuf>,

        /// JSON value exposed to the body as `model`
        #[arg(long, value_name = "FILE.json")]
        model: Option<PathBuf>,
    },
    /// List the paths tried for a template, most specific first
    Candidates {
        #[command(flatten)]
        target: Target,

        #[arg(long, value_enum, default_value_t = Kind::Body)]
        kind: Kind,

        /// Directory of the body template, tried first for layouts and partials
        #[arg(long, value_name = "DIR")]
        current_dir: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct Target {
    /// View name, e.g. `users/list`
    view: String,

    /// Template root (overrides the config file)
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// YAML or JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "")]
    lang: String,

    #[arg(long)]
    site: Option<String>,
}

impl Target {
    fn config(&self) -> Result<ViewConfig> {
        let config = match &self.config {
            Some(path) => ViewConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => ViewConfig::new(),
        };
        let config = match &self.root {
            Some(root) => config.root(root),
            None => config,
        };
        let config = config.normalized();
        debug!(root = %config.root.display(), shared = %config.shared, "using template root");
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Body,
    Layout,
    Partial,
}

impl From<Kind> for TemplateKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Body => TemplateKind::Body,
            Kind::Layout => TemplateKind::Layout,
            Kind::Partial => TemplateKind::Partial,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output = run(cli.command)?;
    print!("{output}");
    Ok(())
}

fn run(command: Command) -> Result<String> {
    match command {
        Command::Render {
            target,
            data,
            model,
        } => render(&target, data.as_deref(), model.as_deref()),
        Command::Candidates {
            target,
            kind,
            current_dir,
        } => list_candidates(&target, kind.into(), current_dir.as_deref()),
    }
}

fn render(target: &Target, data: Option<&Path>, model: Option<&Path>) -> Result<String> {
    let conn = Connection::connect(target.config()?)?;

    let mut request = ViewRequest::new(target.view.as_str()).language(target.lang.as_str());
    if let Some(site) = &target.site {
        request = request.site(site.as_str());
    }
    if let Some(path) = data {
        let value = read_json(path)?;
        if !value.is_object() {
            bail!("{} must contain a JSON object", path.display());
        }
        request = request.with_data(&value)?;
    }
    if let Some(path) = model {
        request = request.model(read_json(path)?);
    }

    conn.parse(&request)
        .with_context(|| format!("rendering `{}`", target.view))
}

fn list_candidates(target: &Target, kind: TemplateKind, current_dir: Option<&Path>) -> Result<String> {
    let config = target.config()?;
    let ctx = ResolveContext {
        root: &config.root,
        site: target.site.as_deref(),
        language: &target.lang,
        shared: &config.shared,
        current_dir,
    };

    let mut found = false;
    let mut out = String::new();
    for path in candidates(kind, &target.view, &ctx) {
        let marker = if !found && FsSource.is_file(&path) {
            found = true;
            "* "
        } else {
            "  "
        };
        out.push_str(marker);
        out.push_str(&path.display().to_string());
        out.push('\n');
    }
    Ok(out)
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_parses_render_flags() {
        let cmd = parse(&[
            "pagewright", "render", "users/list", "--root", "views", "--lang", "en", "--site",
            "shop", "--data", "d.json",
        ]);
        match cmd {
            Command::Render { target, data, model } => {
                assert_eq!(target.view, "users/list");
                assert_eq!(target.root, Some(PathBuf::from("views")));
                assert_eq!(target.lang, "en");
                assert_eq!(target.site.as_deref(), Some("shop"));
                assert_eq!(data, Some(PathBuf::from("d.json")));
                assert!(model.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_candidates_kind_defaults_to_body() {
        match parse(&["pagewright", "candidates", "home"]) {
            Command::Candidates { kind, .. } => assert_eq!(kind, Kind::Body),
            other => panic!("unexpected command: {other:?}"),
        }
        match parse(&["pagewright", "candidates", "home", "--kind", "partial"]) {
            Command::Candidates { kind, .. } => assert_eq!(kind, Kind::Partial),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["pagewright", "candidates", "home", "--kind", "page"]).is_err());
    }

    #[test]
    fn test_render_from_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("en")).unwrap();
        std::fs::write(
            root.join("en/home.html"),
            r#"{{ title(model.name) }}{{ layout("main") }}{{ greeting }}"#,
        )
        .unwrap();
        std::fs::write(root.join("main.html"), "<h1>{{ title() }}</h1>{{ body() }}").unwrap();
        std::fs::write(root.join("data.json"), r#"{"greeting": "hi"}"#).unwrap();
        std::fs::write(root.join("model.json"), r#"{"name": "Home"}"#).unwrap();

        let root_arg = root.to_str().unwrap();
        let data_arg = root.join("data.json");
        let model_arg = root.join("model.json");
        let cmd = parse(&[
            "pagewright",
            "render",
            "home",
            "--root",
            root_arg,
            "--lang",
            "en",
            "--data",
            data_arg.to_str().unwrap(),
            "--model",
            model_arg.to_str().unwrap(),
        ]);

        assert_eq!(run(cmd).unwrap(), "<h1>Home</h1>hi");
    }

    #[test]
    fn test_render_rejects_non_object_data() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(&data, "[1, 2]").unwrap();

        let cmd = parse(&[
            "pagewright",
            "render",
            "home",
            "--root",
            dir.path().to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
        ]);
        let err = run(cmd).unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn test_candidates_marks_first_existing() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("shared")).unwrap();
        std::fs::write(root.join("shared/main.html"), "").unwrap();
        std::fs::write(root.join("main.html"), "").unwrap();

        let cmd = parse(&[
            "pagewright",
            "candidates",
            "main",
            "--kind",
            "layout",
            "--lang",
            "en",
            "--root",
            root.to_str().unwrap(),
        ]);
        let out = run(cmd).unwrap();
        let marked: Vec<&str> = out.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].ends_with("shared/main.html"));
        assert!(out.lines().last().unwrap().ends_with("main.html"));
    }

    #[test]
    fn test_candidates_skips_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("en/main.html")).unwrap();
        std::fs::create_dir_all(root.join("shared")).unwrap();
        std::fs::write(root.join("shared/main.html"), "").unwrap();

        let cmd = parse(&[
            "pagewright",
            "candidates",
            "main",
            "--kind",
            "layout",
            "--lang",
            "en",
            "--root",
            root.to_str().unwrap(),
        ]);
        let out = run(cmd).unwrap();
        let first = out.lines().next().unwrap();
        assert!(first.starts_with("  ") && first.ends_with("en/main.html"));
        let marked: Vec<&str> = out.lines().filter(|l| l.starts_with('*')).collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].ends_with("shared/main.html"));
    }
}
