//! scenectl - inspect scene documents from the command line
//!
//! Loads a JSON or TOML scene document, optionally applies a URL query to it,
//! and then interpolates templates, prints the tree's URL state or prints
//! the tree itself.

#![warn(unreachable_pub)]

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use scene_graph::interpolate::interpolate;
use scene_graph::traversal::find_by_key;
use scene_graph::variables::ScopedVars;
use scene_graph::{SceneConfig, SceneContext, SceneDocument, SceneNode};
use scene_url::{MemoryLocation, UrlQuery, UrlSyncManager};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Command line definition
#[must_use]
pub fn build_cli() -> Command {
    let document = Arg::new("document")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Scene document (.json or .toml)");
    let url = Arg::new("url")
        .long("url")
        .value_name("QUERY")
        .help("URL query applied to the scene before running, e.g. 'from=now-1h&var-env=prod'");

    Command::new("scenectl")
        .version(scene_graph::VERSION)
        .about("Inspect scene documents: interpolation, URL state and tree layout")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Scene configuration file (TOML)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("warn")
                .help("Log filter when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("interpolate")
                .about("Interpolate a template in the scope of a node")
                .arg(document.clone())
                .arg(Arg::new("template").required(true).help("Template, e.g. 'up{env=\"$env\"}'"))
                .arg(
                    Arg::new("node")
                        .long("node")
                        .value_name("KEY")
                        .help("Key of the node whose scope is used; defaults to the root"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .help("Format for tokens without one; defaults to the configured format"),
                )
                .arg(
                    Arg::new("var")
                        .long("var")
                        .value_name("NAME=VALUE")
                        .action(ArgAction::Append)
                        .help("Scoped variable taking precedence over the scene's"),
                )
                .arg(url.clone()),
        )
        .subcommand(
            Command::new("url-state")
                .about("Print the query string mirroring the scene's URL-synced state")
                .arg(document.clone())
                .arg(url.clone()),
        )
        .subcommand(
            Command::new("tree")
                .about("Print the scene tree")
                .arg(document)
                .arg(url)
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the tree as a scene document"),
                ),
        )
}

/// Install the tracing subscriber; `RUST_LOG` wins over `level`
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Run the selected subcommand and return its output
///
/// # Errors
/// Fails when the configuration or document cannot be loaded, the document
/// does not build, or a named node does not exist
pub fn run(matches: &ArgMatches) -> Result<String> {
    match matches.subcommand() {
        Some(("interpolate", args)) => {
            let scene = Scene::load(matches, args)?;
            let node = match args.get_one::<String>("node") {
                Some(key) => find_by_key(&scene.root, key)
                    .with_context(|| format!("no node with key '{key}'"))?,
                None => scene.root.clone(),
            };

            let mut scoped = ScopedVars::new();
            for pair in args.get_many::<String>("var").into_iter().flatten() {
                let (name, value) = pair
                    .split_once('=')
                    .with_context(|| format!("expected NAME=VALUE, got '{pair}'"))?;
                scoped.insert(name, value, None);
            }

            let template = args
                .get_one::<String>("template")
                .context("template is required")?;
            let format = args.get_one::<String>("format").map(String::as_str);
            let scoped = (!scoped.is_empty()).then_some(&scoped);
            Ok(interpolate(&node, template, scoped, format))
        }
        Some(("url-state", args)) => {
            let scene = Scene::load(matches, args)?;
            let mut query = UrlQuery::new();
            query.apply(&scene.manager.get_url_state(&scene.root));
            Ok(query.to_query_string())
        }
        Some(("tree", args)) => {
            let scene = Scene::load(matches, args)?;
            if args.get_flag("json") {
                let doc = SceneDocument::export(&scene.root)?;
                return Ok(doc.to_json_string()?);
            }
            let mut out = String::new();
            print_tree(&scene.root, 0, &mut out);
            Ok(out.trim_end().to_string())
        }
        _ => anyhow::bail!("no subcommand given; see --help"),
    }
}

struct Scene {
    root: SceneNode,
    manager: UrlSyncManager,
}

impl Scene {
    fn load(global: &ArgMatches, args: &ArgMatches) -> Result<Self> {
        let config = match global.get_one::<PathBuf>("config") {
            Some(path) => SceneConfig::from_path(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => SceneConfig::default(),
        };
        let context = SceneContext::with_config(config);

        let path = args
            .get_one::<PathBuf>("document")
            .context("document is required")?;
        let document = SceneDocument::from_path(path)
            .with_context(|| format!("loading document {}", path.display()))?;
        let root = document.build(&context)?;
        root.activate();

        let query = args
            .get_one::<String>("url")
            .map(|q| UrlQuery::parse(q))
            .unwrap_or_default();
        let location = MemoryLocation::with_query("/", query);
        let manager = UrlSyncManager::new(Arc::new(location));
        manager.init_sync(&root);
        tracing::debug!(key = %root.key(), "scene loaded");

        Ok(Self { root, manager })
    }
}

fn print_tree(node: &SceneNode, depth: usize, out: &mut String) {
    let _ = write!(out, "{}{} {}", "  ".repeat(depth), node.kind(), node.key());
    let deps = node.variable_dependencies();
    if !deps.is_empty() {
        let names: Vec<&str> = deps.iter().map(String::as_str).collect();
        let _ = write!(out, " [uses: {}]", names.join(", "));
    }
    let keys = node.url_keys();
    if !keys.is_empty() {
        let _ = write!(out, " [url: {}]", keys.join(", "));
    }
    out.push('\n');

    for child in node.state().child_nodes() {
        print_tree(&child, depth + 1, out);
    }
}
