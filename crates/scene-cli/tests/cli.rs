//! scenectl subcommands against documents on disk

use pretty_assertions::assert_eq;
use scene_cli::{build_cli, run};
use std::io::Write;
use tempfile::NamedTempFile;

const DOCUMENT: &str = r#"
title = "Checkout"

[root]
kind = "scene"
key = "root"

[root.timeRange]
from = "now-24h"
to = "now"

[[root.variables]]
name = "region"
type = "custom"
query = "eu, us"
value = "us"

[[root.children]]
kind = "panel"
key = "latency"
dependencyPaths = ["title"]
state = { title = "Latency in $region" }
"#;

fn write_temp(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn scenectl(args: &[&str]) -> anyhow::Result<String> {
    let matches = build_cli().try_get_matches_from(std::iter::once("scenectl").chain(args.iter().copied()))?;
    run(&matches)
}

#[test]
fn interpolates_in_node_scope() {
    let doc = write_temp(DOCUMENT, ".toml");
    let path = doc.path().to_str().unwrap();

    let out = scenectl(&["interpolate", path, "Latency in $region", "--node", "latency"]).unwrap();
    assert_eq!(out, "Latency in us");
}

#[test]
fn url_query_overrides_document_values() {
    let doc = write_temp(DOCUMENT, ".toml");
    let path = doc.path().to_str().unwrap();

    let out = scenectl(&["interpolate", path, "${region}", "--url", "var-region=eu"]).unwrap();
    assert_eq!(out, "eu");
}

#[test]
fn scoped_vars_win_and_format_applies() {
    let doc = write_temp(DOCUMENT, ".toml");
    let path = doc.path().to_str().unwrap();

    let out = scenectl(&[
        "interpolate",
        path,
        "$region/$pod",
        "--var",
        "region=ap",
        "--var",
        "pod=it's",
        "--format",
        "singlequote",
    ])
    .unwrap();
    assert_eq!(out, "'ap'/'it\\'s'");
}

#[test]
fn malformed_var_is_an_error() {
    let doc = write_temp(DOCUMENT, ".toml");
    let path = doc.path().to_str().unwrap();

    let err = scenectl(&["interpolate", path, "$region", "--var", "region"]).unwrap_err();
    assert!(err.to_string().contains("NAME=VALUE"));
}

#[test]
fn unknown_node_is_an_error() {
    let doc = write_temp(DOCUMENT, ".toml");
    let path = doc.path().to_str().unwrap();

    let err = scenectl(&["interpolate", path, "$region", "--node", "nope"]).unwrap_err();
    assert!(err.to_string().contains("nope"));
}

#[test]
fn url_state_lists_synced_keys() {
    let doc = write_temp(DOCUMENT, ".toml");
    let path = doc.path().to_str().unwrap();

    let out = scenectl(&["url-state", path, "--url", "from=now-1h"]).unwrap();
    let mut pairs: Vec<&str> = out.split('&').collect();
    pairs.sort_unstable();
    assert_eq!(pairs, vec!["from=now-1h", "to=now", "var-region=us"]);
}

#[test]
fn tree_shows_kinds_and_dependencies() {
    let doc = write_temp(DOCUMENT, ".toml");
    let path = doc.path().to_str().unwrap();

    let out = scenectl(&["tree", path]).unwrap();
    assert!(out.starts_with("scene root"));
    assert!(out.contains("latency [uses: region]"));
    assert!(out.contains("[url: from, to]"));
}

#[test]
fn tree_json_round_trips_through_documents() {
    let doc = write_temp(DOCUMENT, ".toml");
    let path = doc.path().to_str().unwrap();

    let json = scenectl(&["tree", path, "--json"]).unwrap();
    let exported = write_temp(&json, ".json");
    let out = scenectl(&[
        "interpolate",
        exported.path().to_str().unwrap(),
        "$region",
        "--node",
        "latency",
    ])
    .unwrap();
    assert_eq!(out, "us");
}

#[test]
fn config_sets_default_format() {
    let doc = write_temp(DOCUMENT, ".toml");
    let config = write_temp("default_format = \"doublequote\"\n", ".toml");

    let out = scenectl(&[
        "--config",
        config.path().to_str().unwrap(),
        "interpolate",
        doc.path().to_str().unwrap(),
        "$region",
    ])
    .unwrap();
    assert_eq!(out, "\"us\"");
}

#[test]
fn invalid_config_is_reported() {
    let doc = write_temp(DOCUMENT, ".toml");
    let config = write_temp("cache_capacity = 0\n", ".toml");

    let err = scenectl(&[
        "--config",
        config.path().to_str().unwrap(),
        "tree",
        doc.path().to_str().unwrap(),
    ])
    .unwrap_err();
    assert!(format!("{err:#}").contains("cache_capacity"));
}
