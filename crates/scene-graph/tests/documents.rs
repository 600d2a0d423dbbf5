//! Scene documents on disk

use scene_graph::traversal::{find_by_key, get_time_range};
use scene_graph::objects::time_range_bounds;
use scene_graph::{DocumentError, SceneDocument};
use scene_test_utils::test_context;
use std::io::Write;

const TOML_DOC: &str = r#"
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

#[test]
fn loads_toml_file() {
    let ctx = test_context();
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(TOML_DOC.as_bytes()).unwrap();

    let doc = SceneDocument::from_path(file.path()).unwrap();
    assert_eq!(doc.title.as_deref(), Some("Checkout"));
    let root = doc.build(&ctx).unwrap();

    let latency = find_by_key(&root, "latency").unwrap();
    assert_eq!(latency.interpolate("Latency in $region"), "Latency in us");
    assert_eq!(
        time_range_bounds(&get_time_range(&latency)),
        ("now-24h".to_string(), "now".to_string())
    );
}

#[test]
fn exported_json_builds_same_shape() {
    let ctx = test_context();
    let root = SceneDocument::from_toml_str(TOML_DOC).unwrap().build(&ctx).unwrap();
    let json = SceneDocument::export(&root).unwrap().to_json_string().unwrap();

    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    let rebuilt = SceneDocument::from_path(file.path()).unwrap().build(&ctx).unwrap();

    let latency = find_by_key(&rebuilt, "latency").unwrap();
    assert!(latency.depends_on_variable("region"));
    assert_eq!(latency.interpolate("$region"), "us");
}

#[test]
fn missing_file_reports_path() {
    let err = SceneDocument::from_path("/no/such/scene.json").unwrap_err();
    assert!(matches!(err, DocumentError::Io { .. }));
}
