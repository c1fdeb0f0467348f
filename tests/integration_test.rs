use std::fs;

use graphlink::graphlink::{GraphBatch, GraphLink};
use graphlink::types::*;
use tempfile::TempDir;

fn file_component(id: &str, file_path: &str, language: Language) -> Component {
    Component {
        id: id.to_string(),
        name: file_path.rsplit('/').next().unwrap().to_string(),
        kind: "file".to_string(),
        file_path: file_path.to_string(),
        language,
    }
}

/// Creates a temp project containing `src/main.js` and `src/foo.js`.
fn setup_project() -> TempDir {
    let dir = TempDir::new().expect("failed to create temp dir");
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("main.js"), "import foo from './foo.js';\nimport _ from 'lodash';\n").unwrap();
    fs::write(src.join("foo.js"), "export default 1;\n").unwrap();
    dir
}

#[tokio::test]
async fn test_init_then_resolve_end_to_end() {
    let dir = setup_project();
    let link = GraphLink::init(dir.path()).await.expect("init should succeed");

    link.store_components(&[
        file_component("comp-main", "src/main.js", Language::JavaScript),
        file_component("comp-foo", "src/foo.js", Language::JavaScript),
    ])
    .await
    .unwrap();
    link.store_relationships(&[
        RawRelationship::new("rel-foo", "imports", "comp-main", "./foo.js"),
        RawRelationship::new("rel-lodash", "imports", "comp-main", "lodash"),
    ])
    .await
    .unwrap();

    let before = link.status().await.unwrap();
    assert_eq!(before.unresolved_targets, 2);

    let summary = link.resolve_now().await.expect("pass should succeed");
    assert_eq!(summary.targets.resolved, 1);
    assert_eq!(summary.targets.skipped_external, 1);

    let foo = link.get_relationship("rel-foo").await.unwrap().unwrap();
    assert_eq!(foo.resolved_target_id.as_deref(), Some("comp-foo"));
    let lodash = link.get_relationship("rel-lodash").await.unwrap().unwrap();
    assert_eq!(lodash.resolved_target_id.as_deref(), Some("external-module:npm:lodash"));

    let after = link.status().await.unwrap();
    assert_eq!(after.relationships, 2);
    assert_eq!(after.unresolved_targets, 0);
}

#[tokio::test]
async fn test_open_reuses_existing_project() {
    let dir = setup_project();
    {
        let link = GraphLink::init(dir.path()).await.unwrap();
        link.store_batch(&GraphBatch {
            components: vec![
                file_component("comp-main", "src/main.js", Language::JavaScript),
                file_component("comp-foo", "src/foo.js", Language::JavaScript),
            ],
            relationships: vec![RawRelationship::new("rel-foo", "imports", "comp-main", "./foo.js")],
        })
        .await
        .unwrap();
    }

    assert!(GraphLink::is_initialized(dir.path()));
    let link = GraphLink::open(dir.path()).await.expect("open should succeed");
    assert_eq!(link.get_config().debounce_ms, 750);

    let summary = link.resolve_now().await.unwrap();
    assert_eq!(summary.targets.resolved, 1);
}

#[tokio::test]
async fn test_open_without_init_fails() {
    let dir = TempDir::new().unwrap();
    assert!(!GraphLink::is_initialized(dir.path()));
    assert!(GraphLink::open(dir.path()).await.is_err());
}

#[tokio::test]
async fn test_batch_json_shape() {
    let raw = r#"{
        "components": [
            { "id": "c1", "name": "main.py", "kind": "file", "file_path": "main.py", "language": "Python" }
        ],
        "relationships": [
            { "id": "r1", "kind": "imports", "source_id": "c1", "target_id": "os",
              "location": null, "metadata": {}, "resolved_source_id": null, "resolved_target_id": null }
        ]
    }"#;
    let batch: GraphBatch = serde_json::from_str(raw).expect("batch should parse");
    assert_eq!(batch.components[0].language, Language::Python);
    assert_eq!(batch.relationships[0].target_id, "os");
}
