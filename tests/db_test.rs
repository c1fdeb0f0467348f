use graphlink::db::Database;
use graphlink::store::{ComponentRepository, RelationshipRepository};
use graphlink::types::*;
use serde_json::json;
use tempfile::TempDir;

/// Helper: create a temp database and return (Database, TempDir).
/// The TempDir is returned so that it stays alive for the duration of the test.
async fn setup_db() -> (Database, TempDir) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let db = Database::initialize(&db_path)
        .await
        .expect("failed to initialize database");
    (db, dir)
}

fn sample_component(id: &str, name: &str, kind: &str, file_path: &str) -> Component {
    Component {
        id: id.to_string(),
        name: name.to_string(),
        kind: kind.to_string(),
        file_path: file_path.to_string(),
        language: Language::TypeScript,
    }
}

async fn seed(db: &Database) {
    db.insert_components(&[
        sample_component("file-app", "app.ts", "file", "src/app.ts"),
        sample_component("fn-app", "bootstrap", "function", "src/app.ts"),
        sample_component("cls-user", "User", "class", "src/models/user.ts"),
        sample_component("cls-user-2", "User", "class", "legacy/user.ts"),
    ])
    .await
    .expect("failed to insert components");
}

#[tokio::test]
async fn test_initialize_creates_database() {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db_path = dir.path().join("subdir").join("graph.db");
    let _db = Database::initialize(&db_path)
        .await
        .expect("failed to initialize database");
    assert!(db_path.exists(), "database file should exist after initialize");
}

#[tokio::test]
async fn test_open_missing_database_fails() {
    let dir = TempDir::new().expect("failed to create temp dir");
    assert!(Database::open(&dir.path().join("nope.db")).await.is_err());
}

#[tokio::test]
async fn test_relationship_round_trip_keeps_location_and_metadata() {
    let (db, _dir) = setup_db().await;
    let mut rel = RawRelationship::new("rel-1", "imports", "fn-app", "./models/user");
    rel.location = Some(Location { line: 3, column: 7 });
    rel.metadata.insert("importKind".to_string(), json!("named"));
    db.insert_relationships(&[rel.clone()]).await.unwrap();

    let fetched = db
        .get_relationship("rel-1")
        .await
        .expect("failed to get relationship")
        .expect("relationship should exist");

    assert_eq!(fetched, rel);
    assert!(db.get_relationship("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unresolved_sets_exclude_component_endpoints() {
    let (db, _dir) = setup_db().await;
    seed(&db).await;
    db.insert_relationships(&[
        RawRelationship::new("rel-target", "imports", "fn-app", "./models/user"),
        RawRelationship::new("rel-source", "calls", "external:lib/x.ts", "cls-user"),
        RawRelationship::new("rel-done", "calls", "fn-app", "cls-user"),
    ])
    .await
    .unwrap();

    let targets = db.get_unresolved_targets().await.unwrap();
    let sources = db.get_unresolved_sources().await.unwrap();

    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].id, "rel-target");
    assert_eq!(targets[0].source, Endpoint::Resolved("fn-app".to_string()));
    assert_eq!(targets[0].target, Endpoint::BySpecifier("./models/user".to_string()));

    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].source, Endpoint::ExternalGuess("lib/x.ts".to_string()));
}

#[tokio::test]
async fn test_bulk_update_never_overwrites_and_merges_metadata() {
    let (db, _dir) = setup_db().await;
    seed(&db).await;
    let mut rel = RawRelationship::new("rel-1", "imports", "fn-app", "lodash");
    rel.metadata.insert("importKind".to_string(), json!("default"));
    db.insert_relationships(&[rel]).await.unwrap();
    db.ensure_indexes().await.expect("indexes should be created");

    let mut first_meta = serde_json::Map::new();
    first_meta.insert("isExternal".to_string(), json!(true));
    let updated = db
        .update_relationships_bulk(&[RelationshipPatch {
            relationship_id: "rel-1".to_string(),
            resolved_target_id: Some("external-module:npm:lodash".to_string()),
            resolved_source_id: None,
            metadata: first_meta,
        }])
        .await
        .unwrap();
    assert_eq!(updated, 1);

    db.update_relationships_bulk(&[RelationshipPatch {
        relationship_id: "rel-1".to_string(),
        resolved_target_id: Some("somewhere-else".to_string()),
        resolved_source_id: None,
        metadata: serde_json::Map::new(),
    }])
    .await
    .unwrap();

    let stored = db.get_relationship("rel-1").await.unwrap().unwrap();
    assert_eq!(stored.resolved_target_id.as_deref(), Some("external-module:npm:lodash"));
    assert_eq!(stored.metadata.get("importKind"), Some(&json!("default")));
    assert_eq!(stored.metadata.get("isExternal"), Some(&json!(true)));
    assert!(db.get_unresolved_targets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_path_lookup_prefers_file_components() {
    let (db, _dir) = setup_db().await;
    seed(&db).await;

    let ids = db
        .ids_by_file_paths(&["src/app.ts".to_string(), "nope.ts".to_string()])
        .await
        .unwrap();

    assert_eq!(ids.get("src/app.ts").map(String::as_str), Some("file-app"));
    assert!(!ids.contains_key("nope.ts"));
}

#[tokio::test]
async fn test_name_lookup_and_search() {
    let (db, _dir) = setup_db().await;
    seed(&db).await;

    let by_name = db.ids_by_names(&["User".to_string()]).await.unwrap();
    assert_eq!(by_name.get("User").map(Vec::len), Some(2));

    let found = db
        .search_components(&ComponentQuery {
            name_contains: "boot".to_string(),
            language: Some(Language::TypeScript),
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "fn-app");

    let none = db
        .search_components(&ComponentQuery {
            name_contains: "boot".to_string(),
            language: Some(Language::Python),
            limit: 10,
        })
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_get_components_ignores_unknown_ids() {
    let (db, _dir) = setup_db().await;
    seed(&db).await;

    let found = db
        .get_components(&["cls-user".to_string(), "ghost".to_string()])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file_path, "src/models/user.ts");
    assert!(db.get_component("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unresolved_counts_and_clear() {
    let (db, _dir) = setup_db().await;
    seed(&db).await;
    db.insert_relationships(&[
        RawRelationship::new("rel-a", "imports", "fn-app", "./x"),
        RawRelationship::new("rel-b", "calls", "external:y.ts", "fn-app"),
        RawRelationship::new("rel-c", "calls", "fn-app", "cls-user"),
    ])
    .await
    .unwrap();

    let counts = db.unresolved_counts().await.unwrap();
    assert_eq!(
        counts,
        UnresolvedCounts {
            relationships: 3,
            unresolved_targets: 1,
            unresolved_sources: 1,
        }
    );

    db.clear().await.unwrap();
    assert_eq!(db.unresolved_counts().await.unwrap(), UnresolvedCounts::default());
}

#[tokio::test]
async fn test_bulk_update_keeps_null_valued_metadata() {
    let (db, _dir) = setup_db().await;
    seed(&db).await;
    let mut rel = RawRelationship::new("rel-1", "imports", "fn-app", "lodash");
    rel.metadata.insert("alias".to_string(), json!(null));
    rel.metadata
        .insert("importKind".to_string(), json!({ "default": true, "named": null }));
    db.insert_relationships(&[rel.clone()]).await.unwrap();

    let mut metadata = rel.metadata.clone();
    metadata.insert("isExternal".to_string(), json!(true));
    db.update_relationships_bulk(&[RelationshipPatch {
        relationship_id: "rel-1".to_string(),
        resolved_target_id: Some("external-module:npm:lodash".to_string()),
        resolved_source_id: None,
        metadata,
    }])
    .await
    .unwrap();

    let stored = db.get_relationship("rel-1").await.unwrap().unwrap();
    assert_eq!(stored.metadata.get("alias"), Some(&json!(null)));
    assert_eq!(
        stored.metadata.get("importKind"),
        Some(&json!({ "default": true, "named": null }))
    );
    assert_eq!(stored.metadata.get("isExternal"), Some(&json!(true)));
}
