use graphlink::types::*;
use serde_json::json;

#[test]
fn test_endpoint_decoding() {
    assert_eq!(
        Endpoint::decode("comp-1", true),
        Endpoint::Resolved("comp-1".to_string())
    );
    assert_eq!(
        Endpoint::decode_specifier("./foo.js", false),
        Endpoint::BySpecifier("./foo.js".to_string())
    );
    assert_eq!(
        Endpoint::decode("comp-deleted", false),
        Endpoint::Malformed("comp-deleted".to_string())
    );
    assert_eq!(
        Endpoint::decode_specifier("comp-1", true),
        Endpoint::Resolved("comp-1".to_string())
    );
    assert_eq!(
        Endpoint::decode("resolve:lodash", false),
        Endpoint::BySpecifier("lodash".to_string())
    );
    assert_eq!(
        Endpoint::decode("external:vendor/x.py", false),
        Endpoint::ExternalGuess("vendor/x.py".to_string())
    );
    assert_eq!(
        Endpoint::decode("external-module:npm:lodash", false),
        Endpoint::External(ExternalRef::package("npm", "lodash"))
    );
    assert!(matches!(Endpoint::decode("", false), Endpoint::Malformed(_)));
    assert!(matches!(Endpoint::decode("resolve:  ", false), Endpoint::Malformed(_)));
}

#[test]
fn test_untagged_targets_are_specifiers_only_for_imports() {
    let import = RawRelationship::new("r1", "imports", "comp-a", "lodash").decode(true, false);
    assert_eq!(import.target, Endpoint::BySpecifier("lodash".to_string()));

    let call = RawRelationship::new("r2", "calls", "comp-a", "comp-gone").decode(true, false);
    assert_eq!(call.target, Endpoint::Malformed("comp-gone".to_string()));

    let mut tagged_by_meta = RawRelationship::new("r3", "references", "comp-a", "./util");
    tagged_by_meta
        .metadata
        .insert("importKind".to_string(), json!("named"));
    assert!(tagged_by_meta.is_import());
    assert_eq!(
        tagged_by_meta.decode(true, false).target,
        Endpoint::BySpecifier("./util".to_string())
    );

    let orphan_source = RawRelationship::new("r4", "imports", "comp-gone", "lodash").decode(false, false);
    assert_eq!(orphan_source.source, Endpoint::Malformed("comp-gone".to_string()));
}

#[test]
fn test_pass_failure_error_names_no_relationship() {
    let err = graphlink::errors::LinkError::Pass {
        message: "see log output".to_string(),
    };
    assert_eq!(err.to_string(), "resolution pass failed: see log output");
}

#[test]
fn test_endpoint_encoding_is_canonical() {
    let endpoints = [
        Endpoint::Resolved("comp-1".to_string()),
        Endpoint::BySpecifier("./a".to_string()),
        Endpoint::ExternalGuess("b/c.rb".to_string()),
        Endpoint::External(ExternalRef::stdlib(Language::Go, "net/http")),
    ];
    for endpoint in endpoints {
        let is_component = matches!(endpoint, Endpoint::Resolved(_));
        assert_eq!(Endpoint::decode(&endpoint.encode(), is_component), endpoint);
    }
}

#[test]
fn test_sentinel_ids() {
    assert_eq!(
        ExternalRef::namespace("composer", "App\\Models").sentinel_id(),
        "external-namespace:composer:App\\Models"
    );
    assert_eq!(
        ExternalRef::stdlib(Language::Python, "os").sentinel_id(),
        "stdlib:python:os"
    );
    let parsed = ExternalRef::parse("external-module:go:github.com/a/b").unwrap();
    assert_eq!(parsed.name, "github.com/a/b");
    assert!(ExternalRef::parse("external-module:npm:").is_none());
    assert!(ExternalRef::parse("comp-1").is_none());
}

#[test]
fn test_language_inference() {
    assert_eq!(Language::from_path("src/app.tsx"), Language::TypeScript);
    assert_eq!(Language::from_path("lib/x.rb"), Language::Ruby);
    assert_eq!(Language::from_path("README"), Language::Unknown);
    assert_eq!(Language::from_str("golang"), Language::Go);
    assert_eq!(Language::Kotlin.ecosystem(), Some("maven"));
    assert_eq!(Language::Unknown.ecosystem(), None);
}

#[test]
fn test_merge_metadata_keeps_existing_keys() {
    let mut base = serde_json::Map::new();
    base.insert("importKind".to_string(), json!("named"));
    base.insert("isExternal".to_string(), json!(true));
    let mut additions = serde_json::Map::new();
    additions.insert("isExternal".to_string(), json!(false));

    let merged = merge_metadata(&base, additions);
    assert_eq!(merged.get("importKind"), Some(&json!("named")));
    assert_eq!(merged.get("isExternal"), Some(&json!(false)));
}

#[test]
fn test_status_counts() {
    let counts = StatusCounts::from_statuses(&[
        ResolutionStatus::Resolved,
        ResolutionStatus::Resolved,
        ResolutionStatus::SkippedJunk,
    ]);
    assert_eq!(counts.resolved, 2);
    assert_eq!(counts.skipped_junk, 1);
    assert_eq!(counts.total(), 3);
    assert_eq!(ResolutionStatus::SkippedStdlib.as_str(), "skipped_stdlib");
}

#[test]
fn test_hit_ratio() {
    assert_eq!(hit_ratio(0, 0), 0.0);
    assert_eq!(hit_ratio(3, 1), 0.75);
}
