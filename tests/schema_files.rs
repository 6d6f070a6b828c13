//! Loading version schemas from JSON files and reporting on them.

mod common;

use std::fs;

use schema_weave::{CompatibilityReport, SchemaError, SchemaMerger, Severity, VersionSchema};
use tempfile::tempdir;

#[test]
fn test_load_schema_files() {
    let dir = tempdir().unwrap();
    for schema in [common::shop_v1(), common::shop_v2()] {
        let path = dir.path().join(format!("{}.json", schema.version));
        fs::write(&path, serde_json::to_string_pretty(&schema).unwrap()).unwrap();
    }

    let v1 = VersionSchema::from_file(&dir.path().join("v1.json")).unwrap();
    let v2 = VersionSchema::from_file(&dir.path().join("v2.json")).unwrap();
    assert_eq!(v1, common::shop_v1());
    assert_eq!(v2, common::shop_v2());

    let outcome = SchemaMerger::new()
        .with_mapping(common::amount_mapping())
        .merge(&[v1, v2])
        .unwrap();
    assert_eq!(outcome.schema, common::shop().schema);
}

#[test]
fn test_malformed_file_names_the_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ \"version\": ").unwrap();

    match VersionSchema::from_file(&path) {
        Err(SchemaError::InvalidFormat(message)) => assert!(message.contains("broken.json")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let err = VersionSchema::from_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SchemaError::Io(_)));
}

#[test]
fn test_minimal_json_uses_defaults() {
    let schema = VersionSchema::from_json(r#"{ "version": "v3" }"#).unwrap();
    assert_eq!(schema.version.as_str(), "v3");
    assert!(schema.messages.is_empty());
    assert!(schema.package.is_empty());
}

#[test]
fn test_report_for_shop() {
    let report = CompatibilityReport::from_outcome(&common::shop());

    assert!(report.is_compatible);
    assert_eq!(report.counts.error, 0);
    assert!(report.at_least(Severity::Warning).any(|e| e.path == "Order.checksum"));

    let json = report.to_json().unwrap();
    assert!(json.contains("\"STRING_BYTES\""));
    assert!(report.to_text().contains("Order.total"));
}
