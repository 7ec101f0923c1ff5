//! Registry scenarios
//!
//! Versioning, default-version bookkeeping, fingerprints, and compatibility
//! across both storage providers.

use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::tempdir;

use schemata::{
    ChangeKind, FsStorage, MemoryStorage, RegisterOptions, SchemaRegistry, StorageProvider, ValidationOptions,
    VersionSelector,
};

fn registries() -> Vec<(SchemaRegistry, Option<tempfile::TempDir>)> {
    let dir = tempdir().unwrap();
    let fs = FsStorage::open(dir.path()).unwrap();
    vec![
        (SchemaRegistry::new(Arc::new(MemoryStorage::new())), None),
        (SchemaRegistry::new(Arc::new(fs)), Some(dir)),
    ]
}

fn default_versions(registry: &SchemaRegistry, namespace: &str, name: &str) -> Vec<String> {
    match registry.list_versions(namespace, name) {
        Ok(records) => records.into_iter().filter(|r| r.is_default).map(|r| r.version).collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn test_new_required_property_is_breaking() {
    for (registry, _dir) in registries() {
        let v1 = json!({ "properties": { "id": { "type": "string" } } });
        let v2 = json!({
            "properties": { "id": { "type": "string" }, "email": { "type": "string" } },
            "required": ["email"]
        });
        registry.register_schema("ns", "user", v1, RegisterOptions::version("1")).unwrap();
        registry.register_schema("ns", "user", v2.clone(), RegisterOptions::version("2")).unwrap();

        let report = registry.check_compatibility("ns", "user", &v2).unwrap();
        assert!(!report.compatible);
        let required: Vec<_> = report.changes.iter().filter(|c| c.path == "required").collect();
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].kind, ChangeKind::Add);
        assert!(required[0].breaking);

        let compared = registry.compare_schema_versions("ns", "user", "1", "2").unwrap();
        assert_eq!(compared, report);
    }
}

#[test]
fn test_deleting_default_promotes_newest_sibling() {
    for (registry, _dir) in registries() {
        for version in ["1", "2", "3"] {
            registry
                .register_schema("ns", "user", json!({}), RegisterOptions::version(version))
                .unwrap();
        }
        assert_eq!(default_versions(&registry, "ns", "user"), vec!["1"]);

        registry.delete_schema_version("ns", "user", "1").unwrap();
        assert_eq!(default_versions(&registry, "ns", "user"), vec!["3"]);
        let current = registry.get_schema("ns", "user", &VersionSelector::Default).unwrap();
        assert_eq!(current.version, "3");
    }
}

#[test]
fn test_fingerprint_ignores_key_order() {
    for (registry, _dir) in registries() {
        let a: Value = serde_json::from_str(
            r#"{"type":"object","required":["id"],"properties":{"id":{"type":"string","minLength":1},"n":{"type":"integer"}}}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"properties":{"n":{"type":"integer"},"id":{"minLength":1,"type":"string"}},"required":["id"],"type":"object"}"#,
        )
        .unwrap();

        let first = registry.register_schema("ns", "a", a, RegisterOptions::version("1")).unwrap();
        let second = registry.register_schema("ns", "b", b, RegisterOptions::version("7")).unwrap();
        assert_eq!(first.fingerprint, second.fingerprint);
        assert!(first.fingerprint.matches(&second.schema));

        let other = registry
            .register_schema("ns", "c", json!({ "type": "object" }), RegisterOptions::version("1"))
            .unwrap();
        assert_ne!(first.fingerprint, other.fingerprint);
    }
}

#[test]
fn test_exactly_one_default_through_mutations() {
    for (registry, _dir) in registries() {
        let check = |expected: &[&str]| {
            let defaults = default_versions(&registry, "ns", "s");
            assert_eq!(defaults.len(), expected.len().min(1), "defaults: {:?}", defaults);
            assert_eq!(defaults, expected);
        };

        registry.register_schema("ns", "s", json!({}), RegisterOptions::version("a")).unwrap();
        check(&["a"]);
        registry.register_schema("ns", "s", json!({}), RegisterOptions::version("b")).unwrap();
        check(&["a"]);
        registry
            .register_schema("ns", "s", json!({}), RegisterOptions::version("c").as_default())
            .unwrap();
        check(&["c"]);
        registry.set_default_version("ns", "s", "a").unwrap();
        check(&["a"]);
        registry.set_default_version("ns", "s", "a").unwrap();
        check(&["a"]);
        registry.delete_schema_version("ns", "s", "b").unwrap();
        check(&["a"]);
        registry.delete_schema_version("ns", "s", "a").unwrap();
        check(&["c"]);
        registry.delete_schema_version("ns", "s", "c").unwrap();
        check(&[]);

        let record = registry.register_schema("ns", "s", json!({}), RegisterOptions::version("d")).unwrap();
        assert!(record.is_default);
        check(&["d"]);
    }
}

#[test]
fn test_optional_additions_never_break() {
    let registry = SchemaRegistry::in_memory();
    let base = json!({
        "type": "object",
        "required": ["id"],
        "properties": { "id": { "type": "string" } }
    });
    registry.register_schema("ns", "s", base.clone(), RegisterOptions::version("1.0.0")).unwrap();

    let mut optional = base.clone();
    optional["properties"]["nickname"] = json!({ "type": "string" });
    let report = registry.check_compatibility("ns", "s", &optional).unwrap();
    assert!(report.compatible);
    assert_eq!(
        registry.suggest_next_version("ns", "s", &optional).unwrap().as_deref(),
        Some("1.1.0")
    );

    let mut required = optional.clone();
    required["required"] = json!(["id", "nickname"]);
    assert!(!registry.check_compatibility("ns", "s", &required).unwrap().compatible);
    assert_eq!(
        registry.suggest_next_version("ns", "s", &required).unwrap().as_deref(),
        Some("2.0.0")
    );
}

#[test]
fn test_listings_across_namespaces() {
    for (registry, _dir) in registries() {
        registry.register_schema("billing", "invoice", json!({}), RegisterOptions::version("1")).unwrap();
        registry
            .register_schema("billing", "invoice", json!({}), RegisterOptions::version("2").as_default())
            .unwrap();
        registry.register_schema("billing", "receipt", json!({}), RegisterOptions::version("1")).unwrap();
        registry.register_schema("users", "profile", json!({}), RegisterOptions::version("1")).unwrap();

        assert_eq!(registry.list_namespaces().unwrap(), vec!["billing", "users"]);
        let listed: Vec<_> = registry
            .list_namespace_schemas("billing")
            .unwrap()
            .into_iter()
            .map(|r| (r.name, r.version))
            .collect();
        assert_eq!(
            listed,
            vec![("invoice".to_string(), "2".to_string()), ("receipt".to_string(), "1".to_string())]
        );
        assert!(registry.list_namespace_schemas("nobody").unwrap().is_empty());

        registry.delete_schema("billing", "invoice").unwrap();
        assert_eq!(registry.list_namespace_schemas("billing").unwrap().len(), 1);
    }
}

#[test]
fn test_file_registry_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let registry = SchemaRegistry::new(Arc::new(FsStorage::open(dir.path()).unwrap()));
        registry
            .register_schema(
                "users",
                "profile",
                json!({ "type": "object", "required": ["name"], "properties": { "name": { "type": "string" } } }),
                RegisterOptions::version("1.0.0"),
            )
            .unwrap();
        registry
            .register_schema("users", "profile", json!({ "type": "object" }), RegisterOptions::version("1.1.0"))
            .unwrap();
    }

    let storage: Arc<dyn StorageProvider> = Arc::new(FsStorage::open(dir.path()).unwrap());
    let registry = SchemaRegistry::new(Arc::clone(&storage));
    let versions = registry.list_versions("users", "profile").unwrap();
    let labels: Vec<_> = versions.iter().map(|r| r.version.as_str()).collect();
    assert_eq!(labels, vec!["1.0.0", "1.1.0"]);

    let result = registry
        .validate("users", "profile", &VersionSelector::Default, &json!({}), &ValidationOptions::default())
        .unwrap();
    assert_eq!(result.errors[0].path, "name");

    let latest = registry
        .validate("users", "profile", &VersionSelector::Latest, &json!({}), &ValidationOptions::default())
        .unwrap();
    assert!(latest.valid);

    assert!(dir.path().join("users").join("profile").join("1.1.0.json").exists());
}
