//! Policy loading and reload tests
//!
//! Sources are written to temporary files and loaded through the YAML loader.

use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use warden_authz::{
    AuthzEngine, AuthzError, MemoryAuditSink, PolicySource, Principal, Request, YamlLoader,
};

const SVC1: &str = r#"
audience: svc1
tags:
  admins:
    - userid:maria
policies:
  - id: "1"
    description: Admins can do anything
    subjects: ["tag:admins"]
    resources: ["<.*>"]
    actions: ["*"]
    effect: allow
  - id: "2"
    subjects: ["userid:42"]
    resources: ["doc:1"]
    actions: ["read"]
    effect: allow
"#;

const SVC2: &str = r#"
audience: svc2
policies:
  - id: "1"
    subjects: ["*"]
    resources: ["<.*>"]
    actions: ["read"]
    effect: allow
    conditions:
      remoteIP:
        type: CIDRCondition
        options:
          cidr: 127.0.0.1/32
"#;

fn write_source(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn engine() -> AuthzEngine {
    AuthzEngine::new(Arc::new(MemoryAuditSink::new()))
}

#[tokio::test]
async fn test_load_files() {
    let a = write_source(SVC1);
    let b = write_source(SVC2);
    let engine = engine();

    engine
        .load_policies(&YamlLoader, &[PolicySource::file(a.path()), PolicySource::file(b.path())])
        .await
        .unwrap();

    assert_eq!(engine.registry().audiences(), vec!["svc1", "svc2"]);

    let principals = engine.expand_principals("svc1", &[Principal::userid("maria")]);
    let request = Request::new("anything", "delete").with_principals(principals);
    assert!(engine.is_allowed("svc1", &request));

    let local = Request::new("doc", "read")
        .with_principal("userid:1")
        .with_context("remoteIP", "127.0.0.1");
    assert!(engine.is_allowed("svc2", &local));
}

#[tokio::test]
async fn test_inline_source() {
    let engine = engine();
    engine
        .load_policies(&YamlLoader, &[PolicySource::inline("inline", SVC1)])
        .await
        .unwrap();

    let request = Request::new("doc:1", "read").with_principal("userid:42");
    assert!(engine.is_allowed("svc1", &request));
}

#[tokio::test]
async fn test_malformed_source_keeps_previous_registry() {
    let a = write_source(SVC1);
    let engine = engine();
    engine
        .load_policies(&YamlLoader, &[PolicySource::file(a.path())])
        .await
        .unwrap();

    let a2 = write_source(SVC2);
    let broken = write_source("audience: svc3\npolicies: [ {id: 1, effect: ");
    let result = engine
        .load_policies(
            &YamlLoader,
            &[PolicySource::file(a2.path()), PolicySource::file(broken.path())],
        )
        .await;

    assert!(matches!(result, Err(AuthzError::Parse { .. })));
    assert_eq!(engine.registry().audiences(), vec!["svc1"]);
    assert!(engine.registry().lookup("svc2").is_none());

    let request = Request::new("doc:1", "read").with_principal("userid:42");
    assert!(engine.is_allowed("svc1", &request));
}

#[tokio::test]
async fn test_invalid_pattern_rejects_reload() {
    let bad = write_source(
        r#"
audience: svc1
policies:
  - id: "1"
    subjects: ["userid:<[0-9+>"]
    resources: ["*"]
    actions: ["*"]
    effect: allow
"#,
    );
    let engine = engine();

    let result = engine
        .load_policies(&YamlLoader, &[PolicySource::file(bad.path())])
        .await;

    assert!(matches!(result, Err(AuthzError::InvalidPolicy { .. })));
    assert!(engine.registry().is_empty());
}

#[tokio::test]
async fn test_unknown_condition_type_rejects_reload() {
    let bad = write_source(
        r#"
audience: svc1
policies:
  - id: "1"
    subjects: ["*"]
    resources: ["*"]
    actions: ["*"]
    effect: allow
    conditions:
      owner:
        type: ResourceContainsCondition
"#,
    );

    let result = engine()
        .load_policies(&YamlLoader, &[PolicySource::file(bad.path())])
        .await;
    assert!(matches!(result, Err(AuthzError::Parse { .. })));
}

#[tokio::test]
async fn test_missing_and_empty_files() {
    let engine = engine();

    let result = engine
        .load_policies(&YamlLoader, &[PolicySource::file("/nonexistent/policies.yaml")])
        .await;
    assert!(matches!(result, Err(AuthzError::Io { .. })));

    let empty = write_source("");
    let result = engine
        .load_policies(&YamlLoader, &[PolicySource::file(empty.path())])
        .await;
    assert!(matches!(result, Err(AuthzError::EmptySource(_))));
}

#[tokio::test]
async fn test_duplicate_audience_across_sources() {
    let a = write_source(SVC1);
    let b = write_source(SVC1);

    let result = engine()
        .load_policies(&YamlLoader, &[PolicySource::file(a.path()), PolicySource::file(b.path())])
        .await;
    assert!(matches!(result, Err(AuthzError::DuplicateAudience { .. })));
}

#[tokio::test]
async fn test_concurrent_reads_during_reload() {
    let a = write_source(SVC1);
    let engine = Arc::new(engine());
    let sources = vec![PolicySource::file(a.path())];
    engine.load_policies(&YamlLoader, &sources).await.unwrap();

    let mut readers = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        readers.push(tokio::spawn(async move {
            let request = Request::new("doc:1", "read").with_principal("userid:42");
            (0..200).all(|_| engine.is_allowed("svc1", &request))
        }));
    }

    for _ in 0..10 {
        engine.load_policies(&YamlLoader, &sources).await.unwrap();
    }

    for reader in readers {
        assert!(reader.await.unwrap());
    }
}
