//! Hostile input tests
//!
//! Entity expansion, external entities, remote schema locations and
//! references escaping the trusted directory must all fail closed.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use fsa029_validate::config::{ParserConfig, COMMON_TYPES_SCHEMA_FILE, MAIN_SCHEMA_FILE};
use fsa029_validate::loaders;
use fsa029_validate::pipeline::{self, RunRequest};
use fsa029_validate::Error;

const XS: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn submission(name: &str) -> PathBuf {
    fixtures_dir().join("submissions").join(name)
}

/// A schema directory whose main schema carries `body`
fn schema_dir_with(root: &Path, body: &str) -> PathBuf {
    let dir = root.join("schemas");
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(MAIN_SCHEMA_FILE),
        format!("<?xml version=\"1.0\"?>\n<xs:schema {XS}>\n{body}\n</xs:schema>\n"),
    )
    .unwrap();
    fs::write(dir.join(COMMON_TYPES_SCHEMA_FILE), format!("<xs:schema {XS}/>")).unwrap();
    dir
}

#[test]
fn test_hardened_config_flags() {
    for config in [ParserConfig::hardened(), fsa029_validate::config::build()] {
        assert!(!config.entity_resolution_enabled());
        assert!(!config.dtd_loading_enabled());
        assert!(!config.network_access_enabled());
    }
}

#[test]
fn test_billion_laughs_is_rejected() {
    let err = loaders::load(submission("billion_laughs.xml"), &ParserConfig::hardened(), "Submission")
        .unwrap_err();
    assert!(matches!(err, Error::MalformedXml { ref label, .. } if label == "Submission"));

    let result = pipeline::run(&RunRequest::new(
        fixtures_dir().join("schemas"),
        submission("billion_laughs.xml"),
    ));
    assert_eq!(pipeline::exit_code(&result), 2);
}

#[test]
fn test_external_entity_is_rejected() {
    let err = loaders::load(submission("external_entity.xml"), &ParserConfig::hardened(), "Submission")
        .unwrap_err();
    match err {
        Error::MalformedXml { detail, .. } => assert!(!detail.contains("root:")),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_forbidden_submission_path_fails_before_parsing() {
    let tmp = TempDir::new().unwrap();
    let hosted = tmp.path().join("CommonTypes").join("v14");
    fs::create_dir_all(&hosted).unwrap();
    // Unparseable on purpose: preflight must stop before the loader sees it
    let path = hosted.join("submission.xml");
    fs::write(&path, "<not-xml").unwrap();

    let result = pipeline::run(&RunRequest::new(fixtures_dir().join("schemas"), path));
    assert!(matches!(result, Err(Error::ForbiddenPath { .. })), "{result:?}");
    assert_eq!(pipeline::exit_code(&result), 2);
}

#[test]
fn test_forbidden_schema_dir_fails_before_parsing() {
    let tmp = TempDir::new().unwrap();
    let hosted = tmp.path().join("CommonTypes").join("v14");
    fs::create_dir_all(&hosted).unwrap();

    let mut dir = hosted.into_os_string();
    dir.push("/");
    let result = pipeline::run(&RunRequest::new(PathBuf::from(dir), submission("valid.xml")));
    match result {
        Err(err @ Error::ForbiddenPath { .. }) => {
            assert!(err.to_string().starts_with("File locations must not contain '/CommonTypes/v14/'"))
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_remote_schema_location_is_never_fetched() {
    let tmp = TempDir::new().unwrap();
    let dir = schema_dir_with(
        tmp.path(),
        r#"  <xs:import namespace="urn:remote" schemaLocation="https://schemas.example.org/remote/Types.xsd"/>"#,
    );

    let result = pipeline::run(&RunRequest::new(dir, submission("valid.xml")));
    let err = result.unwrap_err();
    assert!(matches!(err, Error::SchemaCompilation { .. }));
    assert!(err
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("network access is disabled")));
}

#[test]
fn test_reference_escaping_trusted_directory_fails() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("Outside.xsd"), format!("<xs:schema {XS}/>")).unwrap();
    let dir = schema_dir_with(tmp.path(), r#"  <xs:include schemaLocation="../Outside.xsd"/>"#);

    let result = pipeline::run(&RunRequest::new(dir, submission("valid.xml")));
    let err = result.unwrap_err();
    assert!(err
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("outside the trusted schema directory")));
    assert_eq!(err.diagnostics()[0].line, Some(3));
}
