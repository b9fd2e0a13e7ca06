//! End-to-end pipeline tests
//!
//! Run the full preflight, load, rewrite, compile and validate sequence
//! against the fixture schema distribution under `tests/fixtures/`.

use std::fs;
use std::path::PathBuf;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use fsa029_validate::compiler::SchemaCompiler;
use fsa029_validate::config::{Settings, COMMON_TYPES_SCHEMA_FILE, MAIN_SCHEMA_FILE};
use fsa029_validate::loaders;
use fsa029_validate::pipeline::{self, RunRequest};
use fsa029_validate::report::{Format, Report};
use fsa029_validate::rewriter;
use fsa029_validate::validate::validate;
use fsa029_validate::{Error, ValidationOutcome};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn schemas_dir() -> PathBuf {
    fixtures_dir().join("schemas")
}

fn submission(name: &str) -> PathBuf {
    fixtures_dir().join("submissions").join(name)
}

fn run(schema_dir: PathBuf, submission: PathBuf) -> fsa029_validate::Result<ValidationOutcome> {
    pipeline::run(&RunRequest::new(schema_dir, submission))
}

// ============================================================================
// Outcomes
// ============================================================================

#[test]
fn test_conformant_submission() {
    let result = run(schemas_dir(), submission("valid.xml"));
    assert!(matches!(result, Ok(ValidationOutcome::Conformant)), "{result:?}");
    assert_eq!(pipeline::exit_code(&result), 0);
}

#[test]
fn test_missing_required_element() {
    let result = run(schemas_dir(), submission("missing_capital.xml"));
    assert_eq!(pipeline::exit_code(&result), 1);

    let outcome = result.unwrap();
    let diagnostics = outcome.diagnostics();
    assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");
    assert_eq!(diagnostics[0].line, Some(2));
    assert!(diagnostics[0].message.contains("Missing child element(s)"));
    assert!(diagnostics[0].message.contains("{urn:fsa029}Capital"));
}

#[test]
fn test_every_violation_is_reported_in_document_order() {
    let outcome = run(schemas_dir(), submission("bad_values.xml")).unwrap();
    let lines: Vec<_> = outcome.diagnostics().iter().map(|d| d.line).collect();
    assert_eq!(lines, vec![Some(3), Some(5), Some(6)]);

    let messages: Vec<_> = outcome.diagnostics().iter().map(|d| d.message.as_str()).collect();
    assert!(messages[0].starts_with("Element '{urn:fsa029}FirmReference'"));
    assert!(messages[1].contains("attribute 'Currency'"));
    assert!(messages[2].starts_with("Element '{urn:fsa029}Tier1'"));
}

#[test]
fn test_malformed_type_definition_fails_compilation() {
    let result = run(fixtures_dir().join("broken_schemas"), submission("valid.xml"));
    assert_eq!(pipeline::exit_code(&result), 2);

    let err = result.unwrap_err();
    assert!(matches!(err, Error::SchemaCompilation { .. }), "{err}");
    let diagnostics = err.diagnostics();
    assert!(!diagnostics.is_empty());
    assert_eq!(diagnostics[0].line, Some(9));
    assert_eq!(diagnostics[0].source.as_deref(), Some(MAIN_SCHEMA_FILE));
    assert!(diagnostics[0].message.contains("CapitalTypo"));
}

#[test]
fn test_malformed_submission() {
    let result = run(schemas_dir(), submission("malformed.xml"));
    assert_eq!(pipeline::exit_code(&result), 2);
    match result {
        Err(Error::MalformedXml { label, line, .. }) => {
            assert_eq!(label, "Submission");
            assert!(line.is_some());
        }
        other => panic!("unexpected {other:?}"),
    }
}

/// A schema directory holding `main` as the root schema and an empty CommonTypes
fn schema_dir_with(root: &TempDir, main: &str) -> PathBuf {
    let dir = root.path().join("schemas");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(MAIN_SCHEMA_FILE), main).unwrap();
    fs::write(
        dir.join(COMMON_TYPES_SCHEMA_FILE),
        r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"/>"#,
    )
    .unwrap();
    dir
}

fn write_submission(root: &TempDir, xml: &str) -> PathBuf {
    let path = root.path().join("submission.xml");
    fs::write(&path, xml).unwrap();
    path
}

#[test]
fn test_undeclared_default_namespace_in_submission() {
    let tmp = TempDir::new().unwrap();
    let dir = schema_dir_with(
        &tmp,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:x">
  <xs:element name="root">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="child" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#,
    );
    let submission = write_submission(&tmp, r#"<root xmlns="urn:x"><child xmlns="">v</child></root>"#);

    let result = run(dir, submission);
    assert!(matches!(result, Ok(ValidationOutcome::Conformant)), "{result:?}");
}

#[test]
fn test_undeclared_default_namespace_in_schema() {
    let tmp = TempDir::new().unwrap();
    let dir = schema_dir_with(
        &tmp,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns="urn:unused">
  <xs:complexType name="T" xmlns="">
    <xs:sequence/>
  </xs:complexType>
  <xs:element name="root" type="T" xmlns=""/>
</xs:schema>"#,
    );
    let submission = write_submission(&tmp, "<root/>");

    let result = run(dir, submission);
    assert!(matches!(result, Ok(ValidationOutcome::Conformant)), "{result:?}");
}

#[test]
fn test_integer_beyond_decimal_range_is_bounded() {
    let tmp = TempDir::new().unwrap();
    let dir = schema_dir_with(
        &tmp,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="r">
    <xs:simpleType>
      <xs:restriction base="xs:integer">
        <xs:maxInclusive value="10"/>
      </xs:restriction>
    </xs:simpleType>
  </xs:element>
</xs:schema>"#,
    );

    let huge = write_submission(&tmp, "<r>99999999999999999999999999999999</r>");
    let outcome = run(dir.clone(), huge).unwrap();
    assert_eq!(outcome.diagnostics().len(), 1, "{outcome:?}");
    assert!(outcome.diagnostics()[0].message.contains("maxInclusive"));

    let small = write_submission(&tmp, "<r>7</r>");
    assert!(run(dir, small).unwrap().is_conformant());
}

#[test]
fn test_decimal_beyond_decimal_range_is_valid() {
    let tmp = TempDir::new().unwrap();
    let dir = schema_dir_with(
        &tmp,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="r" type="xs:decimal"/>
</xs:schema>"#,
    );
    let submission = write_submission(&tmp, "<r>123456789012345678901234567890.5</r>");

    let result = run(dir, submission);
    assert!(matches!(result, Ok(ValidationOutcome::Conformant)), "{result:?}");
}

#[test]
fn test_main_schema_including_itself() {
    let tmp = TempDir::new().unwrap();
    let dir = schema_dir_with(
        &tmp,
        &format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:include schemaLocation="{MAIN_SCHEMA_FILE}"/>
  <xs:element name="r" type="xs:string"/>
</xs:schema>"#
        ),
    );
    let submission = write_submission(&tmp, "<r>v</r>");

    let result = run(dir, submission);
    assert!(matches!(result, Ok(ValidationOutcome::Conformant)), "{result:?}");
}

// ============================================================================
// Preflight
// ============================================================================

#[test]
fn test_missing_common_types_schema() {
    let dir = TempDir::new().unwrap();
    fs::copy(schemas_dir().join(MAIN_SCHEMA_FILE), dir.path().join(MAIN_SCHEMA_FILE)).unwrap();

    let result = run(dir.path().to_path_buf(), submission("valid.xml"));
    match &result {
        Err(Error::MissingFile(path)) => assert!(path.ends_with(COMMON_TYPES_SCHEMA_FILE)),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(pipeline::exit_code(&result), 2);
}

#[test]
fn test_schema_dir_must_be_a_directory() {
    let result = run(schemas_dir().join(MAIN_SCHEMA_FILE), submission("valid.xml"));
    assert!(matches!(result, Err(Error::NotADirectory(_))));
}

// ============================================================================
// Side effects and sharing
// ============================================================================

#[test]
fn test_schema_files_are_never_modified() {
    let main = schemas_dir().join(MAIN_SCHEMA_FILE);
    let before = fs::read(&main).unwrap();
    run(schemas_dir(), submission("valid.xml")).unwrap();
    assert_eq!(fs::read(&main).unwrap(), before);
}

#[test]
fn test_compiled_schema_is_shared_across_threads() {
    let request = RunRequest::new(schemas_dir(), submission("valid.xml"));
    let settings = Settings::default();
    let trusted = pipeline::preflight(&request).unwrap();

    let tree = loaders::load(request.main_schema(), &settings.parser, "Main XSD").unwrap();
    let tree = rewriter::rewrite(tree, &trusted, &settings.policy).unwrap();
    let schema = SchemaCompiler::new(&settings.parser, &trusted).compile(tree).unwrap();

    let names = ["valid.xml", "missing_capital.xml", "bad_values.xml"];
    let counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = names
            .iter()
            .map(|name| {
                let schema = &schema;
                let parser = &settings.parser;
                scope.spawn(move || {
                    let document = loaders::load(submission(name), parser, "Submission").unwrap();
                    validate(schema, &document).diagnostics().len()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(counts, vec![0, 1, 3]);
}

#[test]
fn test_json_report_for_run() {
    let result = run(schemas_dir(), submission("missing_capital.xml"));
    let rendered = Report::new(&result).render(Format::Json).unwrap();
    let json: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(json["outcome"], "non_conformant");
    assert_eq!(json["diagnostics"].as_array().map(Vec::len), Some(1));
    assert_eq!(json["diagnostics"][0]["line"], 2);
}
