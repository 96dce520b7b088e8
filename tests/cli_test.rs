//! CLI integration tests for shape-schema binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("shape-schema"))
}

// Helper to create a temp definition or payload file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const ORDER: &str = r#"{
    "type": "object",
    "properties": {
        "id": { "type": "string", "minLength": 1 },
        "qty": { "type": "integer", "minimum": 1 },
        "note": { "type": "string", "optional": true }
    }
}"#;

mod validate_command {
    use super::*;

    #[test]
    fn valid_payload_prints_output() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);
        let payload = write_temp_file(&dir, "payload.json", r#"{"id": "A1", "qty": 2}"#);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"id":"A1","qty":2}"#));
    }

    #[test]
    fn invalid_payload_lists_locations() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);
        let payload = write_temp_file(&dir, "payload.json", r#"{"id": 1, "qty": 0, "x": true}"#);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Validation failed"))
            .stderr(predicate::str::contains("input.id"))
            .stderr(predicate::str::contains("input.qty"))
            .stderr(predicate::str::contains("input.x: unexpected property"));
    }

    #[test]
    fn json_report() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);
        let payload = write_temp_file(&dir, "payload.json", r#"{"id": "A1"}"#);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""valid":false"#))
            .stdout(predicate::str::contains(r#""location":"input.qty""#))
            .stdout(predicate::str::contains(r#""kind":"required""#));
    }

    #[test]
    fn json_report_on_success() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);
        let payload = write_temp_file(&dir, "payload.json", r#"{"id": "A1", "qty": 3}"#);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""valid":true"#));
    }

    #[test]
    fn cast_flag_coerces_the_root() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "count.json", r#"{"type": "integer"}"#);
        let payload = write_temp_file(&dir, "payload.json", r#""42""#);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
            ])
            .assert()
            .code(1);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
                "--cast",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("42"))
            .stdout(predicate::str::contains("\"42\"").not());
    }

    #[test]
    fn cast_flag_reaches_nested_values() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);
        let payload = write_temp_file(&dir, "payload.json", r#"{"id": "A1", "qty": "5"}"#);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
                "--cast",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"id":"A1","qty":5}"#));
    }

    #[test]
    fn verify_flag_accepts_conforming_output() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);
        let payload = write_temp_file(&dir, "payload.json", r#"{"id": "A1", "qty": 2, "note": "n"}"#);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
                "--verify",
            ])
            .assert()
            .success();
    }

    #[test]
    fn payload_from_stdin() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);

        cmd()
            .args(["validate", definition.to_str().unwrap(), "-"])
            .write_stdin(r#"{"id": "B2", "qty": 1}"#)
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""id":"B2""#));
    }

    #[test]
    fn output_file() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);
        let payload = write_temp_file(&dir, "payload.json", r#"{"id": "A1", "qty": 2}"#);
        let output = dir.path().join("out.json");

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                payload.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success();

        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains(r#""qty":2"#));
    }
}

mod derived_views {
    use super::*;

    #[test]
    fn describe_command() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);

        cmd()
            .args(["describe", definition.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""requiredProperties":["id","qty"]"#))
            .stdout(predicate::str::contains(r#""minimum":1"#));
    }

    #[test]
    fn describe_pretty() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);

        cmd()
            .args(["describe", definition.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            // Pretty output has newlines and indentation
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn sample_command() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(
            &dir,
            "user.json",
            r#"{
                "type": "object",
                "properties": {
                    "name": { "type": "string", "example": "Ada" },
                    "age": { "type": "integer", "minimum": 18 }
                }
            }"#,
        );

        cmd()
            .args(["sample", definition.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""name":"Ada""#))
            .stdout(predicate::str::contains(r#""age":18"#));
    }

    #[test]
    fn sample_with_description() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "flag.json", r#"{"type": "boolean"}"#);

        cmd()
            .args(["sample", definition.to_str().unwrap(), "--with-description"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""value":true"#))
            .stdout(predicate::str::contains(r#""description""#));
    }

    #[test]
    fn export_command() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);

        cmd()
            .args(["export", definition.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("json-schema.org/draft/2020-12"))
            .stdout(predicate::str::contains(r#""additionalProperties":false"#));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn definition_not_found() {
        cmd()
            .args(["describe", "/nonexistent/definition.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn payload_not_found() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "order.json", ORDER);

        cmd()
            .args([
                "validate",
                definition.to_str().unwrap(),
                "/nonexistent/payload.json",
            ])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("loading payload"));
    }

    #[test]
    fn invalid_json_definition() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(&dir, "bad.json", r#"{ not valid json"#);

        cmd()
            .args(["describe", definition.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn unknown_type_in_definition() {
        let dir = TempDir::new().unwrap();
        let definition = write_temp_file(
            &dir,
            "bad.json",
            r#"{"type": "object", "properties": {"a": {"type": "strnig"}}}"#,
        );

        cmd()
            .args(["describe", definition.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("/properties/a/type"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("composable shape definitions"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("shape-schema"));
    }

    #[test]
    fn validate_help() {
        cmd()
            .args(["validate", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--cast"))
            .stdout(predicate::str::contains("--verify"))
            .stdout(predicate::str::contains("--json"));
    }
}

#[cfg(feature = "remote")]
mod remote {
    use super::*;

    #[test]
    fn describe_from_url() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/order.json")
            .with_header("content-type", "application/json")
            .with_body(ORDER)
            .create();

        cmd()
            .args(["describe", &format!("{}/order.json", server.url())])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""type":"object""#));
    }

    #[test]
    fn url_404() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/missing.json").with_status(404).create();

        cmd()
            .args(["describe", &format!("{}/missing.json", server.url())])
            .assert()
            .code(3) // Network errors are exit code 3
            .stderr(predicate::str::contains("failed to fetch"));
    }
}
