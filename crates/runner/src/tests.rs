#![forbid(unsafe_code)]

use super::*;
use clap::CommandFactory;
use gq_core::{ContainerType, JobState};

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn parses_container_and_file_refs() {
    let container = cli::container_ref("session/ses-1").expect("container");
    assert_eq!(container.kind, ContainerType::Session);
    assert_eq!(container.id, "ses-1");
    assert!(cli::container_ref("session").is_err());
    assert!(cli::container_ref("planet/p-1").is_err());

    let (name, file) = cli::named_file_ref("dicom=acquisition/acq-1/raw/scan.dcm").expect("file");
    assert_eq!(name, "dicom");
    assert_eq!(file.kind, ContainerType::Acquisition);
    assert_eq!(file.id, "acq-1");
    assert_eq!(file.name, "raw/scan.dcm");
    assert!(cli::named_file_ref("acquisition/acq-1/scan.dcm").is_err());
    assert!(cli::named_file_ref("dicom=acquisition/acq-1").is_err());

    let file = cli::file_ref("session/ses-1/notes.txt").expect("plain file");
    assert_eq!(file.container(), container);
    assert_eq!(file.name, "notes.txt");
    assert!(cli::file_ref("session/ses-1/").is_err());
}

#[test]
fn parses_report_flags() {
    let cli = Cli::try_parse_from([
        "gq_runner", "report", "JOB-007", "--state", "complete", "--tag", "a", "--tag", "b",
    ])
    .expect("parse");
    match cli.command {
        Command::Report { id, state, tags, now } => {
            assert_eq!(id.as_str(), "JOB-007");
            assert_eq!(state, Some(JobState::Complete));
            assert_eq!(tags, Some(vec!["a".to_string(), "b".to_string()]));
            assert_eq!(now, None);
        }
        other => panic!("unexpected command {other:?}"),
    }
    assert!(Cli::try_parse_from(["gq_runner", "report", "job-7"]).is_err());
    assert!(Cli::try_parse_from(["gq_runner", "--superuser", "reap"]).is_err());
}

#[test]
fn enqueue_config_must_be_an_object() {
    let cli = Cli::try_parse_from([
        "gq_runner", "enqueue", "--gear", "GEAR-001", "--input", "dicom=acquisition/acq-1/scan.dcm",
        "--config", "[1]",
    ])
    .expect("parse");
    let Command::Enqueue(args) = cli.command else {
        panic!("expected enqueue");
    };
    let err = enqueue_request(args).expect_err("array config");
    assert!(matches!(err, CliError::Usage(_)));
}

#[test]
fn render_adds_rfc3339_twins() {
    let value = render(&json!({
        "created_at_ms": 0,
        "nested": [{ "ts_ms": 1_000 }],
        "attempt_ms": 5,
    }))
    .expect("render");
    assert_eq!(value["created_at"], "1970-01-01T00:00:00Z");
    assert_eq!(value["nested"][0]["ts"], "1970-01-01T00:00:01Z");
    assert!(value.get("attempt").is_none());
}

#[test]
fn errors_carry_code_and_key() {
    let err = CliError::from(QueueError::Validation {
        reason: "config is invalid".to_string(),
        key: Some("frac".to_string()),
    });
    let value = err.to_json();
    assert_eq!(value["error"]["code"], "validation");
    assert_eq!(value["error"]["key"], "frac");
}
