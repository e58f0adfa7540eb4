use super::*;
use serde_json::{Map, Value, json};

fn gear_id() -> GearId {
    GearId::try_new("GEAR-001").expect("gear id")
}

fn dicom_file() -> FileRef {
    FileRef::new(ContainerType::Acquisition, "acq-1", "scan.dcm")
}

fn manifest(config: Value) -> GearManifest {
    serde_json::from_value(json!({
        "name": "dcm2niix",
        "inputs": { "dicom": { "base": "file" } },
        "config": config,
    }))
    .expect("manifest")
}

#[test]
fn sequence_id_validation() {
    assert_eq!(JobId::try_new("").unwrap_err(), IdError::Empty);
    assert_eq!(
        JobId::try_new("BATCH-001").unwrap_err(),
        IdError::MissingPrefix { expected: "JOB-" }
    );
    assert_eq!(JobId::try_new("JOB-01").unwrap_err(), IdError::TooFewDigits);
    assert_eq!(
        JobId::try_new("JOB-0x1").unwrap_err(),
        IdError::InvalidDigit { ch: 'x', index: 5 }
    );
    assert_eq!(JobId::from_seq(7).as_str(), "JOB-007");
    assert_eq!(JobId::from_seq(1234).as_str(), "JOB-1234");
    assert!(serde_json::from_value::<JobId>(json!("nope")).is_err());
}

#[test]
fn job_transition_table() {
    use JobState::*;
    let legal = [
        (Pending, Running),
        (Pending, Cancelled),
        (Running, Failed),
        (Running, Complete),
        (Running, Cancelled),
    ];
    for from in JobState::ALL {
        for to in JobState::ALL {
            let expected = from == to || legal.contains(&(from, to));
            assert_eq!(
                from.can_transition_to(to),
                expected,
                "{from} -> {to}"
            );
        }
    }
    assert!(Pending.is_open());
    assert!(Running.is_open());
    assert!(!Complete.is_open());
    assert_eq!("cancelled".parse::<JobState>(), Ok(Cancelled));
    assert!("canceled".parse::<JobState>().is_err());
}

#[test]
fn batch_states_require_prior_state() {
    assert_eq!(BatchState::Pending.required_prior(), None);
    assert_eq!(
        BatchState::Running.required_prior(),
        Some(BatchState::Pending)
    );
    assert_eq!(
        BatchState::Cancelled.required_prior(),
        Some(BatchState::Running)
    );
}

#[test]
fn tag_set_keeps_first_seen_order() {
    let mut tags: TagSet = ["b", " a ", "", "b"].into_iter().collect();
    assert_eq!(tags.as_slice(), ["b", "a"]);
    assert!(!tags.insert("a"));
    assert!(tags.insert("c"));
    assert_eq!(serde_json::to_value(&tags).expect("json"), json!(["b", "a", "c"]));
}

#[test]
fn draft_derives_destination_and_gear_tag() {
    let job = JobDraft::new(gear_id(), "dcm2niix")
        .input("dicom", dicom_file())
        .tags(["nightly", "dcm2niix"])
        .create()
        .expect("job");
    assert_eq!(
        job.destination,
        ContainerRef::new(ContainerType::Acquisition, "acq-1")
    );
    assert_eq!(job.tags.as_slice(), ["nightly", "dcm2niix"]);
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempt, 1);
    assert!(job.id.is_none());
}

#[test]
fn draft_rejects_missing_destination_and_bad_lineage() {
    let err = JobDraft::new(gear_id(), "g").create().unwrap_err();
    assert_eq!(err, JobError::NoDestination);

    let dest = Some(ContainerRef::new(ContainerType::Session, "s1"));
    let err = JobDraft::new(gear_id(), "g")
        .destination(dest.clone())
        .attempt(2, None)
        .create()
        .unwrap_err();
    assert_eq!(err, JobError::LineageMismatch { attempt: 2 });

    let err = JobDraft::new(gear_id(), "g")
        .destination(dest)
        .attempt(0, None)
        .create()
        .unwrap_err();
    assert_eq!(err, JobError::ZeroAttempt);
}

#[test]
fn generate_request_maps_inputs_and_output() {
    let mut job = JobDraft::new(gear_id(), "dcm2niix")
        .input("dicom", dicom_file())
        .destination(Some(ContainerRef::new(ContainerType::Session, "ses-9")))
        .config(Some(json!({"config": {}})))
        .create()
        .expect("job");

    let manifest = manifest(json!({}));
    assert_eq!(
        job.generate_request(&manifest).unwrap_err(),
        JobError::MissingId
    );
    assert!(job.request.is_none());

    job.id = Some(JobId::from_seq(12));
    let request = job.generate_request(&manifest).expect("request").clone();
    assert_eq!(request.inputs.len(), 2);
    assert_eq!(request.inputs[0].uri, "/jobs/JOB-012/config.json");
    assert_eq!(request.inputs[0].location, "/flywheel/v0");
    assert_eq!(
        request.inputs[1].uri,
        "/acquisitions/acq-1/files/scan.dcm"
    );
    assert_eq!(request.inputs[1].location, "/flywheel/v0/input/dicom");
    assert_eq!(
        request.outputs[0].uri,
        "/engine?level=session&id=ses-9&job=JOB-012"
    );
    assert_eq!(request.outputs[0].location, "/flywheel/v0/output");
    assert_eq!(request.target.command, default_command());
    assert_eq!(request.target.env.get("PATH").map(String::as_str), Some(DEFAULT_PATH));
    assert_eq!(request.target.dir, "/flywheel/v0");

    let mut other = manifest.clone();
    other.command = Some(vec!["./other".to_string()]);
    let again = job.generate_request(&other).expect("cached").clone();
    assert_eq!(again, request);
    assert_eq!(job.request.as_ref(), Some(&request));
}

#[test]
fn generate_request_uses_manifest_command_and_image() {
    let mut manifest = manifest(json!({}));
    manifest.command = Some(vec!["python".to_string(), "run.py".to_string()]);
    manifest.image = Some("https://example.org/rootfs.tgz".to_string());
    manifest
        .environment
        .insert("FSLDIR".to_string(), "/opt/fsl".to_string());

    let mut job = JobDraft::new(gear_id(), "dcm2niix")
        .input("dicom", dicom_file())
        .create()
        .expect("job");
    let request = job.generate_request(&manifest).expect("request");
    assert_eq!(request.inputs[0].kind, "http");
    assert_eq!(request.inputs[0].location, "/");
    assert_eq!(request.target.command, ["python", "run.py"]);
    assert_eq!(request.target.env.len(), 2);
    assert_eq!(
        request.outputs[0].uri,
        "/engine?level=acquisition&id=acq-1"
    );
}

#[test]
fn config_schema_and_defaults() {
    let manifest = manifest(json!({
        "threshold": { "type": "number", "default": 0.5, "minimum": 0 },
        "mode": { "type": "string", "enum": ["fast", "slow"] },
        "note": { "type": "string", "optional": true },
    }));

    let schema = derive_config_schema(&manifest);
    assert_eq!(schema["required"], json!(["mode"]));
    assert_eq!(schema["additionalProperties"], json!(false));
    assert_eq!(schema["properties"]["threshold"]["minimum"], json!(0));
    assert!(schema["properties"]["note"].get("optional").is_none());

    let mut overrides = Map::new();
    overrides.insert("threshold".to_string(), json!(0.9));
    overrides.insert("mode".to_string(), json!("fast"));
    let merged = merge_defaults(&manifest, &overrides);
    assert_eq!(merged.get("threshold"), Some(&json!(0.9)));
    assert_eq!(merged.get("mode"), Some(&json!("fast")));

    let defaults_only = merge_defaults(&manifest, &Map::new());
    assert_eq!(Value::Object(defaults_only), json!({"threshold": 0.5}));
}

#[test]
fn job_serializes_losslessly() {
    let mut job = JobDraft::new(gear_id(), "dcm2niix")
        .input("dicom", dicom_file())
        .origin(Some(Origin::user("ann@example.org")))
        .create()
        .expect("job");
    job.id = Some(JobId::from_seq(3));

    let encoded = serde_json::to_value(&job).expect("encode");
    assert!(encoded.get("previous_job_id").is_none());
    assert!(encoded.get("request").is_none());
    let decoded: Job = serde_json::from_value(encoded).expect("decode");
    assert_eq!(decoded, job);
}

#[test]
fn retry_draft_links_lineage() {
    let mut job = JobDraft::new(gear_id(), "dcm2niix")
        .input("dicom", dicom_file())
        .create()
        .expect("job");
    assert_eq!(job.retry_draft().unwrap_err(), JobError::MissingId);

    job.id = Some(JobId::from_seq(4));
    job.state = JobState::Failed;
    job.generate_request(&manifest(json!({}))).expect("request");

    let retry = job.retry_draft().expect("retry");
    assert_eq!(retry.id, None);
    assert_eq!(retry.attempt, 2);
    assert_eq!(retry.previous_job_id, job.id);
    assert_eq!(retry.state, JobState::Pending);
    assert!(retry.request.is_none());
    assert_eq!(retry.inputs, job.inputs);
}

#[test]
fn mutation_rejects_unknown_keys() {
    let parsed: JobMutation = serde_json::from_value(json!({"state": "running"})).expect("mutation");
    assert_eq!(parsed, JobMutation::state(JobState::Running));
    assert!(serde_json::from_value::<JobMutation>(json!({"test": "invalid"})).is_err());
}

fn rule_file(name: &str, kind: Option<&str>, measurements: &[&str]) -> RuleFile {
    RuleFile {
        name: name.to_string(),
        kind: kind.map(str::to_string),
        measurements: measurements.iter().map(|m| m.to_string()).collect(),
    }
}

#[test]
fn rule_matches_follow_any_then_all() {
    let rule: Rule = serde_json::from_value(json!({
        "any": [["file.type", "dicom"], ["file.name", "*.dcm"]],
        "all": [["file.measurements", "diffusion"]],
        "alg": "dcm2niix",
    }))
    .expect("rule");
    assert_eq!(rule.gear, "dcm2niix");

    let dicom = rule_file("scan.zip", Some("dicom"), &["diffusion"]);
    assert_eq!(rule.eval(&dicom, &[]), Ok(true));
    let by_name = rule_file("a/b/scan.dcm", None, &["diffusion", "T1"]);
    assert_eq!(rule.eval(&by_name, &[]), Ok(true));
    let wrong_measurement = rule_file("scan.dcm", Some("dicom"), &["T1"]);
    assert_eq!(rule.eval(&wrong_measurement, &[]), Ok(false));
    let no_any = rule_file("scan.nii", Some("nifti"), &["diffusion"]);
    assert_eq!(rule.eval(&no_any, &[]), Ok(false));

    let unconditional: Rule = serde_json::from_value(json!({"gear": "qa"})).expect("rule");
    assert_eq!(unconditional.eval(&no_any, &[]), Ok(true));
}

#[test]
fn container_has_type_sees_siblings_and_self() {
    let rule: Rule = serde_json::from_value(json!({
        "all": [["container.has-type", "bvec"]],
        "gear": "dtifit",
        "match": {"dwi": "nifti", "bvec": "bvec"},
    }))
    .expect("rule");
    let nifti = rule_file("dwi.nii.gz", Some("nifti"), &[]);
    let bvec = rule_file("dwi.bvec", Some("bvec"), &[]);

    assert_eq!(rule.eval(&nifti, &[]), Ok(false));
    assert_eq!(rule.eval(&nifti, std::slice::from_ref(&bvec)), Ok(true));
    assert_eq!(rule.eval(&bvec, &[]), Ok(true));
    assert_eq!(
        rule.inputs.as_ref().map(|inputs| inputs.len()),
        Some(2)
    );
}

#[test]
fn rules_reject_bad_globs_and_unknown_matches() {
    let rule: Rule =
        serde_json::from_value(json!({"any": [["file.name", "[scan"]], "gear": "x"})).expect("rule");
    assert!(matches!(rule.validate(), Err(RuleError::BadGlob { .. })));
    assert!(rule.eval(&rule_file("scan", None, &[]), &[]).is_err());

    let err = serde_json::from_value::<Rule>(json!({"any": [["file.size", "1"]], "gear": "x"}))
        .expect_err("unknown match");
    assert!(err.to_string().contains("file.size"));
}

#[test]
fn preconstructed_jobs_replace_the_job_count() {
    let proposal: BatchProposal = serde_json::from_value(json!({
        "destinations": [{"type": "session", "id": "ses-1"}],
        "preconstructed_jobs": [{"gear_id": "GEAR-001"}, {"gear_id": "GEAR-002"}],
    }))
    .expect("proposal");
    assert_eq!(proposal.job_count(), 2);
}
