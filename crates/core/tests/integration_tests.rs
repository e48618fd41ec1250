//! Integration tests for pline-core
//!
//! These tests load plugin descriptors from disk, build pipelines and check the
//! assembled payloads end-to-end.

use std::io::Write;

use pline_core::{
    config::Settings,
    error::Error,
    file_handling::{get_pipeline_config, get_plugin_descriptor, write_pipeline_config},
    pipeline::{JobPayload, Library, Pipeline, SubmissionState, Transport},
    value::{Value, PIPE_MARKER},
};
use serde_json::json;
use tempfile::NamedTempFile;

fn library_with(descriptors: &[serde_json::Value]) -> Library {
    let mut library = Library::new();
    for descriptor in descriptors {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{descriptor}").unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();
        let loaded = get_plugin_descriptor(&path).unwrap();
        library.add(loaded, Some(path)).unwrap();
    }
    library
}

fn grep() -> serde_json::Value {
    json!({
        "id": "grep",
        "program": "grep",
        "options": [
            {"text": "pattern", "option": "e", "required": "pattern needed"},
            {"bool": "verbose", "option": "v", "value": ["--verbose", false]}
        ]
    })
}

fn counter() -> serde_json::Value {
    json!({
        "id": "wc",
        "program": "wc",
        "options": [
            {"bool": "lines", "option": "l"},
            {"file": "input", "name": "input", "option": "", "required": true}
        ]
    })
}

struct RecordingTransport {
    sent: Vec<JobPayload>,
    fail: bool,
}

impl Transport for RecordingTransport {
    fn send(&mut self, payload: &JobPayload) -> Result<String, String> {
        if self.fail {
            return Err("queue unavailable".to_string());
        }
        self.sent.push(payload.clone());
        Ok(format!("job-{}", self.sent.len()))
    }
}

/// A required text input blocks submission until it is filled
#[test]
fn test_required_input_workflow() {
    let library = library_with(&[grep()]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "grep").unwrap();

    match pipeline.payload() {
        Err(Error::Validation(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].message, "pattern needed");
        }
        other => panic!("expected a validation error, got {other:?}"),
    }

    pipeline.set_value(0, "pattern", "foo").unwrap();
    let payload = pipeline.payload().unwrap();
    assert_eq!(payload.command_lines(), vec!["grep -e foo"]);
}

/// A checkbox with a value pair emits the checked value behind its option
#[test]
fn test_checkbox_value_pair() {
    let library = library_with(&[grep()]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "grep").unwrap();
    pipeline.set_value(0, "e", "foo").unwrap();

    pipeline.set_value(0, "v_checkbox", true).unwrap();
    assert_eq!(
        pipeline.payload().unwrap().pipeline[0].parameters,
        "-e foo -v --verbose"
    );

    pipeline.set_value(0, "v_checkbox", false).unwrap();
    assert_eq!(pipeline.payload().unwrap().pipeline[0].parameters, "-e foo");
}

/// Merged components and their combined option stay in step
#[test]
fn test_merged_option_round_trip() {
    let library = library_with(&[json!({
        "id": "resize",
        "program": "convert",
        "options": [
            {"name": "width", "type": "int", "option": "resize", "merge": "x"},
            {"name": "height", "type": "int", "option": "resize", "merge": "x"}
        ]
    })]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "resize").unwrap();

    pipeline.set_value(0, "resize", "640x480").unwrap();
    let step = pipeline.step(0).unwrap();
    assert_eq!(step.value("width"), Some(Value::from("640")));
    assert_eq!(step.value("height"), Some(Value::from("480")));

    pipeline.set_value(0, "height", 200.0).unwrap();
    assert_eq!(
        pipeline.step(0).unwrap().value("resize"),
        Some(Value::from("640x200"))
    );
    assert_eq!(
        pipeline.payload().unwrap().pipeline[0].parameters,
        "-resize 640x200"
    );
}

/// Choosing a preset pushes its values; editing them selects the matching preset
#[test]
fn test_selection_stays_consistent() {
    let library = library_with(&[json!({
        "id": "aligner",
        "program": "align",
        "options": [
            {"text": "mode", "name": "mode", "option": "m"},
            {"select": "Preset", "name": "preset", "selection": [
                {"title": "manual", "value": "", "default": true},
                {"title": "fast", "option": {"mode": "quick"}},
                {"title": "careful", "option": {"mode": "slow"}}
            ]}
        ]
    })]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "aligner").unwrap();

    pipeline.set_value(0, "preset", "careful").unwrap();
    assert_eq!(pipeline.step(0).unwrap().value("mode"), Some(Value::from("slow")));

    pipeline.set_value(0, "mode", "quick").unwrap();
    assert_eq!(pipeline.step(0).unwrap().value("preset"), Some(Value::from("fast")));

    pipeline.set_value(0, "mode", "custom").unwrap();
    assert_eq!(pipeline.step(0).unwrap().value("preset"), Some(Value::empty()));
}

/// Disabled inputs are left out and come back with their value when re-enabled
#[test]
fn test_disabled_input_restored() {
    let library = library_with(&[json!({
        "id": "tool",
        "program": "tool",
        "options": [
            {"bool": "advanced", "name": "advanced", "option": ""},
            {"int": "threads", "option": "t", "enable": "advanced"}
        ]
    })]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "tool").unwrap();

    pipeline.set_value(0, "advanced", true).unwrap();
    pipeline.set_value(0, "threads", "8").unwrap();
    assert!(pipeline.payload().unwrap().pipeline[0].parameters.contains("-t 8"));

    pipeline.set_value(0, "advanced", false).unwrap();
    assert!(pipeline.step(0).unwrap().registry.node("t").unwrap().is_disabled());
    assert_eq!(pipeline.payload().unwrap().pipeline[0].parameters, "");

    pipeline.set_value(0, "advanced", true).unwrap();
    assert_eq!(pipeline.step(0).unwrap().value("threads"), Some(Value::from("8")));
}

/// A step reading the previous standard output as a pipe is chained onto it
#[test]
fn test_piped_steps_are_chained() {
    let library = library_with(&[grep(), counter()]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "grep").unwrap();
    pipeline.push(&library, "wc").unwrap();
    pipeline.set_value(0, "e", "foo").unwrap();

    assert_eq!(
        pipeline.step(1).unwrap().value("input"),
        Some(Value::from("../output.log"))
    );

    pipeline.set_value(1, "input_sel", PIPE_MARKER).unwrap();
    pipeline.set_value(1, "l", true).unwrap();
    assert!(pipeline.step(1).unwrap().is_piped());

    let payload = pipeline.payload().unwrap();
    assert_eq!(payload.pipeline.len(), 1);
    let step = &payload.pipeline[0];
    assert_eq!(step.name, "grep");
    assert_eq!(step.program, "grep|wc");
    assert_eq!(step.outfiles, "output.log");
    assert_eq!(payload.command_lines(), vec!["grep -e foo | wc -l"]);
}

/// Outputs both piped steps declare are listed once
#[test]
fn test_piped_steps_share_an_output() {
    let mut matcher = grep();
    matcher["outFiles"] = json!(["shared.txt"]);
    let mut counting = counter();
    counting["outFiles"] = json!(["shared.txt"]);
    let library = library_with(&[matcher, counting]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "grep").unwrap();
    pipeline.push(&library, "wc").unwrap();
    pipeline.set_value(0, "e", "foo").unwrap();
    pipeline.set_value(1, "input_sel", PIPE_MARKER).unwrap();

    let payload = pipeline.payload().unwrap();
    assert_eq!(payload.pipeline.len(), 1);
    assert_eq!(payload.pipeline[0].outfiles, "shared.txt,output.log");
}

/// A selection switched back and forth keeps pushing its own values
#[test]
fn test_selection_switches_between_items() {
    let library = library_with(&[json!({
        "id": "aligner",
        "program": "align",
        "options": [
            {"text": "mode", "name": "mode", "option": "m"},
            {"select": "Preset", "name": "preset", "selection": [
                {"title": "manual", "value": "", "default": true},
                {"title": "fast", "option": {"mode": "quick"}},
                {"title": "careful", "option": {"mode": "slow"}}
            ]}
        ]
    })]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "aligner").unwrap();

    pipeline.set_value(0, "preset", "fast").unwrap();
    pipeline.set_value(0, "preset", "careful").unwrap();
    let step = pipeline.step(0).unwrap();
    assert_eq!(step.value("mode"), Some(Value::from("slow")));
    assert_eq!(step.value("preset"), Some(Value::from("careful")));
    assert_eq!(pipeline.payload().unwrap().command_lines(), vec!["align -m slow"]);

    pipeline.set_value(0, "mode", "quick").unwrap();
    assert_eq!(pipeline.step(0).unwrap().value("preset"), Some(Value::from("fast")));
}

/// Submission goes through the state machine and hands the payload to the transport
#[test]
fn test_dispatch_through_transport() {
    let library = library_with(&[grep()]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "grep").unwrap();
    let mut transport = RecordingTransport {
        sent: Vec::new(),
        fail: false,
    };

    assert!(matches!(
        pipeline.dispatch(&mut transport),
        Err(Error::Validation(_))
    ));
    assert!(transport.sent.is_empty());
    assert_eq!(pipeline.submission().errors().len(), 1);

    pipeline.set_value(0, "e", "foo").unwrap();
    assert_eq!(pipeline.dispatch(&mut transport).unwrap(), "job-1");
    assert_eq!(transport.sent[0].name, "analysis");
    assert_eq!(pipeline.submission().state(), SubmissionState::Idle);

    transport.fail = true;
    assert!(matches!(
        pipeline.dispatch(&mut transport),
        Err(Error::Submission(_))
    ));
    assert_eq!(pipeline.submission().state(), SubmissionState::Idle);
}

/// A saved pipeline reopens with the same steps and inputs
#[test]
fn test_saved_pipeline_workflow() {
    let library = library_with(&[grep(), counter()]);
    let mut pipeline = Pipeline::new(Settings::default());
    pipeline.push(&library, "grep").unwrap();
    pipeline.push(&library, "wc").unwrap();
    pipeline.set_value(0, "e", "needle").unwrap();
    pipeline.set_value(1, "l", true).unwrap();
    pipeline.set_job_name("count needles").unwrap();

    let temp_file = NamedTempFile::new().unwrap();
    let temp_path = temp_file.path().to_str().unwrap();
    write_pipeline_config(temp_path, &pipeline.export("needles", None)).unwrap();

    let config = get_pipeline_config(temp_path).unwrap();
    let reopened = Pipeline::open(&library, &config, Settings::default()).unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.step(0).unwrap().value("e"), Some(Value::from("needle")));
    assert_eq!(reopened.step(1).unwrap().value("l"), Some(Value::Bool(true)));

    let payload = reopened.payload().unwrap();
    assert_eq!(payload.name, "count needles");
    assert_eq!(
        payload.command_lines(),
        vec!["grep -e needle", "wc -l ../output.log"]
    );
}
