//! File inputs: the slot carried by file nodes and the choices offered after the first step.

use serde::{Deserialize, Serialize};

use super::selection::{SelectionItem, SelectionList};
use crate::value::{Value, PIPE_MARKER};

/// Selection value for a file uploaded with the job.
pub const LOCAL_MARKER: &str = "_local_";
/// Selection value for a filename typed by the user.
pub const CUSTOM_MARKER: &str = "_custom_";
const OUTPUT_HEADER: &str = "_title1_";
const INPUT_HEADER: &str = "_title2_";

/// Path of files produced by the previous pipeline step, relative to the job directory.
pub const PREVIOUS_STEP_PATH: &str = "../";

/// Selection values that never name a file.
pub fn is_marker(value: &str) -> bool {
    matches!(value, PIPE_MARKER | LOCAL_MARKER | CUSTOM_MARKER | OUTPUT_HEADER | INPUT_HEADER)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileSlot {
    pub filename: String,
    /// `""` for local files, [`PREVIOUS_STEP_PATH`] for files of the previous step.
    pub filepath: String,
    /// Content uploaded with the job.
    pub content: Option<String>,
    /// Filename every local file is renamed to.
    pub fixed_name: Option<String>,
    /// Reads the previous step's standard output as a stream.
    pub piped: bool,
}

impl FileSlot {
    pub fn new(follows_step: bool, fixed_name: Option<String>) -> Self {
        Self {
            filepath: if follows_step {
                PREVIOUS_STEP_PATH.to_string()
            } else {
                String::new()
            },
            fixed_name: fixed_name.filter(|name| !name.is_empty()),
            ..Self::default()
        }
    }

    /// The value a file node reads as: the pipe marker, `filepath + filename` or empty.
    pub fn source(&self) -> Value {
        if self.piped {
            Value::from(PIPE_MARKER)
        } else if self.filename.is_empty() {
            Value::empty()
        } else {
            Value::Text(format!("{}{}", self.filepath, self.filename))
        }
    }

    pub fn rootname(&self) -> String {
        self.filename
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    pub fn is_local(&self) -> bool {
        self.filepath.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<Value> {
        match field {
            "filename" => Some(Value::from(self.filename.as_str())),
            "filepath" => Some(Value::from(self.filepath.as_str())),
            "rootname" => Some(Value::from(self.rootname())),
            _ => None,
        }
    }
}

/// Splits `name` into a label and extension and numbers it until `taken` rejects none.
///
/// A trailing digit of the label is where counting resumes: `data2.txt` becomes
/// `data3.txt`.
pub fn unique_filename(name: &str, taken: &[&str]) -> String {
    let split = name.rfind('.').unwrap_or(name.len());
    let label = name[..split].replace(' ', "_");
    let extension = &name[split..];
    if label.is_empty() {
        return name.to_string();
    }

    let (label, mut number) = match label.chars().last().and_then(|last| last.to_digit(10)) {
        Some(digit) if digit > 0 => (label[..label.len() - 1].to_string(), digit),
        _ => (label, 1),
    };

    let mut candidate = name.to_string();
    while taken.contains(&candidate.as_str()) {
        number += 1;
        candidate = format!("{label}{number}{extension}");
    }
    candidate
}

/// What a step exposes to the file inputs of the step after it.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PreviousStep {
    pub outfiles: Vec<String>,
    pub stdout: String,
    /// Filled file inputs as `(filename, description)`.
    pub inputs: Vec<(String, String)>,
}

/// Builds the selection offered in front of a file input after the first step.
///
/// # Arguments
///
/// * `previous` - Outputs and inputs of the previous step.
/// * `required` - Whether the file input declares a requirement.
/// * `optional` - Whether a "None" choice is offered.
/// * `pipes` - Whether piping the previous step's output is allowed.
pub fn file_selection(
    previous: &PreviousStep,
    required: bool,
    optional: bool,
    pipes: bool,
) -> SelectionList {
    let from_previous = "from the previous pipeline step.";
    let mut items = Vec::new();
    let mut default = None;

    if optional {
        items.push(SelectionItem::new("None", "", "This input file is optional"));
        default = Some(Value::empty());
    }
    items.push(SelectionItem::new(
        "Previous step output:",
        OUTPUT_HEADER,
        format!("Use an output {from_previous}"),
    ));
    for outfile in previous.outfiles.iter().filter(|name| !name.is_empty()) {
        items.push(SelectionItem::new(
            format!("• {outfile}"),
            outfile.as_str(),
            format!("Use this file {from_previous}"),
        ));
    }
    items.push(SelectionItem::new(
        "• standard output",
        previous.stdout.as_str(),
        format!("Use the stored standard output ({}) {from_previous}", previous.stdout),
    ));
    if required {
        default = Some(Value::from(previous.stdout.as_str()));
    }
    if pipes {
        items.push(SelectionItem::new(
            "• pipe",
            PIPE_MARKER,
            format!("Use the standard output as piped datastream {from_previous}"),
        ));
    }
    items.push(SelectionItem::new(
        "• filename ⟶",
        CUSTOM_MARKER,
        format!("Specify a filename or filepath {from_previous}"),
    ));

    let inputs: Vec<_> = previous
        .inputs
        .iter()
        .filter(|(filename, _)| !filename.is_empty())
        .collect();
    if !inputs.is_empty() {
        items.push(SelectionItem::new(
            "Previous step input:",
            INPUT_HEADER,
            format!("Select an input file {from_previous}"),
        ));
        for (filename, usage) in inputs {
            items.push(SelectionItem::new(
                filename.as_str(),
                filename.as_str(),
                format!("Used by {usage} in the previous pipeline step."),
            ));
        }
    }
    items.push(SelectionItem::new(
        "Local file ⟶",
        LOCAL_MARKER,
        "Use a file from your computer.",
    ));

    SelectionList {
        items,
        default,
        ..SelectionList::default()
    }
}
