use std::fmt::{Display, Formatter};

use log::error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// A rule string that could not be turned into an expression.
///
/// Never fatal: the caller logs it and falls back to a rule that evaluates to empty.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Could not compile rule `{}`: {}", .text, .cause)]
pub struct RuleCompileError {
    pub text: String,
    pub cause: String,
}

impl RuleCompileError {
    pub fn new(text: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            cause: cause.into(),
        }
    }
}

/// A validation message raised by one option after a submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub option: String,
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "`{}`: {}", self.option, self.message)
    }
}

/// Values that could not be written back into the components of a merged option.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Failed to sync values back to the components of `{}`: {}", .target, .unassigned.join(","))]
pub struct SyncFailure {
    pub target: String,
    pub unassigned: Vec<String>,
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Plugin descriptor is missing the `{}` key.", .0)]
    MissingKey(&'static str),

    #[error("Plugin descriptor could not be parsed: {}", .0)]
    DescriptorFormat(String),

    #[error("Space found in option name: `{}`", .0)]
    OptionWithSpace(String),

    #[error(transparent)]
    RuleCompile(#[from] RuleCompileError),

    #[error("Submission rejected: {}", join_messages(.0))]
    Validation(Vec<ValidationError>),

    #[error(transparent)]
    Sync(#[from] SyncFailure),

    #[error("Job sending failed: {}", .0)]
    Submission(String),

    #[error("Cannot move submission from {} to {}.", .from, .to)]
    InvalidTransition { from: String, to: String },

    #[error("Error {} {} file at `{}`: {}", .action, .file_description, .path, .original)]
    Yaml {
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    },

    #[error("JSON error: {}", .0)]
    Json(#[from] serde_json::Error),

    #[error("IO error with {} file at path `{}`: {}", .file_description, .path, .original)]
    Io {
        file_description: String,
        path: String,
        original: std::io::Error,
    },

    #[error("Option `{}` is missing from plugin {}.", .1, .0)]
    UnknownOption(String, String),

    #[error("Pipeline has no step {}.", .0)]
    UnknownStep(usize),

    #[error("Missing plugin: {}", .0)]
    MissingPlugin(String),

    #[error("Malformed pipeline configuration: {}", .0)]
    MalformedConfig(String),

    #[error("The pipeline is empty. Add a plugin first.")]
    EmptyPipeline,

    #[error("Invalid parameter format: `{}`. Use NAME=VALUE or STEP:NAME=VALUE.", .0)]
    ParameterFormat(String),

    #[error("Unknown parameter: `{}`", .0)]
    MissingParameter(String),

    #[error("Expected {} positional argument(s), got {}.", .0, .1)]
    ParameterCountMismatch(usize, usize),

    #[error("Named (-p) and positional parameters cannot be mixed.")]
    MixedParameterMode,

    #[error("Invalid ID: ID may not be empty")]
    EmptyId,

    #[error("Invalid ID `{}`: ID may not contain spaces", .0)]
    IdWithSpace(String),
}

impl Error {
    pub fn yaml_error(
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    ) -> Self {
        Self::Yaml {
            action,
            file_description,
            path,
            original,
        }
    }

    pub fn io_error(file_description: String, path: String, original: std::io::Error) -> Self {
        Self::Io {
            file_description,
            path,
            original,
        }
    }

    pub fn invalid_transition(from: impl Display, to: impl Display) -> Self {
        let err = Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        };
        error!("{err}");
        err
    }
}
