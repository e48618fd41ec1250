//! Plugin library, pipeline steps and saved pipeline configurations.

mod assemble;
mod submission;

use indexmap::IndexMap;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::descriptor::PluginDescriptor;
use crate::error::{Error, Result, ValidationError};
use crate::file_handling::validate_id;
use crate::plugin::PluginInstance;
use crate::value::Value;

pub use assemble::{assemble, quote, JobPayload, StepPayload};
pub use submission::{Submission, SubmissionState, Transport};

#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub descriptor: PluginDescriptor,
    pub path: Option<String>,
}

/// Descriptors available to a pipeline, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Library {
    plugins: IndexMap<String, LibraryEntry>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor under its `id`, or its title with non-word characters replaced.
    ///
    /// A descriptor whose id is taken is not added again; the existing id is returned.
    ///
    /// # Errors
    ///
    /// Returns an error when the declared id is empty or contains spaces.
    pub fn add(&mut self, descriptor: PluginDescriptor, path: Option<String>) -> Result<String> {
        let id = match &descriptor.id {
            Some(id) => {
                validate_id(id)?;
                id.clone()
            }
            None => descriptor
                .title()
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                .collect(),
        };
        if self.plugins.contains_key(&id) {
            warn!("Plugin `{id}` is already loaded; keeping the first one.");
            return Ok(id);
        }
        info!("Loaded plugin `{id}`.");
        self.plugins
            .insert(id.clone(), LibraryEntry { descriptor, path });
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&LibraryEntry> {
        self.plugins.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// A saved pipeline: plugin ids and the inputs changed in each step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub pipeline: Vec<ConfigStep>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfigStep {
    pub plugin: String,
    /// Job name of the step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: IndexMap<String, Value>,
}

#[derive(Debug)]
pub struct Pipeline {
    steps: Vec<PluginInstance>,
    settings: Settings,
    submission: Submission,
}

impl Pipeline {
    pub fn new(settings: Settings) -> Self {
        Self {
            steps: Vec::new(),
            settings,
            submission: Submission::default(),
        }
    }

    /// Rebuilds a saved pipeline from the plugins of `library`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedConfig`] for a configuration without steps and
    /// [`Error::MissingPlugin`] when a step names a plugin the library lacks.
    pub fn open(library: &Library, config: &PipelineConfig, settings: Settings) -> Result<Self> {
        if config.pipeline.is_empty() {
            return Err(Error::MalformedConfig(format!(
                "pipeline `{}` has no steps",
                config.name
            )));
        }
        let mut pipeline = Self::new(settings);
        for step in &config.pipeline {
            let index = pipeline.push(library, &step.plugin)?;
            let instance = pipeline.step_mut(index)?;
            instance.load_preset(&step.inputs, true)?;
            if let Some(name) = step.name.as_ref().filter(|name| !name.is_empty()) {
                instance.job_name = name.clone();
            }
        }
        info!(
            "Opened pipeline `{}` with {} steps.",
            config.name,
            pipeline.len()
        );
        Ok(pipeline)
    }

    /// Places a copy of a library plugin after the last step and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingPlugin`] for an unknown id, or the registration error of the
    /// descriptor.
    pub fn push(&mut self, library: &Library, id: &str) -> Result<usize> {
        let entry = library
            .get(id)
            .ok_or_else(|| Error::MissingPlugin(id.to_string()))?;
        let step = self.steps.len();
        let previous = self.steps.last().map(PluginInstance::snapshot);
        let instance = PluginInstance::new(
            entry.descriptor.clone(),
            id,
            entry.path.clone(),
            step,
            previous,
            &self.settings,
        )?;
        self.steps.push(instance);
        Ok(step)
    }

    pub fn pop(&mut self) -> Option<PluginInstance> {
        let removed = self.steps.pop();
        if let Some(instance) = &removed {
            info!("Removed step {} ({}).", instance.step + 1, instance.id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn steps(&self) -> &[PluginInstance] {
        &self.steps
    }

    pub fn step(&self, index: usize) -> Option<&PluginInstance> {
        self.steps.get(index)
    }

    pub fn step_mut(&mut self, index: usize) -> Result<&mut PluginInstance> {
        self.steps.get_mut(index).ok_or(Error::UnknownStep(index))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    /// Writes an input of the step at `index`.
    pub fn set_value(&mut self, index: usize, key: &str, value: impl Into<Value>) -> Result<()> {
        self.step_mut(index)?.write(key, value)
    }

    /// Sets the job name, carried by the first step.
    pub fn set_job_name(&mut self, name: &str) -> Result<()> {
        self.step_mut(0)?.job_name = name.to_string();
        Ok(())
    }

    /// Validation messages of every step.
    pub fn validate(&self) -> Vec<ValidationError> {
        validate_steps(&self.steps)
    }

    /// Validates and assembles the payload without touching the submission state.
    pub fn payload(&self) -> Result<JobPayload> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }
        assemble(&self.steps, &self.settings)
    }

    /// Runs a full submission: validation, assembly and delivery through `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when inputs are rejected and [`Error::Submission`]
    /// with the transport's message when delivery fails.
    pub fn dispatch(&mut self, transport: &mut dyn Transport) -> Result<String> {
        let payload = self.submission.submit(&self.steps, &self.settings)?;
        self.submission.begin_sending()?;
        let outcome = transport.send(&payload);
        self.submission.complete(outcome)
    }

    /// Saves the plugin ids and changed inputs of every step.
    pub fn export(&self, name: &str, desc: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            name: name.to_string(),
            desc: desc.map(str::to_string),
            pipeline: self
                .steps
                .iter()
                .map(|instance| ConfigStep {
                    plugin: instance.source_id.clone(),
                    name: Some(instance.job_name.clone()),
                    inputs: instance.read_inputs(),
                })
                .collect(),
        }
    }
}

/// Messages of every step, tagged with the step id when there are several.
pub(crate) fn validate_steps(steps: &[PluginInstance]) -> Vec<ValidationError> {
    let several = steps.len() > 1;
    steps
        .iter()
        .flat_map(|instance| {
            instance.registry.validate().into_iter().map(move |error| {
                if several {
                    ValidationError {
                        option: format!("{}:{}", instance.id, error.option),
                        ..error
                    }
                } else {
                    error
                }
            })
        })
        .collect()
}
