//! Turns the values of every pipeline step into the job payload.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::Serialize;

use crate::config::Settings;
use crate::descriptor::Order;
use crate::error::{Error, Result};
use crate::options::{unique_filename, OptionKind};
use crate::plugin::PluginInstance;
use crate::value::{Value, PIPE_MARKER};

/// Characters that make a value need quoting on a command line.
const SHELL_SPECIAL: [char; 6] = ['\\', '`', '*', '@', '$', ' '];

/// One command, or a chain of piped commands, of a job.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct StepPayload {
    pub name: String,
    pub program: String,
    /// Space-joined arguments.
    pub parameters: String,
    /// Comma-joined input files.
    pub infiles: String,
    /// Comma-joined output files.
    pub outfiles: String,
    pub stdout: String,
    /// Location of the plugin descriptor.
    pub plugin: String,
    /// Terminal command lines, one per merged step.
    #[serde(skip)]
    pub commands: Vec<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct JobPayload {
    pub name: String,
    pub pipeline: Vec<StepPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Extra fields sent with every job.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
    /// Uploaded file contents keyed by filename.
    #[serde(skip)]
    pub files: IndexMap<String, String>,
}

impl JobPayload {
    /// The job as it would be typed in a terminal.
    pub fn command_lines(&self) -> Vec<String> {
        self.pipeline
            .iter()
            .map(|step| step.commands.join(" | "))
            .collect()
    }
}

/// Quotes a value containing shell-special characters, dropping quotes inside it.
///
/// ```
/// use pline_core::pipeline::quote;
///
/// assert_eq!(quote("foo"), "foo");
/// assert_eq!(quote("two words"), "'two words'");
/// assert_eq!(quote("it's $HOME"), "'its $HOME'");
/// ```
pub fn quote(value: &str) -> String {
    if value.contains(SHELL_SPECIAL) {
        format!("'{}'", value.replace(['\'', '"'], ""))
    } else {
        value.to_string()
    }
}

/// Builds the payload of a validated pipeline.
///
/// # Errors
///
/// Returns [`Error::EmptyPipeline`] when there are no steps.
pub fn assemble(steps: &[PluginInstance], settings: &Settings) -> Result<JobPayload> {
    let first = steps.first().ok_or(Error::EmptyPipeline)?;
    let mut files = IndexMap::new();
    let mut pipeline: Vec<StepPayload> = Vec::with_capacity(steps.len());

    for instance in steps {
        let step = assemble_step(instance, settings, &mut files);
        match pipeline.last_mut() {
            Some(previous) if instance.is_piped() => pipe_into(previous, step),
            _ => pipeline.push(step),
        }
    }

    Ok(JobPayload {
        name: first.job_name.clone(),
        pipeline,
        email: settings.job_email().map(str::to_string),
        extra: settings.send_data.clone(),
        files,
    })
}

fn assemble_step(
    instance: &PluginInstance,
    settings: &Settings,
    files: &mut IndexMap<String, String>,
) -> StepPayload {
    let registry = &instance.registry;
    let descriptor = &instance.descriptor;
    let value_sep = descriptor
        .value_sep
        .as_deref()
        .unwrap_or(settings.value_sep.as_str());

    let mut infiles = Vec::new();
    let mut renamed: IndexMap<&str, String> = IndexMap::new();
    for node in registry.nodes().filter(|node| !node.is_disabled()) {
        let Some(slot) = node.file() else {
            continue;
        };
        if slot.piped || slot.filename.is_empty() {
            continue;
        }
        let mut filename = slot.filename.clone();
        if let Some(content) = slot.content.as_ref().filter(|_| slot.is_local()) {
            filename = attach(files, &filename, content);
            if filename != slot.filename {
                renamed.insert(node.name.as_str(), filename.clone());
            }
        }
        infiles.push(format!("{}{filename}", slot.filepath));
    }

    let mut start = Vec::new();
    let mut natural = Vec::new();
    let mut end = Vec::new();
    for node in registry.nodes() {
        let Some(arg) = node.arg_name() else {
            continue;
        };
        if node.is_proxy() || node.is_disabled() {
            continue;
        }
        let value = match renamed.get(node.name.as_str()) {
            Some(filename) => Value::Text(filename.clone()),
            None => registry.value(&node.name),
        };
        let text = value.to_string();
        let text = text.trim();
        if text.is_empty() || text == "false" || text == PIPE_MARKER {
            continue;
        }
        let is_default = node.kind != OptionKind::Boolean
            && node
                .default
                .as_ref()
                .is_some_and(|default| default.is_truthy() && default.loose_eq(&value));
        if is_default {
            continue;
        }

        if arg.is_empty() && value == Value::Bool(true) {
            continue;
        }

        let parameter = if arg.is_empty() {
            quote(text)
        } else if text == "true" {
            arg
        } else {
            format!("{arg}{value_sep}{}", quote(text))
        };
        match node.order {
            Order::Start => start.push(parameter),
            Order::Natural => natural.push(parameter),
            Order::End => end.push(parameter),
        }
    }
    let mut parameters: Vec<String> = start.into_iter().chain(natural).chain(end).collect();

    if let Some(config_file) = &descriptor.config_file {
        let filename = attach(files, config_file, &parameters.join("\n"));
        infiles.push(filename.clone());
        let param = &descriptor.config_param;
        let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
        parameters = if param.is_empty() {
            vec![filename]
        } else {
            let dash = if param.starts_with(is_word) { "-" } else { "" };
            let space = if param.ends_with(is_word) { " " } else { "" };
            vec![format!("{dash}{param}{space}{filename}")]
        };
    }

    let stdout = output_name(instance.stdout());
    let mut outfiles: Vec<String> = Vec::new();
    for outfile in instance
        .outfiles()
        .into_iter()
        .map(output_name)
        .chain(std::iter::once(stdout.clone()))
    {
        if !outfile.is_empty() && !outfiles.contains(&outfile) {
            outfiles.push(outfile);
        }
    }

    let parameters = parameters.join(" ");
    let command = if parameters.is_empty() {
        descriptor.program.clone()
    } else {
        format!("{} {parameters}", descriptor.program)
    };
    debug!("Step {}: {command}", instance.step + 1);

    StepPayload {
        name: instance.title().to_string(),
        program: descriptor.program.clone(),
        parameters,
        infiles: infiles.join(","),
        outfiles: outfiles.join(","),
        stdout,
        plugin: instance.path.clone().unwrap_or_else(|| instance.source_id.clone()),
        commands: vec![command],
    }
}

/// Stores an upload under a filename no other upload of the job uses.
fn attach(files: &mut IndexMap<String, String>, filename: &str, content: &str) -> String {
    let taken: Vec<&str> = files.keys().map(String::as_str).collect();
    let filename = unique_filename(filename, &taken);
    files.insert(filename.clone(), content.to_string());
    filename
}

/// A bare extension names a file called `output`.
fn output_name(name: String) -> String {
    if name.starts_with('.') {
        format!("output{name}")
    } else {
        name
    }
}

/// Chains a step reading the previous step's standard output onto that step.
fn pipe_into(previous: &mut StepPayload, step: StepPayload) {
    previous.program = format!("{}|{}", previous.program, step.program);
    previous.parameters = format!("{}|{}", previous.parameters, step.parameters);
    previous.plugin = format!("{}|{}", previous.plugin, step.plugin);
    if !step.infiles.is_empty() {
        previous.infiles = if previous.infiles.is_empty() {
            step.infiles
        } else {
            format!("{},{}", previous.infiles, step.infiles)
        };
    }

    let mut outfiles: Vec<String> = previous
        .outfiles
        .split(',')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    for outfile in step.outfiles.split(',').filter(|name| !name.is_empty()) {
        if outfiles.iter().any(|existing| existing == outfile) {
            warn!(
                "{} will overwrite output file {outfile} of the previous step.",
                step.program
            );
        } else {
            outfiles.push(outfile.to_string());
        }
    }
    previous.outfiles = outfiles.join(",");
    previous.stdout = step.stdout;
    previous.commands.extend(step.commands);
}
