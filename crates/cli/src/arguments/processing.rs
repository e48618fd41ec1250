use crate::arguments::style::Style;
use itertools::Itertools;
use log::debug;
use pline_core::error::Error::{MissingParameter, ParameterCountMismatch, ParameterFormat};
use pline_core::error::Result;
use pline_core::options::OptionKind;
use pline_core::pipeline::Pipeline;

/// A parsed `[STEP:]NAME=VALUE` parameter, with the step counted from 0.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParameter {
    pub step: usize,
    pub name: String,
    pub value: String,
}

/// Parses `[STEP:]NAME=VALUE`. Steps count from 1 on the command line.
///
/// # Errors
///
/// Returns [`ParameterFormat`] when the `=` is missing, the name is empty or the step is
/// not a positive number.
pub fn parse_parameter(parameter: &str) -> Result<NamedParameter> {
    let (key, value) = parameter
        .split_once('=')
        .ok_or_else(|| ParameterFormat(parameter.to_string()))?;

    let (step, name) = match key.split_once(':') {
        Some((step, name)) => {
            let step = step
                .parse::<usize>()
                .ok()
                .filter(|step| *step > 0)
                .ok_or_else(|| ParameterFormat(parameter.to_string()))?;
            (step - 1, name)
        }
        None => (0, key),
    };

    if name.is_empty() {
        return Err(ParameterFormat(parameter.to_string()));
    }

    Ok(NamedParameter {
        step,
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Writes command-line values into the steps of `pipeline`.
///
/// # Errors
///
/// Returns an error if:
/// - A named parameter is malformed or names a step or input that does not exist
/// - The number of positional values differs from the number of positional arguments
pub fn process_command_line(argument_style: Style, pipeline: &mut Pipeline) -> Result<()> {
    debug!("Applying {argument_style}.");
    match argument_style {
        Style::None => Ok(()),
        Style::Named(named_params) => process_named_parameters(&named_params, pipeline),
        Style::Positional(positional_params) => {
            process_positional_parameters(&positional_params, pipeline)
        }
    }
}

fn process_named_parameters(named_params: &[String], pipeline: &mut Pipeline) -> Result<()> {
    for param_str in named_params {
        let parameter = parse_parameter(param_str)?;
        let instance = pipeline.step_mut(parameter.step)?;

        let name = instance
            .registry
            .resolve(&parameter.name)
            .map(str::to_string)
            .ok_or_else(|| MissingParameter(parameter.name.clone()))?;

        debug!("Step {}: `{name}` = `{}`", parameter.step + 1, parameter.value);
        instance.write(&name, parameter.value)?;
    }
    Ok(())
}

/// Positional arguments of every step as `(step, node name)`, in command-line order.
pub fn positional_inputs(pipeline: &Pipeline) -> Vec<(usize, String)> {
    pipeline
        .steps()
        .iter()
        .enumerate()
        .flat_map(|(index, instance)| {
            instance
                .registry
                .nodes()
                .filter(|node| node.option.as_deref() == Some(""))
                .filter(|node| !node.is_proxy() && !node.is_disabled())
                .filter(|node| node.kind != OptionKind::Hidden)
                .map(move |node| (index, node.name.clone()))
        })
        .collect()
}

fn process_positional_parameters(positional_params: &[String], pipeline: &mut Pipeline) -> Result<()> {
    let inputs = positional_inputs(pipeline);
    if positional_params.len() != inputs.len() {
        return Err(ParameterCountMismatch(inputs.len(), positional_params.len()));
    }

    debug!(
        "Positional inputs: {}",
        inputs.iter().map(|(_, name)| name).join(", ")
    );
    for ((index, name), value) in inputs.iter().zip(positional_params) {
        pipeline.set_value(*index, name, value.as_str())?;
    }
    Ok(())
}
