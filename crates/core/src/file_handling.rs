//! Reading plugin descriptors, settings and saved pipelines, and writing JSON output.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::debug;
use serde::Serialize;

use crate::config::Settings;
use crate::descriptor::PluginDescriptor;
use crate::error::Error::{EmptyId, IdWithSpace};
use crate::error::{Error, Result};
use crate::pipeline::PipelineConfig;

fn get_reader(file_description: &str, path: &str) -> Result<File> {
    match File::open(path) {
        Ok(reader) => Ok(reader),
        Err(e) => Err(Error::io_error(
            file_description.to_string(),
            path.to_string(),
            e,
        )),
    }
}

fn read_file(file_description: &str, path: &str) -> Result<String> {
    let mut content = String::new();
    get_reader(file_description, path)?
        .read_to_string(&mut content)
        .map_err(|e| Error::io_error(file_description.to_string(), path.to_string(), e))?;
    Ok(content)
}

/// Reads a plugin descriptor written in JSON or YAML.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The content is neither JSON nor YAML
/// - The descriptor lacks `program` or `options`
///
/// # Examples
///
/// ```no_run
/// use pline_core::file_handling::get_plugin_descriptor;
///
/// let descriptor = get_plugin_descriptor("~/.pline/plugins/grep.json")?;
/// println!("Loaded {}", descriptor.title());
/// # Ok::<(), pline_core::error::Error>(())
/// ```
pub fn get_plugin_descriptor(path: &str) -> Result<PluginDescriptor> {
    let content = read_file("plugin", path)?;

    let document: serde_json::Value = match serde_json::from_str(&content) {
        Ok(document) => document,
        Err(json_error) => {
            debug!("`{path}` is not JSON ({json_error}); reading it as YAML.");
            serde_yaml::from_str(&content).map_err(|e| {
                Error::yaml_error(
                    "reading".to_string(),
                    "plugin".to_string(),
                    path.to_string(),
                    e,
                )
            })?
        }
    };

    PluginDescriptor::from_json(document)
}

/// Reads the settings file. A missing or empty file gives the default settings.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or holds invalid YAML.
pub fn get_settings(path: &str) -> Result<Settings> {
    if !Path::exists(Path::new(path)) {
        return Ok(Settings::default());
    }

    let content = read_file("settings", path)?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    serde_yaml::from_str(&content).map_err(|e| {
        Error::yaml_error(
            "reading".to_string(),
            "settings".to_string(),
            path.to_string(),
            e,
        )
    })
}

/// Reads a saved pipeline configuration.
///
/// # Errors
///
/// Returns [`Error::MalformedConfig`] when the content does not describe a pipeline.
pub fn get_pipeline_config(path: &str) -> Result<PipelineConfig> {
    let content = read_file("pipeline", path)?;

    serde_yaml::from_str(&content).map_err(|e| Error::MalformedConfig(format!("{path}: {e}")))
}

/// Writes a value as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the file cannot be created or the value cannot be serialized.
pub fn write_json<T: Serialize>(file_description: &str, path: &str, value: &T) -> Result<()> {
    let f = File::create(path)
        .map_err(|e| Error::io_error(file_description.to_string(), path.to_string(), e))?;

    serde_json::to_writer_pretty(f, value)?;
    Ok(())
}

/// Writes a pipeline configuration for [`get_pipeline_config`].
pub fn write_pipeline_config(path: &str, config: &PipelineConfig) -> Result<()> {
    write_json("pipeline", path, config)
}

/// Checks a declared plugin id.
///
/// # Errors
///
/// Returns an error when the id is empty or contains spaces.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(EmptyId);
    }

    if id.contains(' ') {
        return Err(IdWithSpace(id.to_string()));
    }

    Ok(())
}

/// Locates a plugin given as a path, or as an id inside `plugin_dir`.
pub fn resolve_plugin_path(plugin: &str, plugin_dir: &str) -> String {
    let expanded = shellexpand::tilde(plugin).to_string();
    if Path::new(&expanded).exists() {
        return expanded;
    }

    ["json", "yml", "yaml"]
        .iter()
        .map(|extension| {
            Path::new(plugin_dir)
                .join(format!("{plugin}.{extension}"))
                .to_string_lossy()
                .to_string()
        })
        .find(|candidate| Path::new(candidate).exists())
        .unwrap_or(expanded)
}
