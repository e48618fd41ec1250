use clap::Parser;
use itertools::Itertools;
use log::{debug, info, warn};
use pline_core::config::Settings;
use pline_core::error::{Error, Result};
use pline_core::pipeline::{Library, Pipeline, PipelineConfig};
use pline_core::{config, file_handling};
use std::process::ExitCode;

use pline_cli::arguments::{process_command_line, Provider};
use pline_cli::cli_args::Args;
use pline_cli::transport::FileTransport;

/// Load the settings file, applying command-line overrides
fn initialize_settings(args: &Args) -> Result<Settings> {
    let settings_path = config::get_settings_path(&args.settings_path);
    debug!("Settings path: `{}`", settings_path);

    let mut settings = file_handling::get_settings(&settings_path)?;
    if let Some(email) = &args.email {
        settings.email = Some(email.clone());
    }
    Ok(settings)
}

/// Read a plugin descriptor into the library, returning its id
fn load_plugin(library: &mut Library, plugin: &str, plugin_dir: &str) -> Result<String> {
    let path = file_handling::resolve_plugin_path(plugin, plugin_dir);
    debug!("Plugin `{plugin}` read from `{path}`");

    let descriptor = file_handling::get_plugin_descriptor(&path)?;
    library.add(descriptor, Some(path))
}

/// Load the plugins a saved configuration refers to
fn load_config_plugins(
    library: &mut Library,
    config: &PipelineConfig,
    plugin_dir: &str,
) -> Result<()> {
    for plugin in config.pipeline.iter().map(|step| step.plugin.as_str()).unique() {
        if library.get(plugin).is_some() {
            continue;
        }
        let id = load_plugin(library, plugin, plugin_dir)?;
        if id != plugin {
            warn!("Descriptor for `{plugin}` declares the id `{id}`.");
        }
    }
    Ok(())
}

/// Build the pipeline from the saved configuration and the plugins given as arguments
fn initialize_pipeline(args: &Args, settings: Settings) -> Result<Pipeline> {
    let plugin_dir = config::get_plugin_dir(&args.plugin_dir);
    let mut library = Library::new();

    let ids = args
        .plugins
        .iter()
        .map(|plugin| load_plugin(&mut library, plugin, &plugin_dir))
        .collect::<Result<Vec<_>>>()?;

    let mut pipeline = match &args.config_path {
        Some(config_path) => {
            let saved = file_handling::get_pipeline_config(config_path)?;
            load_config_plugins(&mut library, &saved, &plugin_dir)?;
            Pipeline::open(&library, &saved, settings)?
        }
        None => Pipeline::new(settings),
    };

    for id in &ids {
        pipeline.push(&library, id)?;
    }

    if pipeline.is_empty() {
        return Err(Error::EmptyPipeline);
    }
    Ok(pipeline)
}

fn print_commands(pipeline: &Pipeline) -> Result<()> {
    let payload = pipeline.payload()?;
    println!(
        "Commands for job `{}`:\n{}",
        payload.name,
        payload.command_lines().iter().join("\n")
    );
    Ok(())
}

fn execute() -> Result<()> {
    let args = Args::parse();

    let settings = initialize_settings(&args)?;
    let mut pipeline = initialize_pipeline(&args, settings)?;

    process_command_line(args.get_style()?, &mut pipeline)?;

    if let Some(job_name) = &args.job_name {
        pipeline.set_job_name(job_name)?;
    }

    if let Some(export_path) = &args.export {
        let name = pipeline
            .step(0)
            .map(|step| step.job_name.clone())
            .unwrap_or_default();
        file_handling::write_pipeline_config(export_path, &pipeline.export(&name, None))?;
        info!("Pipeline saved to `{export_path}`.");
    }

    if args.dry_run {
        println!("Dry run is specified, not writing the payload.");
        return print_commands(&pipeline);
    }

    let mut transport = FileTransport::new(args.output.clone());
    let receipt = pipeline.dispatch(&mut transport)?;
    info!("{receipt}");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    match execute() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
