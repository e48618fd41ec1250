//! Command-line argument parsing and validation.
//!
//! This module defines the command-line interface structure and provides
//! validation for CLI arguments using the `clap` crate.

use crate::arguments::{determine, Provider, Style};
use clap::Parser;
use pline_core::error::Result;

/// Command-line arguments for the pline CLI tool.
///
/// Plugins given on the command line become the steps of a pipeline, in order. Their
/// inputs are filled with `-p` parameters or positional values, and the assembled job
/// is written as JSON.
///
/// # Examples
///
/// ```rust
/// use clap::Parser;
/// use pline_cli::cli_args::Args;
///
/// let args = Args::parse_from(["pline", "grep", "-p", "e=foo"]);
/// assert_eq!(args.plugins, vec!["grep"]);
/// ```
#[derive(Parser, Debug)] // requires `derive` feature
#[command(term_width = 0)] // Just to make testing across clap features easier
pub struct Args {
    /// Plugin descriptors to run, as paths or as ids inside the plugin directory.
    pub plugins: Vec<String>,

    /// Path to a saved pipeline configuration to restore before the plugins.
    #[arg(long, short = 'c')]
    pub config_path: Option<String>,

    /// Path to the settings file YAML.
    ///
    /// If not provided, defaults to `~/.pline/settings.yml`.
    #[arg(long, short = 's')]
    pub settings_path: Option<String>,

    /// Directory holding plugin descriptors referenced by id.
    ///
    /// If not provided, defaults to `~/.pline/plugins`.
    #[arg(long, short = 'P')]
    pub plugin_dir: Option<String>,

    /// Input values in the format `[STEP:]NAME=VALUE`.
    ///
    /// Steps count from 1; without a step the first one is used. Multiple values can be
    /// provided with repeated `-p` flags. Cannot be mixed with positional values.
    ///
    /// # Examples
    /// ```bash
    /// pline grep wc -p e=foo -p 2:l=true
    /// ```
    #[arg(long = "param", short = 'p', action = clap::ArgAction::Append)]
    pub parameters: Vec<String>,

    /// Values for the positional arguments of every step, in order.
    ///
    /// # Examples
    /// ```bash
    /// pline sort -- input.txt
    /// ```
    #[arg(last = true)]
    pub positional_arguments: Vec<String>,

    /// Job name sent with the payload.
    #[arg(long, short = 'n')]
    pub job_name: Option<String>,

    /// Email address notified about the job, overriding the settings.
    #[arg(long, short = 'e')]
    pub email: Option<String>,

    /// Save the pipeline and its changed inputs to this file.
    #[arg(long, short = 'x')]
    pub export: Option<String>,

    /// Write the payload to this file instead of standard output.
    #[arg(long, short = 'o')]
    pub output: Option<String>,

    /// Print the terminal commands without producing a payload.
    #[arg(long, short = 'd', action)]
    pub dry_run: bool,
}

impl Provider for Args {
    /// Determines the argument style based on the provided arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if both named and positional values are provided.
    fn get_style(&self) -> Result<Style> {
        determine(&self.parameters, &self.positional_arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_args_default_values() {
        let args = Args::parse_from(["pline"]);

        assert!(args.plugins.is_empty());
        assert!(args.config_path.is_none());
        assert!(args.settings_path.is_none());
        assert!(args.plugin_dir.is_none());
        assert!(args.parameters.is_empty());
        assert!(args.positional_arguments.is_empty());
        assert!(args.job_name.is_none());
        assert!(args.email.is_none());
        assert!(args.export.is_none());
        assert!(args.output.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn test_args_short_flags() {
        let args = Args::parse_from([
            "pline",
            "-c",
            "/saved/pipeline.json",
            "-s",
            "/custom/settings.yml",
            "-P",
            "/custom/plugins",
            "-n",
            "search",
            "-e",
            "me@example.org",
            "-x",
            "export.json",
            "-o",
            "job.json",
            "-d",
        ]);

        assert_eq!(args.config_path, Some("/saved/pipeline.json".to_string()));
        assert_eq!(args.settings_path, Some("/custom/settings.yml".to_string()));
        assert_eq!(args.plugin_dir, Some("/custom/plugins".to_string()));
        assert_eq!(args.job_name, Some("search".to_string()));
        assert_eq!(args.email, Some("me@example.org".to_string()));
        assert_eq!(args.export, Some("export.json".to_string()));
        assert_eq!(args.output, Some("job.json".to_string()));
        assert!(args.dry_run);
    }

    #[test]
    fn test_args_long_flags() {
        let args = Args::parse_from([
            "pline",
            "--config-path",
            "/saved/pipeline.json",
            "--settings-path",
            "/custom/settings.yml",
            "--plugin-dir",
            "/custom/plugins",
            "--dry-run",
        ]);

        assert_eq!(args.config_path, Some("/saved/pipeline.json".to_string()));
        assert_eq!(args.settings_path, Some("/custom/settings.yml".to_string()));
        assert_eq!(args.plugin_dir, Some("/custom/plugins".to_string()));
        assert!(args.dry_run);
    }

    #[test]
    fn test_args_plugins_and_parameters() {
        let args = Args::parse_from([
            "pline",
            "grep",
            "wc",
            "-p",
            "e=foo",
            "--param",
            "2:l=true",
        ]);

        assert_eq!(args.plugins, vec!["grep", "wc"]);
        assert_eq!(args.parameters, vec!["e=foo", "2:l=true"]);
    }

    #[test]
    fn test_args_positional_arguments() {
        let args = Args::parse_from(["pline", "sort", "--", "input.txt", "-r"]);

        assert_eq!(args.plugins, vec!["sort"]);
        assert_eq!(args.positional_arguments, vec!["input.txt", "-r"]);
    }

    #[test]
    fn test_style_provider_none() {
        let args = Args::parse_from(["pline", "grep"]);
        assert_eq!(args.get_style().unwrap(), Style::None);
    }

    #[test]
    fn test_style_provider_named() {
        let args = Args::parse_from(["pline", "grep", "-p", "e=foo"]);
        match args.get_style().unwrap() {
            Style::Named(params) => assert_eq!(params, vec!["e=foo"]),
            _ => panic!("Expected Named argument style"),
        }
    }

    #[test]
    fn test_style_provider_mixed_error() {
        let args = Args::parse_from(["pline", "grep", "-p", "e=foo", "--", "input.txt"]);
        assert!(args.get_style().is_err());
    }
}
