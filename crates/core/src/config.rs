//! Configuration paths and global settings for pline.
//!
//! Paths may use `~`, which is expanded with `shellexpand`. Settings are read from a
//! YAML file (see [`crate::file_handling::get_settings`]); every field has a default so
//! the file and each of its keys are optional.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Default path for the settings file
const DEFAULT_SETTINGS_PATH: &str = "~/.pline/settings.yml";
/// Default directory searched for plugin descriptors given by id
const DEFAULT_PLUGIN_DIR: &str = "~/.pline/plugins";

/// Job name used when a descriptor does not declare one.
pub const DEFAULT_JOB_NAME: &str = "analysis";
/// Standard output filename used when a descriptor does not declare one.
pub const DEFAULT_STDOUT: &str = "output.log";

/// Resolves the settings file path.
///
/// # Arguments
///
/// * `settings_path_arg` - Optional custom settings file path
///
/// # Examples
///
/// ```
/// use pline_core::config::get_settings_path;
///
/// let custom_path = get_settings_path(&Some("/etc/pline.yml".to_string()));
/// assert_eq!(custom_path, "/etc/pline.yml");
/// ```
pub fn get_settings_path(settings_path_arg: &Option<String>) -> String {
    let settings_path = match settings_path_arg {
        Some(settings_path) => settings_path,
        None => DEFAULT_SETTINGS_PATH,
    };

    shellexpand::tilde(settings_path).to_string()
}

/// Resolves the directory holding plugin descriptors referenced by id.
pub fn get_plugin_dir(plugin_dir_arg: &Option<String>) -> String {
    let plugin_dir = match plugin_dir_arg {
        Some(plugin_dir) => plugin_dir,
        None => DEFAULT_PLUGIN_DIR,
    };

    shellexpand::tilde(plugin_dir).to_string()
}

fn default_pipes() -> bool {
    true
}

fn default_prefix() -> String {
    "-".to_string()
}

fn default_value_sep() -> String {
    " ".to_string()
}

fn default_sync_cooldown_ms() -> u64 {
    100
}

/// Global settings shared by every plugin instance of a pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Notification address; only sent along when it contains `@`.
    #[serde(default)]
    pub email: Option<String>,
    /// Offer `pipe` as a file input choice after the first step.
    #[serde(default = "default_pipes")]
    pub pipes: bool,
    /// Prefix put in front of option names that declare none.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Text between an option name and its value.
    #[serde(default = "default_value_sep")]
    pub value_sep: String,
    /// How long a selection ignores pushes after it changed its linked options.
    #[serde(default = "default_sync_cooldown_ms")]
    pub sync_cooldown_ms: u64,
    /// Extra fields sent with every job.
    #[serde(default)]
    pub send_data: IndexMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            email: None,
            pipes: default_pipes(),
            prefix: default_prefix(),
            value_sep: default_value_sep(),
            sync_cooldown_ms: default_sync_cooldown_ms(),
            send_data: IndexMap::new(),
        }
    }
}

impl Settings {
    /// The email address to attach to a job, if it looks like one.
    pub fn job_email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| email.contains('@'))
    }
}
