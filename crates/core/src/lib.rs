//! Pline Core Library
//!
//! This crate turns plugin descriptors (JSON or YAML documents describing a
//! command-line program and its options) into linked, validated option values, and
//! assembles a pipeline of such plugins into a job payload of shell command lines.
//!
//! # Key Features
//!
//! - **Descriptors**: Parse plugin documents and their option shorthand
//! - **Rules**: A small expression language for defaults, toggles, validation and
//!   output filenames
//! - **Option Registry**: Typed option values with merged, linked and checkbox options
//!   kept in sync when any of them changes
//! - **Pipelines**: Chain plugins, pipe files between steps and assemble the payload
//! - **Submission**: Validate, assemble and hand the payload to a [`pipeline::Transport`]
//!
//! # Examples
//!
//! Building a one-step pipeline and printing its command line:
//!
//! ```no_run
//! use pline_core::config::Settings;
//! use pline_core::file_handling::get_plugin_descriptor;
//! use pline_core::pipeline::{Library, Pipeline};
//!
//! let mut library = Library::new();
//! let id = library.add(get_plugin_descriptor("grep.json")?, None)?;
//!
//! let mut pipeline = Pipeline::new(Settings::default());
//! let step = pipeline.push(&library, &id)?;
//! pipeline.set_value(step, "e", "foo")?;
//! for line in pipeline.payload()?.command_lines() {
//!     println!("{line}");
//! }
//! # Ok::<(), pline_core::error::Error>(())
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod file_handling;
mod linkage;
pub mod options;
pub mod pipeline;
pub mod plugin;
pub mod rules;
pub mod value;
