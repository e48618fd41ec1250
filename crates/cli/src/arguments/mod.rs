//! Argument processing and validation for the pline CLI.
//!
//! Input values can reach the pipeline in two ways:
//! - **Named values**: Using `-p [STEP:]NAME=VALUE`
//! - **Positional values**: Provided after `--`, filling positional arguments in order
//!
//! The module ensures the two styles are not mixed and validates the value formats.

pub mod processing;
pub mod style;

pub use processing::{parse_parameter, positional_inputs, process_command_line};
pub use style::determine;
pub use style::Provider;
pub use style::Style;
