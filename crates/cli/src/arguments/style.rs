//! How input values were given on the command line.
//!
//! `-p [STEP:]NAME=VALUE` parameters address inputs by name. Values after `--` fill the
//! positional arguments of every step, in pipeline order. One invocation uses one or the
//! other.

use std::fmt;

use log::warn;
use pline_core::error::Error::MixedParameterMode;
use pline_core::error::Result;

#[derive(PartialEq, Clone, Debug)]
pub enum Style {
    /// Every input keeps its default or saved value
    None,
    /// Raw `[STEP:]NAME=VALUE` parameters
    Named(Vec<String>),
    /// Values for the positional arguments of all steps
    Positional(Vec<String>),
}

impl Style {
    /// The raw values, whichever form they were given in.
    pub fn values(&self) -> &[String] {
        match self {
            Style::None => &[],
            Style::Named(values) | Style::Positional(values) => values,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Style::None => "no",
            Style::Named(_) => "named",
            Style::Positional(_) => "positional",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Style::None => write!(f, "no input values"),
            other => write!(f, "{} {} input value(s)", other.values().len(), other.label()),
        }
    }
}

/// Implemented by argument sets that carry input values for a pipeline.
pub trait Provider {
    /// # Errors
    ///
    /// Returns [`MixedParameterMode`] when named and positional values are both present.
    fn get_style(&self) -> Result<Style>;
}

/// Picks the style from the `-p` parameters and the trailing values.
///
/// # Errors
///
/// Returns [`MixedParameterMode`] if both are given.
///
/// ```rust
/// use pline_cli::arguments::{determine, Style};
///
/// let style = determine(&["2:e=foo".to_string()], &[]).unwrap();
/// assert_eq!(style.to_string(), "1 named input value(s)");
/// assert_eq!(determine(&[], &[]).unwrap(), Style::None);
/// ```
pub fn determine(parameters: &[String], positional: &[String]) -> Result<Style> {
    match (parameters.is_empty(), positional.is_empty()) {
        (true, true) => Ok(Style::None),
        (false, true) => Ok(Style::Named(parameters.to_vec())),
        (true, false) => Ok(Style::Positional(positional.to_vec())),
        (false, false) => {
            warn!(
                "Got {} `-p` parameter(s) and {} value(s) after `--`.",
                parameters.len(),
                positional.len()
            );
            Err(MixedParameterMode)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_values() {
        let style = determine(&[], &[]).unwrap();
        assert_eq!(style, Style::None);
        assert!(style.values().is_empty());
        assert_eq!(style.to_string(), "no input values");
    }

    #[test]
    fn test_named_values_keep_their_step() {
        let params = vec!["e=foo".to_string(), "2:l=true".to_string()];
        let style = determine(&params, &[]).unwrap();
        assert!(matches!(style, Style::Named(_)));
        assert_eq!(style.values()[1], "2:l=true");
        assert_eq!(style.to_string(), "2 named input value(s)");
    }

    #[test]
    fn test_trailing_values_are_positional() {
        let args = vec!["reads.fq".to_string()];
        let style = determine(&[], &args).unwrap();
        assert_eq!(style, Style::Positional(args));
        assert_eq!(style.to_string(), "1 positional input value(s)");
    }

    #[test]
    fn test_mixing_styles_fails() {
        let params = vec!["e=foo".to_string()];
        let args = vec!["reads.fq".to_string()];
        assert!(matches!(
            determine(&params, &args).unwrap_err(),
            MixedParameterMode
        ));
    }
}
