use std::fmt::{Display, Formatter};

use log::{info, warn};

use super::assemble::{assemble, JobPayload};
use super::validate_steps;
use crate::config::Settings;
use crate::error::{Error, Result, ValidationError};
use crate::plugin::PluginInstance;

/// Delivers assembled jobs.
pub trait Transport {
    /// Sends a payload, returning a receipt or the failure message.
    fn send(&mut self, payload: &JobPayload) -> std::result::Result<String, String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmissionState {
    #[default]
    Idle,
    Validating,
    Ready,
    Rejected,
    Sending,
    Sent,
    Failed,
}

impl SubmissionState {
    fn can_move_to(self, next: SubmissionState) -> bool {
        use SubmissionState::*;

        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Ready)
                | (Validating, Rejected)
                | (Rejected, Idle)
                | (Ready, Sending)
                | (Ready, Idle)
                | (Sending, Sent)
                | (Sending, Failed)
                | (Sent, Idle)
                | (Failed, Idle)
        )
    }
}

impl Display for SubmissionState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SubmissionState::Idle => "idle",
            SubmissionState::Validating => "validating",
            SubmissionState::Ready => "ready",
            SubmissionState::Rejected => "rejected",
            SubmissionState::Sending => "sending",
            SubmissionState::Sent => "sent",
            SubmissionState::Failed => "failed",
        };
        formatter.write_str(name)
    }
}

/// Progress of one submission attempt.
///
/// Validation messages stay available after a rejection until the next attempt passes.
#[derive(Debug, Default)]
pub struct Submission {
    state: SubmissionState,
    submitted: bool,
    errors: Vec<ValidationError>,
}

impl Submission {
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Whether a submission was attempted since the last completed one.
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    fn transition(&mut self, next: SubmissionState) -> Result<()> {
        if !self.state.can_move_to(next) {
            return Err(Error::invalid_transition(self.state, next));
        }
        info!("Submission {} -> {next}", self.state);
        self.state = next;
        Ok(())
    }

    /// Validates the steps and assembles their payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] with every message when a step is rejected; the
    /// state returns to idle.
    pub fn submit(&mut self, steps: &[PluginInstance], settings: &Settings) -> Result<JobPayload> {
        self.transition(SubmissionState::Validating)?;
        self.submitted = true;

        let errors = validate_steps(steps);
        if !errors.is_empty() {
            warn!("Submission rejected with {} message(s).", errors.len());
            self.errors = errors.clone();
            self.reject()?;
            return Err(Error::Validation(errors));
        }
        self.errors.clear();

        match assemble(steps, settings) {
            Ok(payload) => {
                self.transition(SubmissionState::Ready)?;
                Ok(payload)
            }
            Err(err) => {
                self.reject()?;
                Err(err)
            }
        }
    }

    fn reject(&mut self) -> Result<()> {
        self.transition(SubmissionState::Rejected)?;
        self.transition(SubmissionState::Idle)
    }

    pub fn begin_sending(&mut self) -> Result<()> {
        self.transition(SubmissionState::Sending)
    }

    /// Drops an assembled payload without sending it.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(SubmissionState::Idle)?;
        self.submitted = false;
        Ok(())
    }

    /// Records the transport's outcome and returns to idle.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Submission`] with the transport's message on failure.
    pub fn complete(&mut self, outcome: std::result::Result<String, String>) -> Result<String> {
        let result = match outcome {
            Ok(receipt) => {
                self.transition(SubmissionState::Sent)?;
                Ok(receipt)
            }
            Err(message) => {
                self.transition(SubmissionState::Failed)?;
                Err(Error::Submission(message))
            }
        };
        self.transition(SubmissionState::Idle)?;
        self.submitted = false;
        result
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::descriptor::PluginDescriptor;

    fn grep() -> Vec<PluginInstance> {
        let descriptor = PluginDescriptor::from_json(json!({
            "program": "grep",
            "options": [{"text": "pattern", "option": "e", "required": "pattern needed"}]
        }))
        .unwrap();
        vec![PluginInstance::new(descriptor, "grep", None, 0, None, &Settings::default()).unwrap()]
    }

    #[test]
    fn test_rejection_keeps_messages() {
        let steps = grep();
        let mut submission = Submission::default();
        let result = submission.submit(&steps, &Settings::default());
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(submission.state(), SubmissionState::Idle);
        assert!(submission.is_submitted());
        assert_eq!(submission.errors()[0].message, "pattern needed");
    }

    #[test]
    fn test_sent_and_failed_return_to_idle() {
        let mut steps = grep();
        steps[0].write("pattern", "foo").unwrap();
        let mut submission = Submission::default();

        submission.submit(&steps, &Settings::default()).unwrap();
        assert_eq!(submission.state(), SubmissionState::Ready);
        assert!(submission.errors().is_empty());
        submission.begin_sending().unwrap();
        assert_eq!(submission.complete(Ok("job 1".to_string())).unwrap(), "job 1");
        assert_eq!(submission.state(), SubmissionState::Idle);
        assert!(!submission.is_submitted());

        submission.submit(&steps, &Settings::default()).unwrap();
        submission.begin_sending().unwrap();
        let failure = submission.complete(Err("server down".to_string()));
        assert!(matches!(failure, Err(Error::Submission(message)) if message == "server down"));
        assert_eq!(submission.state(), SubmissionState::Idle);
    }

    #[test]
    fn test_invalid_transition() {
        let mut submission = Submission::default();
        assert!(matches!(
            submission.begin_sending(),
            Err(Error::InvalidTransition { .. })
        ));
    }
}
