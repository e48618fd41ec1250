//! Delivery of assembled jobs to the local filesystem.

use std::fs;
use std::io::{stdout, Write};
use std::path::Path;

use log::{info, warn};
use pline_core::file_handling::write_json;
use pline_core::pipeline::{JobPayload, Transport};

/// Writes the payload as JSON to `output`, with its attachments next to it, or prints
/// the payload to standard output.
#[derive(Debug, Default)]
pub struct FileTransport {
    pub output: Option<String>,
}

impl FileTransport {
    pub fn new(output: Option<String>) -> Self {
        Self { output }
    }

    fn write_attachments(output: &str, payload: &JobPayload) -> Result<(), String> {
        let directory = Path::new(output).parent().unwrap_or_else(|| Path::new("."));
        for (filename, content) in &payload.files {
            let path = directory.join(filename);
            fs::write(&path, content)
                .map_err(|e| format!("Could not write attachment `{}`: {e}", path.display()))?;
            info!("Wrote attachment `{}`.", path.display());
        }
        Ok(())
    }
}

impl Transport for FileTransport {
    fn send(&mut self, payload: &JobPayload) -> Result<String, String> {
        match &self.output {
            Some(output) => {
                write_json("payload", output, payload).map_err(|e| e.to_string())?;
                Self::write_attachments(output, payload)?;
                Ok(format!("Job `{}` written to `{output}`.", payload.name))
            }
            None => {
                let json = serde_json::to_string_pretty(payload).map_err(|e| e.to_string())?;
                writeln!(stdout(), "{json}").map_err(|e| e.to_string())?;
                if !payload.files.is_empty() {
                    warn!(
                        "{} attachment(s) not written; give --output to keep them.",
                        payload.files.len()
                    );
                }
                Ok(format!("Job `{}` printed.", payload.name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use tempfile::TempDir;

    use super::*;

    fn payload() -> JobPayload {
        JobPayload {
            name: "analysis".to_string(),
            pipeline: Vec::new(),
            email: None,
            extra: IndexMap::new(),
            files: IndexMap::from([("reads.fq".to_string(), "ACGT".to_string())]),
        }
    }

    #[test]
    fn test_send_writes_payload_and_attachments() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("job.json").to_str().unwrap().to_string();
        let mut transport = FileTransport::new(Some(output.clone()));

        let receipt = transport.send(&payload()).unwrap();
        assert!(receipt.contains("job.json"));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["name"], "analysis");
        assert_eq!(
            fs::read_to_string(dir.path().join("reads.fq")).unwrap(),
            "ACGT"
        );
    }

    #[test]
    fn test_send_reports_unwritable_output() {
        let mut transport = FileTransport::new(Some("/this/path/does/not/exist/job.json".to_string()));
        assert!(transport.send(&payload()).is_err());
    }
}
