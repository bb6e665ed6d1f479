//! # Task Results
//!
//! The value returned to the pipeline, and the base64 transport encoding
//! used when one task's result is piped into the next.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::{InputFileRef, OutputFile};

#[derive(Debug, Error)]
pub enum ResultError {
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub output_files: Vec<OutputFile>,
    pub workflow_id: Option<String>,
    /// Space-joined argument vector of the last external invocation.
    pub command: String,
    #[serde(default)]
    pub task_logs: Vec<OutputFile>,
}

impl TaskResult {
    pub fn empty(workflow_id: Option<String>) -> Self {
        Self {
            output_files: Vec::new(),
            workflow_id,
            command: String::new(),
            task_logs: Vec::new(),
        }
    }

    /// Serialize to JSON and wrap in base64 for the next pipeline stage.
    pub fn encode(&self) -> Result<String, ResultError> {
        let json = serde_json::to_vec(self)?;
        Ok(STANDARD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self, ResultError> {
        let bytes = STANDARD.decode(encoded.trim())?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Minimal view of an upstream result: only its output files matter here.
#[derive(Debug, Deserialize)]
struct PipeResult {
    #[serde(default)]
    output_files: Vec<InputFileRef>,
}

/// Resolve the effective input list for a task.
///
/// Output files of an upstream `pipe_result` come first, followed by the
/// explicitly supplied `input_files`.
pub fn gather_input_files(
    pipe_result: Option<&str>,
    input_files: Vec<InputFileRef>,
) -> Result<Vec<InputFileRef>, ResultError> {
    let mut gathered = match pipe_result {
        Some(encoded) if !encoded.trim().is_empty() => {
            let bytes = STANDARD.decode(encoded.trim())?;
            let upstream: PipeResult = serde_json::from_slice(&bytes)?;
            upstream.output_files
        }
        _ => Vec::new(),
    };
    gathered.extend(input_files);
    Ok(gathered)
}
