//! # RECmd Task
//!
//! Extracts a triage archive, optionally derives a hostname prefix from a
//! companion `openrelik-config.zip`, runs RECmd over the extracted tree and
//! reports the produced files.
//!
//! Processing order for one invocation:
//! 1. resolve inputs (upstream pipe result + explicit files)
//! 2. config archive, if present: extract the hostname marker, derive the
//!    prefix, remove the extraction directory
//! 3. require exactly one remaining (image) archive
//! 4. extract it, run RECmd with heartbeats, remove the extraction directory

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, info_span, warn};

use crate::archive::{ArchiveError, ArchiveExtractor, ExportDir};
use crate::config::WorkerConfig;
use crate::constants::{
    CONFIG_ARCHIVE_NAME, CSV_REPORT_NAME, EXTRACTION_LOG_PREFIX, HOSTNAME_GLOB, RECMD_DATA_TYPE,
    WORKER_DESCRIPTION, WORKER_DISPLAY_NAME,
};
use crate::files::{InputFileRef, OutputFile, create_output_file};
use crate::hostname;
use crate::process::{self, ProcessError};
use crate::progress::ProgressReporter;
use crate::recmd;
use crate::result::{ResultError, TaskResult, gather_input_files};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("failed to extract {archive}: {source}")]
    Extraction {
        archive: String,
        #[source]
        source: ArchiveError,
    },
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("RECmd failed on {archive}: {status}")]
    ToolFailed { archive: String, status: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid pipe result: {0}")]
    Result(#[from] ResultError),
}

/// Per-invocation options chosen by the user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub archive_password: Option<String>,
}

impl TaskConfig {
    fn password(&self) -> Option<&str> {
        self.archive_password
            .as_deref()
            .filter(|password| !password.is_empty())
    }
}

/// Arguments of one task invocation.
#[derive(Debug, Clone, Default)]
pub struct TaskRequest {
    /// Base64-encoded result of the upstream task, if any.
    pub pipe_result: Option<String>,
    pub input_files: Vec<InputFileRef>,
    pub output_path: PathBuf,
    pub workflow_id: Option<String>,
    pub task_config: TaskConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskConfigOption {
    pub name: String,
    pub label: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub required: bool,
}

/// Registration metadata advertised to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskMetadata {
    pub display_name: String,
    pub description: String,
    pub task_config: Vec<TaskConfigOption>,
}

pub fn task_metadata() -> TaskMetadata {
    TaskMetadata {
        display_name: WORKER_DISPLAY_NAME.to_string(),
        description: WORKER_DESCRIPTION.to_string(),
        task_config: vec![TaskConfigOption {
            name: "archive_password".to_string(),
            label: "Password for the input archives".to_string(),
            description: "The password needed to extract the input archives".to_string(),
            kind: "text".to_string(),
            required: false,
        }],
    }
}

pub struct RecmdTask {
    config: WorkerConfig,
    extractor: Box<dyn ArchiveExtractor>,
    reporter: Arc<dyn ProgressReporter>,
}

impl RecmdTask {
    pub fn new(
        config: WorkerConfig,
        extractor: Box<dyn ArchiveExtractor>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            extractor,
            reporter,
        }
    }

    pub fn run(&self, request: TaskRequest) -> Result<TaskResult, TaskError> {
        let span = info_span!(
            "task",
            task_name = %self.config.task_name,
            worker_name = WORKER_DISPLAY_NAME,
            workflow_id = request.workflow_id.as_deref().unwrap_or(""),
        );
        let _enter = span.enter();
        info!(
            "starting {} for workflow {}",
            self.config.task_name,
            request.workflow_id.as_deref().unwrap_or("-")
        );

        let TaskRequest {
            pipe_result,
            input_files,
            output_path,
            workflow_id,
            task_config,
        } = request;

        let input_files = gather_input_files(pipe_result.as_deref(), input_files)?;
        if input_files.is_empty() {
            info!("no input files, nothing to do");
            return Ok(TaskResult::empty(workflow_id));
        }

        let password = task_config.password();
        let mut task_logs = Vec::new();

        let mut prefix = String::new();
        if let Some(config_item) = input_files
            .iter()
            .find(|file| file.display_name == CONFIG_ARCHIVE_NAME)
        {
            if let Some(derived) =
                self.hostname_prefix(config_item, &output_path, password, &mut task_logs)?
            {
                prefix = derived;
            }
        }

        let image_files: Vec<&InputFileRef> = input_files
            .iter()
            .filter(|file| file.display_name != CONFIG_ARCHIVE_NAME)
            .collect();
        if image_files.len() != 1 {
            error!(
                count = image_files.len(),
                "expected exactly one archive to extract (ignoring any {CONFIG_ARCHIVE_NAME})"
            );
            return Err(TaskError::Validation(format!(
                "expected exactly one non-config archive to extract, got {}",
                image_files.len()
            )));
        }

        let mut output_files = Vec::new();
        let mut command = Vec::new();
        for input in image_files {
            let (report, argv) =
                self.process_image(input, &output_path, &prefix, password, &mut task_logs)?;
            output_files.push(report);
            command = argv;
        }

        Ok(TaskResult {
            output_files,
            workflow_id,
            command: command.join(" "),
            task_logs,
        })
    }

    /// Extract the hostname marker from the config archive and turn it into
    /// an output-name prefix. The extraction directory is always removed.
    fn hostname_prefix(
        &self,
        config_item: &InputFileRef,
        output_path: &Path,
        password: Option<&str>,
        task_logs: &mut Vec<OutputFile>,
    ) -> Result<Option<String>, TaskError> {
        let export = self.extract(config_item, output_path, &[HOSTNAME_GLOB], password, task_logs)?;

        let prefix = match hostname::find_marker(export.path()) {
            Some(marker) => {
                let raw = fs::read_to_string(&marker)?;
                let prefix = hostname::prefix_from_marker(&raw);
                if prefix == "_" {
                    warn!("hostname marker in {CONFIG_ARCHIVE_NAME} is empty after sanitizing");
                } else {
                    info!("using output prefix {prefix}");
                }
                Some(prefix)
            }
            None => {
                info!("no hostname marker found in {CONFIG_ARCHIVE_NAME}");
                None
            }
        };

        export.close()?;
        Ok(prefix)
    }

    /// Extract one image archive and run RECmd over it.
    fn process_image(
        &self,
        input: &InputFileRef,
        output_path: &Path,
        prefix: &str,
        password: Option<&str>,
        task_logs: &mut Vec<OutputFile>,
    ) -> Result<(OutputFile, Vec<String>), TaskError> {
        let span = info_span!("input", input_file = %input.display_name);
        let _enter = span.enter();
        info!("processing {}", input.path.display());

        let export = self.extract(input, output_path, &[], password, task_logs)?;

        let report = create_output_file(
            output_path,
            &format!("{prefix}{CSV_REPORT_NAME}"),
            Some(RECMD_DATA_TYPE),
        );
        let argv = recmd::build_command(&self.config.tool, export.path(), output_path, &report.path);
        info!("running {}", argv.join(" "));

        let outcome = process::run_with_heartbeat(
            &argv,
            self.config.heartbeat_interval(),
            self.reporter.as_ref(),
        )?;
        if outcome.success() {
            info!(
                elapsed_secs = outcome.elapsed.as_secs(),
                heartbeats = outcome.heartbeats,
                "RECmd finished"
            );
        } else {
            let status = outcome.describe_exit();
            warn!("RECmd exited unsuccessfully ({status})");
            if self.config.fail_on_tool_error {
                return Err(TaskError::ToolFailed {
                    archive: input.display_name.clone(),
                    status,
                });
            }
        }

        match recmd::count_csv_rows(&report.path) {
            Ok(Some(0)) => warn!("RECmd report {} has no rows", report.display_name),
            Ok(Some(rows)) => info!(rows, "RECmd report {} written", report.display_name),
            Ok(None) => warn!("RECmd did not write {}", report.path.display()),
            Err(err) => warn!("could not read RECmd report {}: {err}", report.path.display()),
        }

        export.close()?;
        Ok((report, argv))
    }

    fn extract(
        &self,
        input: &InputFileRef,
        output_path: &Path,
        filters: &[&str],
        password: Option<&str>,
        task_logs: &mut Vec<OutputFile>,
    ) -> Result<ExportDir, TaskError> {
        let log_file = create_output_file(
            output_path,
            &format!("{EXTRACTION_LOG_PREFIX}{}.log", input.display_name),
            None,
        );

        let extraction = self
            .extractor
            .extract(input, output_path, &log_file.path, filters, password)
            .map_err(|source| {
                error!("{} extraction of {} failed: {source}", self.extractor.name(), input.display_name);
                TaskError::Extraction {
                    archive: input.display_name.clone(),
                    source,
                }
            })?;
        info!("executed extraction command: {}", extraction.command);

        if log_file.path.is_file() {
            task_logs.push(log_file);
        }
        Ok(ExportDir::new(extraction.export_dir))
    }
}
