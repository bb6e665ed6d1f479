//! Fixed names and identifiers shared with the surrounding pipeline.

/// Display name of the optional companion archive carrying worker hints.
pub const CONFIG_ARCHIVE_NAME: &str = "openrelik-config.zip";

/// Hostname marker file looked up inside the config archive.
pub const HOSTNAME_MARKER: &str = ".openrelik-hostname";

/// Extraction filter applied to the config archive.
pub const HOSTNAME_GLOB: &str = "*.openrelik-hostname";

/// Display-name prefix of extraction log files.
pub const EXTRACTION_LOG_PREFIX: &str = "extract_archives_";

/// Display name of the RECmd report (after the optional hostname prefix).
pub const CSV_REPORT_NAME: &str = "RECmd_output.csv";

/// Data type tag attached to the RECmd report.
pub const RECMD_DATA_TYPE: &str = "openrelik:recmd:recmd";

/// Event name emitted while the external tool is running.
pub const TASK_PROGRESS_EVENT: &str = "task-progress";

pub const WORKER_DISPLAY_NAME: &str = "Eric Zimmerman's RECmd tool";

pub const WORKER_DESCRIPTION: &str = "Runs Eric Zimmerman's RECmd application on Registry Hives \
in filetree consistent archives (like KAPE .zip images) using the DFIR Batch files";
