//! # File Descriptors
//!
//! Input references handed to the task and output files it registers with
//! the pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One input artifact supplied by the pipeline.
///
/// Upstream task results carry [`OutputFile`] records; unknown fields are
/// ignored so those records deserialize directly into input references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFileRef {
    pub display_name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl InputFileRef {
    /// Build a reference for a local file, using its file name as display name.
    pub fn from_path(path: &Path) -> Self {
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            display_name,
            path: path.to_path_buf(),
            data_type: None,
        }
    }
}

impl From<OutputFile> for InputFileRef {
    fn from(file: OutputFile) -> Self {
        Self {
            display_name: file.display_name,
            path: file.path,
            data_type: file.data_type,
        }
    }
}

/// A file produced by the task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    pub uuid: String,
    pub display_name: String,
    pub extension: String,
    pub data_type: Option<String>,
    pub path: PathBuf,
    #[serde(default)]
    pub original_path: Option<String>,
    #[serde(default)]
    pub source_file_id: Option<String>,
}

/// Reserve a new output file under `output_path`.
///
/// The on-disk name is `<uuid>.<extension>`, with the extension taken from
/// `display_name`. Nothing is created on disk.
pub fn create_output_file(
    output_path: &Path,
    display_name: &str,
    data_type: Option<&str>,
) -> OutputFile {
    let uuid = Uuid::new_v4().simple().to_string();
    let extension = Path::new(display_name)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = if extension.is_empty() {
        uuid.clone()
    } else {
        format!("{uuid}.{extension}")
    };

    OutputFile {
        path: output_path.join(file_name),
        uuid,
        display_name: display_name.to_string(),
        extension,
        data_type: data_type.map(str::to_string),
        original_path: None,
        source_file_id: None,
    }
}
