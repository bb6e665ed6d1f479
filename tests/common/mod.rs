//! Shared fixtures for task-level tests: zip builders and a shell stand-in
//! for RECmd that writes a small report to the `--csvf` path.

#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use recmd_worker::archive::ZipExtractor;
use recmd_worker::config::{self, WorkerConfig};
use recmd_worker::files::InputFileRef;
use recmd_worker::progress::RecordingReporter;
use recmd_worker::task::RecmdTask;

/// Writes two report rows to the file following `--csvf`.
pub const WRITE_REPORT: &str = r#"while [ $# -gt 0 ]; do
  if [ "$1" = "--csvf" ]; then printf 'HivePath,Category,Description\nSYSTEM,Network,Interfaces\nNTUSER.DAT,UserActivity,RecentDocs\n' > "$2"; fi
  shift
done"#;

pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut writer = ZipWriter::new(File::create(path).expect("create zip"));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start file");
        writer.write_all(data.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish zip");
}

/// A KAPE-like image archive with a couple of hive files.
pub fn image_zip(dir: &Path, name: &str) -> InputFileRef {
    let path = dir.join(name);
    write_zip(
        &path,
        &[
            ("C/Windows/System32/config/SYSTEM", "regf-system"),
            ("C/Windows/System32/config/SOFTWARE", "regf-software"),
            ("C/Users/alice/NTUSER.DAT", "regf-ntuser"),
        ],
    );
    InputFileRef::from_path(&path)
}

/// `openrelik-config.zip`, with the hostname marker when `hostname` is set.
pub fn config_zip(dir: &Path, hostname: Option<&str>) -> InputFileRef {
    let path = dir.join("openrelik-config.zip");
    let mut entries = vec![("settings/readme.txt", "worker hints")];
    if let Some(hostname) = hostname {
        entries.push(("settings/.openrelik-hostname", hostname));
    }
    write_zip(&path, &entries);
    InputFileRef::from_path(&path)
}

/// `openrelik-config.zip` whose marker holds arbitrary bytes.
pub fn config_zip_with_marker_bytes(dir: &Path, marker: &[u8]) -> InputFileRef {
    let path = dir.join("openrelik-config.zip");
    let mut writer = ZipWriter::new(File::create(&path).expect("create zip"));
    writer
        .start_file("settings/.openrelik-hostname", SimpleFileOptions::default())
        .expect("start file");
    writer.write_all(marker).expect("write entry");
    writer.finish().expect("finish zip");
    InputFileRef::from_path(&path)
}

/// Worker config running `script` through `sh -c` in place of RECmd.
pub fn shell_tool_config(script: &str) -> WorkerConfig {
    let mut cfg = config::load_config(None).expect("config").config;
    cfg.tool.program = "sh".to_string();
    cfg.tool.args_prefix = vec!["-c".to_string(), script.to_string(), "recmd".to_string()];
    cfg.heartbeat_interval_ms = 20;
    cfg
}

pub fn build_task(cfg: WorkerConfig) -> (RecmdTask, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::new());
    let task = RecmdTask::new(cfg, Box::new(ZipExtractor), reporter.clone());
    (task, reporter)
}

pub fn output_dir(root: &Path) -> PathBuf {
    let out = root.join("output");
    fs::create_dir_all(&out).expect("output dir");
    out
}

pub fn subdirs(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect()
}

pub fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|e| e == ext))
        .collect()
}
