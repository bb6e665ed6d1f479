//! # Archive Extraction
//!
//! Unpacks input archives into fresh per-call export directories under the
//! task output path. Two backends are available: an in-process zip reader
//! and the external 7-Zip binary.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use zip::ZipArchive;

use crate::config::{ExtractorKind, WorkerConfig};
use crate::files::InputFileRef;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("invalid filter pattern: {0}")]
    Pattern(#[from] globset::Error),
    #[error("archive {0} is encrypted and no password was given")]
    PasswordRequired(String),
    #[error("extraction command failed ({status}): {command}")]
    CommandFailed { command: String, status: String },
}

/// Outcome of one extraction call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Human-readable form of the extraction that ran (passwords masked).
    pub command: String,
    /// Directory holding the extracted tree; owned by the caller.
    pub export_dir: PathBuf,
}

pub trait ArchiveExtractor: Send + Sync {
    /// Extract `input` into a new directory below `output_path`.
    ///
    /// Only entries matching one of `filters` are extracted (all entries
    /// when `filters` is empty). Progress and errors go to `log_file`. On
    /// failure no export directory is left behind.
    fn extract(
        &self,
        input: &InputFileRef,
        output_path: &Path,
        log_file: &Path,
        filters: &[&str],
        password: Option<&str>,
    ) -> Result<ExtractionResult, ArchiveError>;

    fn name(&self) -> &str;
}

pub fn build_extractor(cfg: &WorkerConfig) -> Box<dyn ArchiveExtractor> {
    match cfg.extractor {
        ExtractorKind::Native => Box::new(ZipExtractor),
        ExtractorKind::SevenZip => Box::new(SevenZipExtractor::new(&cfg.seven_zip_program)),
    }
}

/// Extraction directory removed when dropped.
///
/// Use [`ExportDir::close`] to remove it explicitly and observe errors.
#[derive(Debug)]
pub struct ExportDir {
    path: PathBuf,
    removed: bool,
}

impl ExportDir {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn close(mut self) -> io::Result<()> {
        self.removed = true;
        fs::remove_dir_all(&self.path)
    }
}

impl Drop for ExportDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("removed export directory {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => warn!(
                "failed to remove export directory {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}

fn new_export_dir(output_path: &Path) -> Result<PathBuf, ArchiveError> {
    let dir = output_path.join(Uuid::new_v4().simple().to_string());
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn build_filter(filters: &[&str]) -> Result<Option<GlobSet>, ArchiveError> {
    if filters.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in filters {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

/// In-process zip extraction.
pub struct ZipExtractor;

impl ZipExtractor {
    fn unzip(
        archive_path: &Path,
        export_dir: &Path,
        log_file: &Path,
        filters: &[&str],
        password: Option<&str>,
    ) -> Result<usize, ArchiveError> {
        let mut log = BufWriter::new(File::create(log_file)?);
        writeln!(log, "extracting {}", archive_path.display())?;

        match Self::unzip_entries(archive_path, export_dir, filters, password, &mut log) {
            Ok(count) => {
                writeln!(log, "extracted {count} file(s) to {}", export_dir.display())?;
                log.flush()?;
                Ok(count)
            }
            Err(err) => {
                let _ = writeln!(log, "error: {err}");
                let _ = log.flush();
                Err(err)
            }
        }
    }

    fn unzip_entries(
        archive_path: &Path,
        export_dir: &Path,
        filters: &[&str],
        password: Option<&str>,
        log: &mut impl Write,
    ) -> Result<usize, ArchiveError> {
        let filter = build_filter(filters)?;
        let mut zip = ZipArchive::new(File::open(archive_path)?)?;
        let mut extracted = 0usize;

        for index in 0..zip.len() {
            let (relative, is_dir, encrypted, name) = {
                let raw = zip.by_index_raw(index)?;
                (
                    raw.enclosed_name().map(|path| path.to_path_buf()),
                    raw.is_dir(),
                    raw.encrypted(),
                    raw.name().to_string(),
                )
            };

            let Some(relative) = relative else {
                writeln!(log, "skipping unsafe entry {name}")?;
                continue;
            };
            if let Some(set) = &filter {
                if is_dir || !set.is_match(&relative) {
                    continue;
                }
            }

            let target = export_dir.join(&relative);
            if is_dir {
                fs::create_dir_all(&target)?;
                continue;
            }

            let mut entry = if encrypted {
                let password = password.ok_or_else(|| {
                    ArchiveError::PasswordRequired(archive_path.display().to_string())
                })?;
                zip.by_index_decrypt(index, password.as_bytes())?
            } else {
                zip.by_index(index)?
            };

            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            writeln!(log, "  {}", relative.display())?;
            extracted += 1;
        }

        Ok(extracted)
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract(
        &self,
        input: &InputFileRef,
        output_path: &Path,
        log_file: &Path,
        filters: &[&str],
        password: Option<&str>,
    ) -> Result<ExtractionResult, ArchiveError> {
        let export_dir = new_export_dir(output_path)?;
        let mut command = format!(
            "zip-extract {} -> {}",
            input.path.display(),
            export_dir.display()
        );
        for pattern in filters {
            command.push(' ');
            command.push_str(pattern);
        }

        match Self::unzip(&input.path, &export_dir, log_file, filters, password) {
            Ok(count) => {
                debug!(files = count, "unzipped {}", input.display_name);
                Ok(ExtractionResult {
                    command,
                    export_dir,
                })
            }
            Err(err) => {
                let _ = fs::remove_dir_all(&export_dir);
                Err(err)
            }
        }
    }

    fn name(&self) -> &str {
        "zip"
    }
}

/// Extraction through an external `7z` binary.
pub struct SevenZipExtractor {
    program: String,
}

impl SevenZipExtractor {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    /// Arguments for `7z x`, recursing into subdirectories for filters.
    pub fn args(
        archive: &Path,
        export_dir: &Path,
        filters: &[&str],
        password: Option<&str>,
    ) -> Vec<String> {
        let mut args = vec![
            "x".to_string(),
            archive.to_string_lossy().into_owned(),
            format!("-o{}", export_dir.to_string_lossy()),
        ];
        if let Some(password) = password {
            args.push(format!("-p{password}"));
        }
        args.extend(filters.iter().map(|f| f.to_string()));
        args.push("-r".to_string());
        args.push("-y".to_string());
        args
    }

    fn display_command(&self, args: &[String]) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(args.iter().map(|arg| {
            if arg.starts_with("-p") {
                "-p***".to_string()
            } else {
                arg.clone()
            }
        }));
        parts.join(" ")
    }

    fn run(&self, args: &[String], log_file: &Path, command: &str) -> Result<(), ArchiveError> {
        let log = File::create(log_file)?;
        let status = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log))
            .status()?;
        if !status.success() {
            let status = status
                .code()
                .map(|code| format!("exit code {code}"))
                .unwrap_or_else(|| "terminated by signal".to_string());
            return Err(ArchiveError::CommandFailed {
                command: command.to_string(),
                status,
            });
        }
        Ok(())
    }
}

impl ArchiveExtractor for SevenZipExtractor {
    fn extract(
        &self,
        input: &InputFileRef,
        output_path: &Path,
        log_file: &Path,
        filters: &[&str],
        password: Option<&str>,
    ) -> Result<ExtractionResult, ArchiveError> {
        let export_dir = new_export_dir(output_path)?;
        let args = Self::args(&input.path, &export_dir, filters, password);
        let command = self.display_command(&args);

        match self.run(&args, log_file, &command) {
            Ok(()) => Ok(ExtractionResult {
                command,
                export_dir,
            }),
            Err(err) => {
                let _ = fs::remove_dir_all(&export_dir);
                Err(err)
            }
        }
    }

    fn name(&self) -> &str {
        "7z"
    }
}

#[cfg(test)]
mod tests {
    use zip::unstable::write::FileOptionsExt;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &str)], options: SimpleFileOptions) {
        let mut writer = ZipWriter::new(File::create(path).expect("create zip"));
        for (name, data) in entries {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(data.as_bytes()).expect("write entry");
        }
        writer.finish().expect("finish zip");
    }

    fn subdirs(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .expect("read dir")
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect()
    }

    #[test]
    fn extracts_full_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("image.zip");
        write_zip(
            &archive,
            &[
                ("C/Windows/System32/config/SYSTEM", "regf"),
                ("C/Users/alice/NTUSER.DAT", "regf"),
            ],
            SimpleFileOptions::default(),
        );
        let out = dir.path().join("out");
        fs::create_dir_all(&out).expect("out");
        let log = out.join("extract.log");

        let result = ZipExtractor
            .extract(&InputFileRef::from_path(&archive), &out, &log, &[], None)
            .expect("extract");

        assert!(result.export_dir.starts_with(&out));
        assert!(result.export_dir.join("C/Windows/System32/config/SYSTEM").is_file());
        assert!(result.export_dir.join("C/Users/alice/NTUSER.DAT").is_file());
        assert_eq!(
            result.command,
            format!("zip-extract {} -> {}", archive.display(), result.export_dir.display())
        );
        let log_text = fs::read_to_string(&log).expect("log");
        assert!(log_text.contains("extracted 2 file(s)"));
    }

    #[test]
    fn filter_limits_extracted_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("openrelik-config.zip");
        write_zip(
            &archive,
            &[
                ("meta/.openrelik-hostname", "HOST-9\n"),
                ("meta/other.txt", "ignored"),
            ],
            SimpleFileOptions::default(),
        );
        let out = dir.path().join("out");
        fs::create_dir_all(&out).expect("out");

        let result = ZipExtractor
            .extract(
                &InputFileRef::from_path(&archive),
                &out,
                &out.join("extract.log"),
                &["*.openrelik-hostname"],
                None,
            )
            .expect("extract");

        assert!(result.export_dir.join("meta/.openrelik-hostname").is_file());
        assert!(!result.export_dir.join("meta/other.txt").exists());
    }

    #[test]
    fn corrupt_archive_leaves_no_export_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("broken.zip");
        fs::write(&archive, b"definitely not a zip").expect("write");
        let out = dir.path().join("out");
        fs::create_dir_all(&out).expect("out");
        let log = out.join("extract.log");

        let err = ZipExtractor
            .extract(&InputFileRef::from_path(&archive), &out, &log, &[], None)
            .expect_err("must fail");

        assert!(matches!(err, ArchiveError::Zip(_)));
        assert!(subdirs(&out).is_empty());
        assert!(fs::read_to_string(&log).expect("log").contains("error:"));
    }

    #[test]
    fn encrypted_archive_needs_password() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("locked.zip");
        write_zip(
            &archive,
            &[("C/SAM", "regf")],
            SimpleFileOptions::default().with_deprecated_encryption(b"infected"),
        );
        let out = dir.path().join("out");
        fs::create_dir_all(&out).expect("out");
        let input = InputFileRef::from_path(&archive);

        let err = ZipExtractor
            .extract(&input, &out, &out.join("a.log"), &[], None)
            .expect_err("must fail");
        assert!(matches!(err, ArchiveError::PasswordRequired(_)));
        assert!(subdirs(&out).is_empty());

        let result = ZipExtractor
            .extract(&input, &out, &out.join("b.log"), &[], Some("infected"))
            .expect("extract");
        assert_eq!(
            fs::read(result.export_dir.join("C/SAM")).expect("read"),
            b"regf"
        );
    }

    #[test]
    fn filtered_out_encrypted_entries_need_no_password() {
        let dir = tempfile::tempdir().expect("tempdir");
        let archive = dir.path().join("openrelik-config.zip");
        let mut writer = ZipWriter::new(File::create(&archive).expect("create zip"));
        writer
            .start_file(
                "secrets/credentials.txt",
                SimpleFileOptions::default().with_deprecated_encryption(b"infected"),
            )
            .expect("start file");
        writer.write_all(b"hunter2").expect("write entry");
        writer
            .start_file("meta/.openrelik-hostname", SimpleFileOptions::default())
            .expect("start file");
        writer.write_all(b"HOST-9").expect("write entry");
        writer.finish().expect("finish zip");

        let out = dir.path().join("out");
        fs::create_dir_all(&out).expect("out");

        let result = ZipExtractor
            .extract(
                &InputFileRef::from_path(&archive),
                &out,
                &out.join("extract.log"),
                &["*.openrelik-hostname"],
                None,
            )
            .expect("extract");

        assert_eq!(
            fs::read_to_string(result.export_dir.join("meta/.openrelik-hostname")).expect("marker"),
            "HOST-9"
        );
        assert!(!result.export_dir.join("secrets").exists());
    }

    #[test]
    fn export_dir_is_removed_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("export");
        fs::create_dir_all(path.join("nested")).expect("mkdir");
        drop(ExportDir::new(path.clone()));
        assert!(!path.exists());

        fs::create_dir_all(&path).expect("mkdir");
        ExportDir::new(path.clone()).close().expect("close");
        assert!(!path.exists());
    }

    #[test]
    fn seven_zip_args_and_masked_command() {
        let args = SevenZipExtractor::args(
            Path::new("/in/openrelik-config.zip"),
            Path::new("/out/abc"),
            &["*.openrelik-hostname"],
            Some("secret"),
        );
        assert_eq!(
            args,
            vec![
                "x",
                "/in/openrelik-config.zip",
                "-o/out/abc",
                "-psecret",
                "*.openrelik-hostname",
                "-r",
                "-y",
            ]
        );
        let command = SevenZipExtractor::new("7z").display_command(&args);
        assert!(command.contains("-p***"));
        assert!(!command.contains("secret"));
    }
}
