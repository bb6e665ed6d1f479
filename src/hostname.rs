//! Hostname marker lookup and filename-prefix derivation.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::constants::HOSTNAME_MARKER;

const MAX_FILENAME_BYTES: usize = 255;

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "CONIN$", "CONOUT$", "COM0", "COM1", "COM2", "COM3", "COM4",
    "COM5", "COM6", "COM7", "COM8", "COM9", "LPT0", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5",
    "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Find the first regular file named `.openrelik-hostname` below `dir`.
pub fn find_marker(dir: &Path) -> Option<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .find(|entry| entry.file_name() == HOSTNAME_MARKER)
        .map(|entry| entry.into_path())
}

/// Make `name` safe to use as (part of) a file name on any platform.
///
/// Path separators, characters reserved on Windows and control characters
/// are dropped, trailing dots and spaces are trimmed, and reserved device
/// names get a `_` suffix.
pub fn sanitize_filename(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .filter(|c| !c.is_control())
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .collect();

    truncate_to_boundary(&mut cleaned, MAX_FILENAME_BYTES);

    let trimmed = cleaned.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        return String::new();
    }

    let stem = trimmed.split('.').next().unwrap_or(trimmed);
    if RESERVED_NAMES
        .iter()
        .any(|reserved| stem.eq_ignore_ascii_case(reserved))
    {
        return format!("{trimmed}_");
    }
    trimmed.to_string()
}

/// Turn raw marker content into an output-name prefix (`"<host>_"`).
///
/// A marker with no usable content still yields the bare `"_"` separator.
pub fn prefix_from_marker(raw: &str) -> String {
    format!("{}_", sanitize_filename(raw.trim()))
}

fn truncate_to_boundary(s: &mut String, max_bytes: usize) {
    if s.len() <= max_bytes {
        return;
    }
    let mut cut = max_bytes;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
}
