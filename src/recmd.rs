//! RECmd command line and report helpers.

use std::path::Path;

use crate::config::ToolConfig;

/// Build the RECmd argument vector.
///
/// Layout: `<program> [args_prefix..] -d <source_dir> --bn <batch_file>
/// --nl false --csv <output_dir> --csvf <csv_file>`.
pub fn build_command(
    tool: &ToolConfig,
    source_dir: &Path,
    output_dir: &Path,
    csv_file: &Path,
) -> Vec<String> {
    let mut argv = Vec::with_capacity(tool.args_prefix.len() + 11);
    argv.push(tool.program.clone());
    argv.extend(tool.args_prefix.iter().cloned());
    argv.extend([
        "-d".to_string(),
        source_dir.to_string_lossy().into_owned(),
        "--bn".to_string(),
        tool.batch_file.clone(),
        "--nl".to_string(),
        "false".to_string(),
        "--csv".to_string(),
        output_dir.to_string_lossy().into_owned(),
        "--csvf".to_string(),
        csv_file.to_string_lossy().into_owned(),
    ]);
    argv
}

/// Count data rows in a RECmd CSV report, or `None` if the file is missing.
pub fn count_csv_rows(path: &Path) -> Result<Option<u64>, csv::Error> {
    if !path.is_file() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut rows = 0u64;
    for record in reader.records() {
        record?;
        rows += 1;
    }
    Ok(Some(rows))
}
