//! Reduce a raw advertising export to plain CSV.
//!
//! Exports wrap the data in banner and footer text. Only the column header
//! and the date-prefixed data rows survive; the header is rewritten to
//! lower snake_case so the splitter can address columns by name.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{PipelineError, Result};

/// First field of the header line, after stripping quotes.
const HEADER_MARKER: &str = "Gregorian date";

const BOM: char = '\u{feff}';

static DATA_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"\d+-\d+-\d+"#).expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SanitizeReport {
    pub lines_read: usize,
    pub header_found: bool,
    pub data_rows: usize,
    pub discarded: usize,
}

pub fn is_header_line(line: &str) -> bool {
    let first = line
        .trim_start_matches(BOM)
        .split(',')
        .next()
        .unwrap_or_default();
    first.trim_matches('"') == HEADER_MARKER
}

pub fn is_data_line(line: &str) -> bool {
    DATA_ROW.is_match(line)
}

/// `"Avg. position","Top vs. other"` becomes `"avg_position","top_vs_other"`.
pub fn normalize_header(line: &str) -> String {
    line.trim_start_matches(BOM)
        .to_lowercase()
        .replace(' ', "_")
        .replace('.', "")
}

/// Write the header and data rows of `raw_path` to `sanitized_path`.
///
/// A header that shows up after data rows is dropped: the header must be the
/// first line of the output. A file without any header is still written; the
/// splitter rejects it.
pub fn sanitize(raw_path: &Path, sanitized_path: &Path) -> Result<SanitizeReport> {
    let input = File::open(raw_path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => PipelineError::NotFound(raw_path.to_path_buf()),
        _ => PipelineError::io(raw_path, e),
    })?;

    tracing::info!(raw = %raw_path.display(), "sanitizing raw export");

    let output = File::create(sanitized_path).map_err(|e| PipelineError::io(sanitized_path, e))?;
    let mut writer = BufWriter::new(output);
    let mut report = SanitizeReport::default();

    for line in BufReader::new(input).lines() {
        let line = line.map_err(|e| PipelineError::io(raw_path, e))?;
        report.lines_read += 1;
        let line = line.strip_suffix('\r').unwrap_or(&line);

        let kept = if is_header_line(line) {
            if report.header_found || report.data_rows > 0 {
                tracing::warn!(line = report.lines_read, "ignoring misplaced header line");
                None
            } else {
                report.header_found = true;
                Some(normalize_header(line))
            }
        } else if is_data_line(line) {
            report.data_rows += 1;
            Some(line.to_string())
        } else {
            None
        };

        match kept {
            Some(kept) => writeln!(writer, "{kept}")
                .map_err(|e| PipelineError::io(sanitized_path, e))?,
            None => report.discarded += 1,
        }
    }

    writer
        .flush()
        .map_err(|e| PipelineError::io(sanitized_path, e))?;

    if !report.header_found {
        tracing::warn!(raw = %raw_path.display(), "no header line found in raw export");
    }
    tracing::info!(
        data_rows = report.data_rows,
        discarded = report.discarded,
        sanitized = %sanitized_path.display(),
        "sanitized raw export"
    );

    Ok(report)
}
