//! Decompose the sanitized export into one CSV per star-schema table.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::DedupPolicy;
use crate::error::{PipelineError, Result};
use crate::models::{Table, TableFiles, TableKind, BRACKETED_COLUMNS, CLICK_ID};

#[derive(Debug, Clone, Serialize)]
pub struct SplitReport {
    /// Data rows read from the sanitized file; also the highest `click_id`.
    pub data_rows: usize,
    pub rows: BTreeMap<Table, usize>,
    pub files: TableFiles,
}

pub fn strip_brackets(value: &str) -> String {
    value.replace(['[', ']'], "")
}

/// Where each output column of a table comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    ClickId,
    Source(usize),
}

#[derive(Debug)]
struct Projection {
    table: Table,
    fields: Vec<Field>,
}

impl Projection {
    fn project(&self, click_id: &str, record: &[String]) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| match field {
                Field::ClickId => click_id.to_string(),
                Field::Source(i) => record.get(*i).cloned().unwrap_or_default(),
            })
            .collect()
    }
}

/// Column positions of the sanitized file, resolved once per split.
#[derive(Debug)]
struct SourceLayout {
    projections: Vec<Projection>,
    bracketed: Vec<usize>,
}

impl SourceLayout {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let first = headers.get(0).unwrap_or_default();
        if headers.is_empty() || first.is_empty() || first.starts_with(|c: char| c.is_ascii_digit())
        {
            return Err(PipelineError::SchemaMismatch(
                "sanitized data has no header line".into(),
            ));
        }

        let positions: HashMap<&str, usize> =
            headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
        let mut missing = BTreeSet::new();

        let projections = Table::ALL
            .into_iter()
            .map(|table| {
                let fields = table
                    .column_names()
                    .filter_map(|name| {
                        if name == CLICK_ID {
                            return Some(Field::ClickId);
                        }
                        match positions.get(name) {
                            Some(&i) => Some(Field::Source(i)),
                            None => {
                                missing.insert(name);
                                None
                            }
                        }
                    })
                    .collect();
                Projection { table, fields }
            })
            .collect();

        if !missing.is_empty() {
            let missing: Vec<&str> = missing.into_iter().collect();
            return Err(PipelineError::SchemaMismatch(format!(
                "sanitized data is missing columns: {}",
                missing.join(", ")
            )));
        }

        let bracketed = BRACKETED_COLUMNS
            .iter()
            .filter_map(|name| positions.get(name).copied())
            .collect();

        Ok(Self {
            projections,
            bracketed,
        })
    }
}

/// Deduplicated rows of one dimension table.
#[derive(Debug)]
pub(crate) struct DimensionRows {
    policy: DedupPolicy,
    rows: Vec<Vec<String>>,
    seen: HashMap<Vec<String>, usize>,
}

impl DimensionRows {
    pub(crate) fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            rows: Vec::new(),
            seen: HashMap::new(),
        }
    }

    /// The natural key is the first column.
    pub(crate) fn insert(&mut self, row: Vec<String>) {
        let key = match self.policy {
            DedupPolicy::NaturalKey => row.iter().take(1).cloned().collect(),
            DedupPolicy::DistinctRows => row.clone(),
        };
        match self.seen.get(&key) {
            Some(&i) => {
                if let Some(existing) = self.rows.get_mut(i) {
                    *existing = row;
                }
            }
            None => {
                self.seen.insert(key, self.rows.len());
                self.rows.push(row);
            }
        }
    }

    pub(crate) fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

struct TableWriter {
    path: PathBuf,
    inner: csv::Writer<File>,
    rows: usize,
}

impl TableWriter {
    fn create(table: Table, path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
        let mut inner = csv::Writer::from_writer(file);
        inner
            .write_record(table.column_names())
            .map_err(|e| PipelineError::csv_write(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            inner,
            rows: 0,
        })
    }

    fn write(&mut self, row: &[String]) -> Result<()> {
        self.inner
            .write_record(row)
            .map_err(|e| PipelineError::csv_write(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<usize> {
        self.inner
            .flush()
            .map_err(|e| PipelineError::io(&self.path, e))?;
        Ok(self.rows)
    }
}

/// Split the sanitized file into the five table files named by `files`.
///
/// Fact rows are written as they are read, so they come out ordered by
/// `click_id`. Dimension rows are collected, deduplicated and written last.
/// The sanitized file itself is left in place.
pub fn split(sanitized_path: &Path, files: &TableFiles, policy: DedupPolicy) -> Result<SplitReport> {
    tracing::info!(sanitized = %sanitized_path.display(), %policy, "splitting sanitized data");

    let input = File::open(sanitized_path).map_err(|e| PipelineError::io(sanitized_path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::csv(sanitized_path, e))?
        .clone();
    let layout = SourceLayout::resolve(&headers)?;

    let mut fact_writers = Vec::new();
    let mut dimensions = Vec::new();
    for projection in &layout.projections {
        match projection.table.kind() {
            TableKind::Fact => fact_writers.push((
                projection,
                TableWriter::create(projection.table, files.path(projection.table))?,
            )),
            TableKind::Dimension => dimensions.push((projection, DimensionRows::new(policy))),
        }
    }

    let mut data_rows = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| PipelineError::csv(sanitized_path, e))?;
        let mut values: Vec<String> = record.iter().map(str::to_string).collect();
        for &i in &layout.bracketed {
            if let Some(value) = values.get_mut(i) {
                *value = strip_brackets(value);
            }
        }

        data_rows += 1;
        let click_id = data_rows.to_string();

        for (projection, writer) in &mut fact_writers {
            writer.write(&projection.project(&click_id, &values))?;
        }
        for (projection, rows) in &mut dimensions {
            rows.insert(projection.project(&click_id, &values));
        }
    }

    let mut rows = BTreeMap::new();
    for (projection, writer) in fact_writers {
        rows.insert(projection.table, writer.finish()?);
    }
    for (projection, dimension) in dimensions {
        let mut writer = TableWriter::create(projection.table, files.path(projection.table))?;
        for row in dimension.rows() {
            writer.write(row)?;
        }
        rows.insert(projection.table, writer.finish()?);
    }

    for (table, count) in &rows {
        tracing::debug!(%table, rows = count, path = %files.path(*table).display(), "wrote table file");
    }
    tracing::info!(data_rows, "split sanitized data into table files");

    Ok(SplitReport {
        data_rows,
        rows,
        files: files.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_strip_brackets() {
        assert_eq!(strip_brackets("[12345]"), "12345");
        assert_eq!(strip_brackets("12345"), "12345");
        assert_eq!(strip_brackets("[[1]2]"), "12");
        assert_eq!(strip_brackets(""), "");
    }

    #[test]
    fn test_distinct_rows_collapses_exact_duplicates_only() {
        let mut dim = DimensionRows::new(DedupPolicy::DistinctRows);
        dim.insert(row(&["A1", "Acme", "Main", "Active"]));
        dim.insert(row(&["A1", "Acme", "Main", "Active"]));
        dim.insert(row(&["A1", "Acme", "Renamed", "Active"]));

        assert_eq!(
            dim.rows(),
            &[
                row(&["A1", "Acme", "Main", "Active"]),
                row(&["A1", "Acme", "Renamed", "Active"]),
            ]
        );
    }

    #[test]
    fn test_natural_key_keeps_first_position_last_attributes() {
        let mut dim = DimensionRows::new(DedupPolicy::NaturalKey);
        dim.insert(row(&["A1", "Acme", "Main", "Active"]));
        dim.insert(row(&["B2", "Bolt", "Bolt", "Paused"]));
        dim.insert(row(&["A1", "Acme", "Renamed", "Active"]));
        dim.insert(row(&["A1", "Acme", "Renamed", "Active"]));

        assert_eq!(
            dim.rows(),
            &[
                row(&["A1", "Acme", "Renamed", "Active"]),
                row(&["B2", "Bolt", "Bolt", "Paused"]),
            ]
        );
    }

    #[test]
    fn test_resolve_rejects_headerless_data() {
        let headers = csv::StringRecord::from(vec!["2023-01-01", "X1"]);
        let err = SourceLayout::resolve(&headers).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(msg) if msg.contains("no header")));
    }

    #[test]
    fn test_resolve_lists_missing_columns() {
        let headers = csv::StringRecord::from(vec!["gregorian_date", "account_number"]);
        let err = SourceLayout::resolve(&headers).unwrap_err();
        let PipelineError::SchemaMismatch(msg) = err else {
            panic!("expected schema mismatch, got {err:?}");
        };
        assert!(msg.contains("ad_group_id"));
        assert!(msg.contains("assists"));
        assert!(!msg.contains("account_number"));
        assert!(!msg.contains("click_id"));
    }

    #[test]
    fn test_split_empty_file_is_schema_mismatch() {
        let dir = tempdir().unwrap();
        let sanitized = dir.path().join("sanitized_data.csv");
        std::fs::write(&sanitized, "").unwrap();

        let files = TableFiles::in_dir(dir.path());
        let err = split(&sanitized, &files, DedupPolicy::NaturalKey).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaMismatch(_)));
    }

    #[test]
    fn test_split_missing_input_is_io_error() {
        let dir = tempdir().unwrap();
        let sanitized = dir.path().join("sanitized_data.csv");

        let files = TableFiles::in_dir(dir.path());
        let err = split(&sanitized, &files, DedupPolicy::NaturalKey).unwrap_err();
        assert!(matches!(err, PipelineError::Io { path, .. } if path == sanitized));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_table_writer_reports_full_disk_as_io() {
        let path = Path::new("/dev/full");
        let mut writer = TableWriter::create(Table::Customer, path).unwrap();
        let wide = "x".repeat(64 * 1024);

        let err = writer
            .write(&row(&["A1", wide.as_str(), "Main", "Active"]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io { path: p, .. } if p == path));
    }
}
