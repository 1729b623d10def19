use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::models::Table;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("database connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("bulk copy into {table} failed: {source}")]
    Load {
        table: Table,
        #[source]
        source: sqlx::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Like [`PipelineError::csv`], but I/O failures underneath the CSV
    /// writer surface as [`PipelineError::Io`].
    pub(crate) fn csv_write(path: &Path, source: csv::Error) -> Self {
        let io = match source.kind() {
            csv::ErrorKind::Io(e) => Some(std::io::Error::new(e.kind(), e.to_string())),
            _ => None,
        };
        match io {
            Some(e) => Self::io(path, e),
            None => Self::csv(path, source),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = PipelineError::io(
            Path::new("/data/ad_click.csv"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "No such file"),
        );
        assert_eq!(
            err.to_string(),
            "I/O error on /data/ad_click.csv: No such file"
        );
    }

    #[test]
    fn test_load_error_names_table() {
        let err = PipelineError::Load {
            table: Table::AdClick,
            source: sqlx::Error::Protocol("bad row".into()),
        };
        assert!(err.to_string().starts_with("bulk copy into ad_click failed"));
    }

    #[test]
    fn test_csv_write_unwraps_io_failures() {
        let path = Path::new("/data/customer.csv");
        let source = csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::WriteZero,
            "failed to write whole buffer",
        ));

        let err = PipelineError::csv_write(path, source);
        let PipelineError::Io { path: p, source } = err else {
            panic!("expected I/O error, got {err:?}");
        };
        assert_eq!(p, path);
        assert_eq!(source.kind(), std::io::ErrorKind::WriteZero);
    }

    #[test]
    fn test_csv_write_keeps_format_errors() {
        let source = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(&b"\xff,a\n"[..])
            .records()
            .next()
            .unwrap()
            .unwrap_err();

        let err = PipelineError::csv_write(Path::new("x.csv"), source);
        assert!(matches!(err, PipelineError::Csv { .. }));
    }
}
