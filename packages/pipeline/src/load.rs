//! Bulk-load the table files with `COPY ... FROM STDIN`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use sqlx::postgres::PgConnection;
use sqlx::Connection;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use crate::error::{PipelineError, Result};
use crate::models::{Table, TableFiles};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub rows: BTreeMap<Table, u64>,
}

pub fn copy_statement(schema: &str, table: Table) -> String {
    let columns: Vec<&str> = table.column_names().collect();
    format!(
        "COPY {schema}.{} ({}) FROM STDIN WITH (FORMAT csv, HEADER true, DELIMITER ',')",
        table.name(),
        columns.join(", ")
    )
}

/// The file header must list the table's columns in table order.
pub fn verify_header(table: Table, path: &Path, header_line: &str) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(header_line.as_bytes());
    let found: Vec<String> = match reader.records().next() {
        Some(record) => record
            .map_err(|e| PipelineError::csv(path, e))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    };
    let expected: Vec<&str> = table.column_names().collect();

    if found != expected {
        return Err(PipelineError::SchemaMismatch(format!(
            "{} header [{}] does not match {table} columns [{}]",
            path.display(),
            found.join(", "),
            expected.join(", ")
        )));
    }
    Ok(())
}

/// Copy every table file into its table inside one transaction.
///
/// Nothing becomes visible unless all five copies succeed. The files are
/// not touched; deleting them is the caller's step after this returns.
pub async fn copy_tables(
    conn: &mut PgConnection,
    schema: &str,
    files: &TableFiles,
) -> Result<LoadReport> {
    let mut tx = conn.begin().await?;
    let mut report = LoadReport::default();

    for (table, path) in files.iter() {
        let rows = copy_file(&mut tx, schema, table, path).await?;
        tracing::info!(%table, rows, path = %path.display(), "copied file into table");
        report.rows.insert(table, rows);
    }

    tx.commit().await?;
    tracing::info!(schema, "load committed");
    Ok(report)
}

async fn copy_file(
    conn: &mut PgConnection,
    schema: &str,
    table: Table,
    path: &Path,
) -> Result<u64> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    reader
        .read_line(&mut header)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    verify_header(table, path, &header)?;

    let statement = copy_statement(schema, table);
    tracing::debug!(%table, statement = %statement, "starting bulk copy");

    let mut copy = conn
        .copy_in_raw(&statement)
        .await
        .map_err(|source| PipelineError::Load { table, source })?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let streamed: Result<()> = async {
        copy.send(header.as_bytes())
            .await
            .map_err(|source| PipelineError::Load { table, source })?;
        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| PipelineError::io(path, e))?;
            if n == 0 {
                break;
            }
            copy.send(&buf[..n])
                .await
                .map_err(|source| PipelineError::Load { table, source })?;
        }
        Ok(())
    }
    .await;

    if let Err(e) = streamed {
        if let Err(abort_err) = copy.abort(e.to_string()).await {
            tracing::debug!(%table, error = %abort_err, "copy abort reported an error");
        }
        return Err(e);
    }

    copy.finish()
        .await
        .map_err(|source| PipelineError::Load { table, source })
}
