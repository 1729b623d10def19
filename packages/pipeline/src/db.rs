use sqlx::postgres::PgConnection;
use sqlx::{ConnectOptions, Connection};

use crate::config::DatabaseConfig;
use crate::error::{PipelineError, Result};

/// Open the single connection a pipeline run works on.
pub async fn connect(config: &DatabaseConfig) -> Result<PgConnection> {
    tracing::info!(host = %config.host, port = config.port, dbname = %config.dbname, "connecting to database");

    let conn = config
        .connect_options()
        .connect()
        .await
        .map_err(PipelineError::Connection)?;

    Ok(conn)
}

/// Close the connection. Failures are logged, not returned.
pub async fn close(conn: PgConnection) {
    if let Err(e) = conn.close().await {
        tracing::warn!(error = %e, "failed to close database connection cleanly");
    } else {
        tracing::debug!("database connection closed");
    }
}
