use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use sqlx::postgres::PgConnectOptions;

use crate::error::{PipelineError, Result};

/// How duplicate dimension rows are collapsed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum DedupPolicy {
    /// One row per natural key: first-seen position, last-seen attributes.
    #[default]
    NaturalKey,
    /// One row per distinct combination of all projected columns.
    DistinctRows,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
}

impl DatabaseConfig {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let host = std::env::var("ETL_DB_HOST").unwrap_or_else(|_| "localhost".into());

        let port = match std::env::var("ETL_DB_PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| PipelineError::Config(format!("ETL_DB_PORT is not a port: {v}")))?,
            Err(_) => 5432,
        };

        let dbname = std::env::var("ETL_DB_NAME")
            .map_err(|_| PipelineError::Config("ETL_DB_NAME not set".into()))?;

        let user = std::env::var("ETL_DB_USER")
            .map_err(|_| PipelineError::Config("ETL_DB_USER not set".into()))?;

        let password = std::env::var("ETL_DB_PASSWORD").unwrap_or_default();

        Ok(Self {
            host,
            port,
            dbname,
            user,
            password,
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct EtlConfig {
    pub database: DatabaseConfig,
    pub work_dir: PathBuf,
    pub raw_file: String,
    pub schema: String,
    pub drop_before_create: bool,
    pub dedup: DedupPolicy,
}

impl EtlConfig {
    pub fn from_env() -> Result<Self> {
        let database = DatabaseConfig::from_env()?;

        let work_dir = std::env::var("ETL_WORK_DIR")
            .unwrap_or_else(|_| ".".into())
            .into();

        let raw_file = std::env::var("ETL_RAW_FILE").unwrap_or_else(|_| "raw_data.csv".into());

        let schema = std::env::var("ETL_SCHEMA").unwrap_or_else(|_| "etl".into());

        let drop_before_create = std::env::var("ETL_DROP_TABLES")
            .ok()
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let dedup = match std::env::var("ETL_DEDUP") {
            Ok(v) => v.parse().map_err(|_| {
                PipelineError::Config(format!(
                    "ETL_DEDUP must be 'natural-key' or 'distinct-rows', got '{v}'"
                ))
            })?,
            Err(_) => DedupPolicy::default(),
        };

        let config = Self {
            database,
            work_dir,
            raw_file,
            schema,
            drop_before_create,
            dedup,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn new(database: DatabaseConfig, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            database,
            work_dir: work_dir.into(),
            raw_file: "raw_data.csv".into(),
            schema: "etl".into(),
            drop_before_create: true,
            dedup: DedupPolicy::default(),
        }
    }

    pub fn with_raw_file(mut self, raw_file: impl Into<String>) -> Self {
        self.raw_file = raw_file.into();
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_drop_before_create(mut self, drop_before_create: bool) -> Self {
        self.drop_before_create = drop_before_create;
        self
    }

    pub fn with_dedup(mut self, dedup: DedupPolicy) -> Self {
        self.dedup = dedup;
        self
    }

    /// The schema name is spliced into DDL and COPY statements, so it must be
    /// a plain lower-case identifier.
    pub fn validate(&self) -> Result<()> {
        if !is_plain_identifier(&self.schema) {
            return Err(PipelineError::Config(format!(
                "schema name '{}' is not a plain identifier",
                self.schema
            )));
        }
        if self.raw_file.is_empty() {
            return Err(PipelineError::Config("raw file name is empty".into()));
        }
        Ok(())
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
