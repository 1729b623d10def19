#![allow(dead_code)]

use std::path::Path;

use sqlx::postgres::PgConnection;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;

use adstar_pipeline::config::{DatabaseConfig, EtlConfig};
use adstar_pipeline::db;
use adstar_pipeline::stage::PipelineContext;

pub const RAW_EXPORT: &str = include_str!("../fixtures/raw_export.csv");

pub struct TestDb {
    pub config: DatabaseConfig,
    // Hold the container so it stays alive for the duration of the test
    _container: ContainerAsync<Postgres>,
}

impl TestDb {
    pub async fn new() -> Self {
        let container = Postgres::default().start().await.unwrap();
        let host_port = container.get_host_port_ipv4(5432).await.unwrap();

        let config = DatabaseConfig::new("127.0.0.1", host_port, "postgres", "postgres", "postgres");

        Self {
            config,
            _container: container,
        }
    }

    pub async fn connect(&self) -> PgConnection {
        db::connect(&self.config).await.unwrap()
    }

    pub fn context(&self, work_dir: &Path) -> PipelineContext {
        PipelineContext::new(EtlConfig::new(self.config.clone(), work_dir)).unwrap()
    }
}

/// Write the fixture export as the raw input of a run in `dir`.
pub fn write_raw_export(dir: &Path) {
    std::fs::write(dir.join("raw_data.csv"), RAW_EXPORT).unwrap();
}

pub async fn count_rows(conn: &mut PgConnection, table: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!("SELECT count(*) FROM etl.{table}"))
        .fetch_one(conn)
        .await
        .unwrap()
}
