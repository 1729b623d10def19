//! The three pipeline stages and a minimal runner for them.
//!
//! `prepare` creates the destination tables, `transform` turns the raw
//! export into per-table files, and `load` copies those files into the
//! database. Each stage only needs the [`PipelineContext`] and, where it
//! talks to the database, a connection. Retries and scheduling belong to
//! whatever invokes the stages.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sqlx::postgres::PgConnection;

use crate::cleanup::consume_inputs;
use crate::config::EtlConfig;
use crate::db;
use crate::error::{PipelineError, Result};
use crate::load::{copy_tables, LoadReport};
use crate::models::TableFiles;
use crate::sanitize::{sanitize, SanitizeReport};
use crate::schema::prepare_schema;
use crate::split::{split, SplitReport};

const SANITIZED_FILE: &str = "sanitized_data.csv";

/// Everything a run needs, resolved once and shared by reference.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    config: EtlConfig,
    raw_path: PathBuf,
    sanitized_path: PathBuf,
    files: TableFiles,
}

impl PipelineContext {
    pub fn new(config: EtlConfig) -> Result<Self> {
        config.validate()?;
        let raw_path = config.work_dir.join(&config.raw_file);
        let sanitized_path = config.work_dir.join(SANITIZED_FILE);
        let files = TableFiles::in_dir(&config.work_dir);
        Ok(Self {
            config,
            raw_path,
            sanitized_path,
            files,
        })
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn raw_path(&self) -> &Path {
        &self.raw_path
    }

    pub fn sanitized_path(&self) -> &Path {
        &self.sanitized_path
    }

    pub fn files(&self) -> &TableFiles {
        &self.files
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prepare,
    Transform,
    Load,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Prepare, Stage::Transform, Stage::Load];

    /// Stages that must have completed before this one may start.
    pub fn depends_on(self) -> &'static [Stage] {
        match self {
            Stage::Prepare => &[],
            Stage::Transform => &[Stage::Prepare],
            Stage::Load => &[Stage::Transform],
        }
    }

    /// Direct and indirect dependencies of this stage.
    pub fn prerequisites(self) -> Vec<Stage> {
        let mut found = Vec::new();
        let mut queue = self.depends_on().to_vec();
        while let Some(stage) = queue.pop() {
            if !found.contains(&stage) {
                found.push(stage);
                queue.extend_from_slice(stage.depends_on());
            }
        }
        found
    }

    pub fn needs_database(self) -> bool {
        matches!(self, Stage::Prepare | Stage::Load)
    }
}

/// Order the requested stages so that each runs after its dependencies.
///
/// Duplicates are dropped. A stage waits for every requested stage it
/// depends on, directly or through a stage that was not requested.
/// Dependencies that were not requested are assumed to have run in an
/// earlier invocation.
pub fn plan(requested: &[Stage]) -> Vec<Stage> {
    let mut pending: Vec<Stage> = Vec::new();
    for stage in requested {
        if !pending.contains(stage) {
            pending.push(*stage);
        }
    }

    let mut ordered: Vec<Stage> = Vec::with_capacity(pending.len());
    while !pending.is_empty() {
        let ready = pending.iter().position(|stage| {
            stage
                .prerequisites()
                .iter()
                .all(|dep| !pending.contains(dep))
        });
        match ready {
            Some(i) => ordered.push(pending.remove(i)),
            // The dependency chain is acyclic, so some stage is always ready.
            None => break,
        }
    }
    ordered
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformReport {
    pub sanitize: SanitizeReport,
    pub split: SplitReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub stages: Vec<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadReport>,
}

/// Create the schema and tables.
#[tracing::instrument(skip_all, fields(schema = %ctx.config().schema))]
pub async fn prepare(ctx: &PipelineContext, conn: &mut PgConnection) -> Result<()> {
    let config = ctx.config();
    prepare_schema(conn, &config.schema, config.drop_before_create).await
}

/// Sanitize the raw export and split it into table files.
///
/// The sanitized intermediate is removed once the split has succeeded. The
/// raw export is never touched.
#[tracing::instrument(skip_all, fields(raw = %ctx.raw_path().display()))]
pub async fn transform(ctx: &PipelineContext) -> Result<TransformReport> {
    let raw_path = ctx.raw_path().to_path_buf();
    let sanitized_path = ctx.sanitized_path().to_path_buf();
    let files = ctx.files().clone();
    let policy = ctx.config().dedup;

    let (sanitize_report, split_report) = tokio::task::spawn_blocking(move || {
        let sanitize_report = sanitize(&raw_path, &sanitized_path)?;
        let split_report = split(&sanitized_path, &files, policy)?;
        Ok::<_, PipelineError>((sanitize_report, split_report))
    })
    .await??;

    consume_inputs([ctx.sanitized_path()]).await?;

    Ok(TransformReport {
        sanitize: sanitize_report,
        split: split_report,
    })
}

/// Copy the table files into the database and commit, then delete them.
///
/// The files survive a failed load. After a successful one they are gone,
/// so a second `load` without a new `transform` fails with an I/O error.
#[tracing::instrument(skip_all, fields(schema = %ctx.config().schema))]
pub async fn load(ctx: &PipelineContext, conn: &mut PgConnection) -> Result<LoadReport> {
    let report = copy_tables(conn, &ctx.config().schema, ctx.files()).await?;
    consume_inputs(ctx.files().paths()).await?;
    Ok(report)
}

/// Run the requested stages in dependency order on one connection.
///
/// The connection is opened only if a stage needs it and is closed on every
/// exit path.
pub async fn run(ctx: &PipelineContext, requested: &[Stage]) -> Result<RunReport> {
    let stages = plan(requested);
    tracing::info!(stages = ?stages, "starting pipeline run");

    let mut conn = if stages.iter().any(|s| s.needs_database()) {
        Some(db::connect(&ctx.config().database).await?)
    } else {
        None
    };

    let outcome = run_stages(ctx, &stages, conn.as_mut()).await;

    if let Some(conn) = conn {
        db::close(conn).await;
    }

    if outcome.is_ok() {
        tracing::info!("pipeline run finished");
    }
    outcome
}

async fn run_stages(
    ctx: &PipelineContext,
    stages: &[Stage],
    mut conn: Option<&mut PgConnection>,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    for &stage in stages {
        tracing::info!(%stage, "running stage");
        match (stage, conn.as_deref_mut()) {
            (Stage::Prepare, Some(conn)) => prepare(ctx, conn).await?,
            (Stage::Transform, _) => report.transform = Some(transform(ctx).await?),
            (Stage::Load, Some(conn)) => report.load = Some(load(ctx, conn).await?),
            (stage, None) => {
                return Err(PipelineError::Config(format!(
                    "stage {stage} needs a database connection"
                )))
            }
        }
        report.stages.push(stage);
    }

    Ok(report)
}
