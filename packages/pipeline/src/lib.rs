//! Adstar pipeline - Materialize advertising performance exports as a star
//! schema in PostgreSQL.
//!
//! A run has three stages:
//!
//! - [`stage::prepare`]: create the schema and the five tables
//! - [`stage::transform`]: [`sanitize`] the raw export, then [`split`] it
//!   into one CSV per table
//! - [`stage::load`]: bulk-copy the CSVs in one transaction and remove them
//!
//! [`stage::run`] executes any subset of them in dependency order on a
//! single connection.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod load;
pub mod models;
pub mod sanitize;
pub mod schema;
pub mod split;
pub mod stage;

pub use config::{DatabaseConfig, DedupPolicy, EtlConfig};
pub use error::{PipelineError, Result};
pub use models::{Table, TableFiles};
pub use stage::{load, prepare, run, transform, PipelineContext, RunReport, Stage};
