//! Command-line interface for running pipeline stages.

use clap::{Parser, Subcommand};

use crate::stage::Stage;

/// Adstar ETL - Load advertising performance exports into a star schema.
///
/// Configuration is read from `ETL_*` environment variables.
#[derive(Parser)]
#[command(name = "adstar-etl")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run prepare, transform and load in order.
    Run,

    /// Run only the named stages, in dependency order.
    Stage {
        #[arg(value_enum, required = true)]
        stages: Vec<Stage>,
    },
}

impl Cli {
    pub fn stages(&self) -> Vec<Stage> {
        match &self.command {
            Commands::Run => Stage::ALL.to_vec(),
            Commands::Stage { stages } => stages.clone(),
        }
    }
}
