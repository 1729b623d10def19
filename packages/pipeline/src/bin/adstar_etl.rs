use clap::Parser;
use tracing_subscriber::EnvFilter;

use adstar_pipeline::cli::Cli;
use adstar_pipeline::config::EtlConfig;
use adstar_pipeline::stage::{run, PipelineContext};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let ctx = match EtlConfig::from_env().and_then(PipelineContext::new) {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    match run(&ctx, &cli.stages()).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => tracing::warn!(error = %e, "failed to render run report"),
        },
        Err(e) => {
            tracing::error!(error = %e, "pipeline run failed");
            std::process::exit(1);
        }
    }
}
