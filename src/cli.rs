use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::config::{
    self, PipelineConfig, DEFAULT_AGENCY, DEFAULT_BASE_URL, DEFAULT_OUTPUT, DEFAULT_TIMEZONE,
};
use crate::pipeline::{Pipeline, RunSummary};
use crate::providers::dadosrio::RetryPolicy;

#[derive(Parser)]
#[command(name = "ocorrencias-etl")]
#[command(author, version, about = "Traffic incidents per category ETL", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one snapshot of the dados.rio incidents and append it to the CSV log
    Run {
        /// dados.rio API root
        #[arg(long, env = "DADOSRIO_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,

        /// Code of the agency whose POPs are checked
        #[arg(short, long, env = "OCORRENCIAS_AGENCY", default_value = DEFAULT_AGENCY)]
        agency: String,

        /// Abort the run when no open incidents are reported
        #[arg(long, env = "OCORRENCIAS_STRICT_EMPTY_EVENTS", default_value_t = false)]
        strict_empty_events: bool,

        /// Retries per API call after the first attempt
        #[arg(long, default_value_t = config::DEFAULT_RETRY_COUNT)]
        retry_count: u32,

        /// Seconds to wait between retries
        #[arg(long, default_value_t = config::DEFAULT_RETRY_DELAY_SECONDS)]
        retry_delay_seconds: u64,

        /// IANA time zone used to render timestamps
        #[arg(long, default_value = DEFAULT_TIMEZONE)]
        timezone: String,

        /// CSV file the aggregated counts are appended to
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,

        /// Look-back window, in minutes, of the closed incidents query
        #[arg(long, default_value_t = config::DEFAULT_CLOSED_WINDOW_MINUTES)]
        closed_window_minutes: i64,

        /// Maximum number of concurrent responsibility checks
        #[arg(short, long, default_value_t = config::DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Write the per-POP responsibility report as JSON to this file
        #[arg(long)]
        responsibility_output: Option<PathBuf>,
    },
}

impl Commands {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        match self {
            Commands::Run {
                base_url,
                agency,
                strict_empty_events,
                retry_count,
                retry_delay_seconds,
                timezone,
                output,
                closed_window_minutes,
                concurrency,
                ..
            } => Ok(PipelineConfig {
                base_url: config::parse_base_url(base_url)?,
                agency_of_interest: agency.trim().to_string(),
                strict_empty_events: *strict_empty_events,
                retry: RetryPolicy::new(*retry_count, Duration::from_secs(*retry_delay_seconds)),
                timezone: config::parse_timezone(timezone)?,
                output_path: output.clone(),
                closed_window: config::closed_window_from_minutes(*closed_window_minutes)?,
                concurrency: config::validate_concurrency(*concurrency)?,
            }),
        }
    }
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Run {
                responsibility_output,
                ..
            } => {
                let config = self.command.pipeline_config()?;
                info!(
                    "Collecting incidents from {} for agency {}",
                    config.base_url, config.agency_of_interest
                );

                let pipeline = Pipeline::new(config)?;
                let summary = pipeline.run().await?;
                log_summary(&summary);

                if let Some(output_path) = responsibility_output {
                    let json_output = if self.pretty {
                        serde_json::to_string_pretty(&summary.responsibility)?
                    } else {
                        serde_json::to_string(&summary.responsibility)?
                    };
                    std::fs::write(output_path, json_output)?;
                    info!("Responsibility report written to: {}", output_path.display());
                }

                Ok(())
            }
        }
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        "Wrote {} rows (open snapshot {}, closed snapshot {})",
        summary.rows_written, summary.snapshot.open, summary.snapshot.closed
    );
    info!(
        "POPs of interest for {}: {:?}",
        summary.responsibility.agency,
        summary.responsibility.of_interest()
    );
    for (id, reason) in summary.responsibility.skipped() {
        warn!("POP {id} was skipped: {reason}");
    }
}
