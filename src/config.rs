use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use chrono_tz::Tz;
use url::Url;

use crate::error::{OcorrenciasError, Result};
use crate::providers::dadosrio::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://api.dados.rio/v2/adm_cor_comando";
pub const DEFAULT_AGENCY: &str = "CET-RIO";
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
pub const DEFAULT_OUTPUT: &str = "ocorrencias_por_categoria.csv";
pub const DEFAULT_RETRY_COUNT: u32 = 4;
pub const DEFAULT_RETRY_DELAY_SECONDS: u64 = 2;
pub const DEFAULT_CLOSED_WINDOW_MINUTES: i64 = 60;
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Everything a pipeline run needs, validated up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub base_url: Url,
    pub agency_of_interest: String,
    pub strict_empty_events: bool,
    pub retry: RetryPolicy,
    pub timezone: Tz,
    pub output_path: PathBuf,
    /// How far back from the open-incidents snapshot closed incidents are queried.
    pub closed_window: TimeDelta,
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            agency_of_interest: DEFAULT_AGENCY.to_string(),
            strict_empty_events: false,
            retry: RetryPolicy::new(
                DEFAULT_RETRY_COUNT,
                Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS),
            ),
            timezone: chrono_tz::America::Sao_Paulo,
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            closed_window: TimeDelta::minutes(DEFAULT_CLOSED_WINDOW_MINUTES),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| OcorrenciasError::Config(format!("Invalid base URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(OcorrenciasError::Config(format!(
            "Base URL '{raw}' cannot be used as a base"
        )));
    }
    Ok(url)
}

pub fn parse_timezone(raw: &str) -> Result<Tz> {
    raw.parse::<Tz>()
        .map_err(|e| OcorrenciasError::Config(format!("Invalid timezone '{raw}': {e}")))
}

pub fn closed_window_from_minutes(minutes: i64) -> Result<TimeDelta> {
    if minutes < 0 {
        return Err(OcorrenciasError::Config(format!(
            "Closed incidents window must not be negative, got {minutes}"
        )));
    }
    TimeDelta::try_minutes(minutes).ok_or_else(|| {
        OcorrenciasError::Config(format!("Closed incidents window of {minutes} minutes is too large"))
    })
}

pub fn validate_concurrency(concurrency: usize) -> Result<usize> {
    if concurrency == 0 {
        return Err(OcorrenciasError::Config(
            "Concurrency must be at least 1".to_string(),
        ));
    }
    Ok(concurrency)
}
