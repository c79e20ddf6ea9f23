pub mod aggregator;
pub mod resolver;
pub mod sink;

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use log::{debug, info};
use url::form_urlencoded;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::ProcedureId;
use crate::providers::dadosrio::{validators, DadosRioClient};
use aggregator::AggregateCounts;
use resolver::{ResponsibilityReport, ResponsibilityResolver};
use sink::{CsvSink, SnapshotTimes};

pub const OPEN_INCIDENTS_METHOD: &str = "ocorrencias_abertas";
pub const INCIDENTS_METHOD: &str = "ocorrencias";
pub const CATALOG_METHOD: &str = "pops";

const QUERY_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Steps of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchOpen,
    FetchClosed,
    FetchCatalog,
    ResolveResponsibility,
    Aggregate,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchOpen => "fetch open incidents",
            Self::FetchClosed => "fetch closed incidents",
            Self::FetchCatalog => "fetch POP catalog",
            Self::ResolveResponsibility => "resolve responsibility",
            Self::Aggregate => "aggregate",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub snapshot: SnapshotTimes,
    pub counts: AggregateCounts,
    pub responsibility: ResponsibilityReport,
    pub rows_written: usize,
}

pub struct Pipeline {
    client: DadosRioClient,
    sink: CsvSink,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let client = DadosRioClient::new(&config.base_url, config.retry)?;
        let sink = CsvSink::new(config.output_path.clone(), config.timezone);
        debug!(
            "Up to {} retries {:?} apart, appending to {}",
            config.retry.retries(),
            config.retry.delay(),
            sink.path().display()
        );

        Ok(Self {
            client,
            sink,
            config,
        })
    }

    /// Run one snapshot end to end.
    ///
    /// Nothing is written unless every step up to aggregation succeeded; a
    /// failing responsibility check only marks that POP as skipped.
    pub async fn run(&self) -> Result<RunSummary> {
        enter(Stage::FetchOpen);
        let open = self.client.fetch(OPEN_INCIDENTS_METHOD, None).await?;
        let open_incidents =
            validators::to_incident_list(&open.body, self.config.strict_empty_events)?;
        info!("{} open incidents reported", open_incidents.len());

        enter(Stage::FetchClosed);
        let query = self.closed_incidents_query(open.fetched_at);
        let closed = self.client.fetch(INCIDENTS_METHOD, Some(query.as_str())).await?;
        let closed_incidents = validators::to_incident_list(&closed.body, false)?;
        info!(
            "{} incidents reported since the closed incidents window start",
            closed_incidents.len()
        );

        let procedure_ids: BTreeSet<ProcedureId> = open_incidents
            .iter()
            .chain(&closed_incidents)
            .map(|incident| incident.procedure_id)
            .collect();
        info!("Events with the following POPs were reported: {procedure_ids:?}");

        enter(Stage::FetchCatalog);
        let catalog_response = self.client.fetch(CATALOG_METHOD, None).await?;
        let catalog = validators::to_procedure_catalog(&catalog_response.body)?;
        info!("{} POPs in the catalog", catalog.len());

        enter(Stage::ResolveResponsibility);
        let responsibility = ResponsibilityResolver::new(
            &self.client,
            &self.config.agency_of_interest,
            self.config.concurrency,
        )
        .resolve(&procedure_ids, &catalog)
        .await;

        enter(Stage::Aggregate);
        let counts =
            aggregator::count_by_category(open_incidents.iter().chain(&closed_incidents), &catalog)?;

        enter(Stage::Persist);
        let snapshot = SnapshotTimes {
            open: open.fetched_at,
            closed: closed.fetched_at,
        };
        let rows_written = self.sink.append(&counts, &snapshot)?;

        Ok(RunSummary {
            snapshot,
            counts,
            responsibility,
            rows_written,
        })
    }

    /// `inicio=<local datetime>` covering the configured window before `reference`.
    fn closed_incidents_query(&self, reference: DateTime<Utc>) -> String {
        let since = (reference - self.config.closed_window)
            .with_timezone(&self.config.timezone)
            .format(QUERY_DATETIME_FORMAT)
            .to_string();

        form_urlencoded::Serializer::new(String::new())
            .append_pair("inicio", &since)
            .finish()
    }
}

fn enter(stage: Stage) {
    info!("Stage: {stage}");
}
