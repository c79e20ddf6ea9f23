use std::collections::{BTreeMap, BTreeSet};

use futures::{stream, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{OcorrenciasError, Result};
use crate::models::{ProcedureCatalog, ProcedureId};
use crate::providers::dadosrio::{validators, DadosRioClient};

pub const RESPONSIBLE_AGENCIES_METHOD: &str = "procedimento_operacional_padrao_orgaos_responsaveis";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Responsible,
    NotResponsible,
    Skipped { reason: String },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResponsibilityReport {
    pub agency: String,
    pub outcomes: BTreeMap<ProcedureId, Resolution>,
}

impl ResponsibilityReport {
    /// Procedures the agency is confirmed to be responsible for.
    pub fn of_interest(&self) -> BTreeSet<ProcedureId> {
        self.outcomes
            .iter()
            .filter(|(_, resolution)| **resolution == Resolution::Responsible)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (ProcedureId, &str)> {
        self.outcomes.iter().filter_map(|(id, resolution)| match resolution {
            Resolution::Skipped { reason } => Some((*id, reason.as_str())),
            _ => None,
        })
    }
}

pub struct ResponsibilityResolver<'a> {
    client: &'a DadosRioClient,
    agency: &'a str,
    concurrency: usize,
}

impl<'a> ResponsibilityResolver<'a> {
    pub fn new(client: &'a DadosRioClient, agency: &'a str, concurrency: usize) -> Self {
        Self {
            client,
            agency,
            concurrency: concurrency.max(1),
        }
    }

    /// Check every procedure independently; a failing procedure is recorded as skipped.
    pub async fn resolve(
        &self,
        procedure_ids: &BTreeSet<ProcedureId>,
        catalog: &ProcedureCatalog,
    ) -> ResponsibilityReport {
        info!(
            "Checking whether {} is responsible for {} POPs...",
            self.agency,
            procedure_ids.len()
        );

        let outcomes: BTreeMap<ProcedureId, Resolution> = stream::iter(procedure_ids.iter().copied())
            .map(|id| async move { (id, self.resolve_one(id, catalog).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let report = ResponsibilityReport {
            agency: self.agency.to_string(),
            outcomes,
        };

        info!(
            "POPs under the responsibility of {}: {:?}",
            self.agency,
            report.of_interest()
        );

        report
    }

    async fn resolve_one(&self, id: ProcedureId, catalog: &ProcedureCatalog) -> Resolution {
        match self.is_responsible(id, catalog).await {
            Ok(true) => Resolution::Responsible,
            Ok(false) => Resolution::NotResponsible,
            Err(e) => {
                warn!("Skipping POP {id}: {e}");
                Resolution::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn is_responsible(&self, id: ProcedureId, catalog: &ProcedureCatalog) -> Result<bool> {
        let name = catalog.get(&id).ok_or(OcorrenciasError::Lookup(id))?;

        let query = format!("popId={id}");
        let response = self
            .client
            .fetch(RESPONSIBLE_AGENCIES_METHOD, Some(query.as_str()))
            .await?;
        let activities = validators::to_activity_list(&response.body, name)?;

        let responsible = activities
            .iter()
            .any(|activity| activity.agency == self.agency);
        debug!("POP {id} ({name}) responsible={responsible}");

        Ok(responsible)
    }
}
