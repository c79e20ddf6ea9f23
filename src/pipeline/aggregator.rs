use std::fmt;

use indexmap::IndexMap;

use crate::error::{OcorrenciasError, Result};
use crate::models::{Incident, IncidentStatus, ProcedureCatalog};

/// Separator used in the textual form of an [`AggregateKey`].
pub const KEY_SEPARATOR: &str = "_-_";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub procedure_name: String,
    pub status: IncidentStatus,
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.procedure_name, self.status)
    }
}

/// Counts in order of first appearance.
pub type AggregateCounts = IndexMap<AggregateKey, usize>;

pub fn count_by_category<'a, I>(incidents: I, catalog: &ProcedureCatalog) -> Result<AggregateCounts>
where
    I: IntoIterator<Item = &'a Incident>,
{
    let mut counts = AggregateCounts::new();

    for incident in incidents {
        let procedure_name = catalog
            .get(&incident.procedure_id)
            .ok_or(OcorrenciasError::Lookup(incident.procedure_id))?;

        let key = AggregateKey {
            procedure_name: procedure_name.clone(),
            status: incident.status,
        };
        *counts.entry(key).or_default() += 1;
    }

    Ok(counts)
}
