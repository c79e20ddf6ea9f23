//! Checks that turn raw dados.rio JSON bodies into typed values.
//!
//! Every function fails with a specific error kind when the response contract is
//! broken, so a malformed answer is never mistaken for a bug in the pipeline.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{OcorrenciasError, Result};
use crate::models::{Activity, Incident, IncidentStatus, ProcedureCatalog, ProcedureId};

/// Ids arrive as numbers, occasionally as numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl RawId {
    fn into_id(self, key: &str) -> Result<ProcedureId> {
        match self {
            RawId::Number(id) => Ok(id),
            RawId::Text(text) => text.trim().parse().map_err(|_| {
                OcorrenciasError::UnexpectedStatus(format!("'{key}' is not a valid id: {text:?}"))
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventDto {
    pop_id: RawId,
    status: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct PopEntryDto {
    id: RawId,
    titulo: String,
}

#[derive(Debug, Deserialize)]
struct ActivityDto {
    orgao: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

fn required<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    object
        .get(key)
        .ok_or_else(|| OcorrenciasError::MissingField(key.to_string()))
}

fn required_list<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a Vec<Value>> {
    required(object, key)?
        .as_array()
        .ok_or_else(|| OcorrenciasError::UnexpectedStatus(format!("key '{key}' is not a list")))
}

/// Check `keys` are present, then deserialize the object into its DTO.
fn parse_entry<T: DeserializeOwned>(value: &Value, what: &str, keys: &[&str]) -> Result<T> {
    let object = value
        .as_object()
        .ok_or_else(|| OcorrenciasError::UnexpectedStatus(format!("{what} is not a JSON object")))?;
    for key in keys {
        required(object, key)?;
    }

    T::deserialize(value)
        .map_err(|e| OcorrenciasError::UnexpectedStatus(format!("malformed {what}: {e}")))
}

fn to_incident(value: &Value) -> Result<Incident> {
    let event: EventDto = parse_entry(value, "event", &["pop_id", "status"])?;

    let status = IncidentStatus::parse(&event.status).ok_or_else(|| {
        OcorrenciasError::UnexpectedStatus(format!("unknown incident status {:?}", event.status))
    })?;

    Ok(Incident {
        procedure_id: event.pop_id.into_id("pop_id")?,
        status,
        fields: event.fields,
    })
}

/// Extract the `eventos` list.
///
/// An empty list is only fatal when `strict_empty` is set; otherwise it is
/// reported as a warning and an empty list is returned.
pub fn to_incident_list(json: &Map<String, Value>, strict_empty: bool) -> Result<Vec<Incident>> {
    let events = required_list(json, "eventos")?;

    if events.is_empty() {
        if strict_empty {
            return Err(OcorrenciasError::EmptyEvents);
        }
        warn!("Empty events list: no incidents reported. This may not be an error per se, but check whether the other systems are working as expected");
        return Ok(Vec::new());
    }

    let incidents = events.iter().map(to_incident).collect::<Result<Vec<_>>>()?;
    debug!("Parsed {} incidents", incidents.len());

    Ok(incidents)
}

pub fn to_procedure_catalog(json: &Map<String, Value>) -> Result<ProcedureCatalog> {
    let retorno = required(json, "retorno")?;
    if retorno.as_str() != Some("OK") {
        return Err(OcorrenciasError::UnexpectedStatus(format!(
            "key 'retorno' is {retorno}, expected \"OK\""
        )));
    }

    let catalog = required_list(json, "objeto")?
        .iter()
        .map(|entry| {
            let entry: PopEntryDto = parse_entry(entry, "POP entry", &["id", "titulo"])?;
            Ok((entry.id.into_id("id")?, entry.titulo))
        })
        .collect::<Result<ProcedureCatalog>>()?;

    debug!("Dictionary of POPs: {catalog:?}");

    if catalog.is_empty() {
        return Err(OcorrenciasError::EmptyCatalog);
    }

    Ok(catalog)
}

/// Extract the `atividades` of a POP, checking the answer is about `expected_pop`.
pub fn to_activity_list(json: &Map<String, Value>, expected_pop: &str) -> Result<Vec<Activity>> {
    let pop = required(json, "pop")?;
    if pop.as_str() != Some(expected_pop) {
        return Err(OcorrenciasError::UnexpectedStatus(format!(
            "key 'pop' is {pop}, expected \"{expected_pop}\""
        )));
    }

    let activities = required_list(json, "atividades")?;
    if activities.is_empty() {
        warn!("POP '{expected_pop}' lists no activities");
        return Ok(Vec::new());
    }

    activities
        .iter()
        .map(|value| {
            let activity: ActivityDto = parse_entry(value, "activity", &["orgao"])?;
            Ok(Activity {
                agency: activity.orgao.trim().to_string(),
                fields: activity.fields,
            })
        })
        .collect()
}
