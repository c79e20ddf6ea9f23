use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

pub type ProcedureId = u64;

/// POP id to POP title, as served by the catalog endpoint.
pub type ProcedureCatalog = HashMap<ProcedureId, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IncidentStatus {
    Open,
    Closed,
}

impl IncidentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "ABERTO" | "A" => Some(Self::Open),
            "FECHADO" | "F" => Some(Self::Closed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "ABERTO",
            Self::Closed => "FECHADO",
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Incident {
    pub procedure_id: ProcedureId,
    pub status: IncidentStatus,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Activity {
    pub agency: String,
    pub fields: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parses_both_textual_forms() {
        assert_eq!(IncidentStatus::parse("ABERTO"), Some(IncidentStatus::Open));
        assert_eq!(IncidentStatus::parse("A"), Some(IncidentStatus::Open));
        assert_eq!(IncidentStatus::parse("FECHADO"), Some(IncidentStatus::Closed));
        assert_eq!(IncidentStatus::parse("F"), Some(IncidentStatus::Closed));
    }

    #[test]
    fn test_status_parse_ignores_case_and_whitespace() {
        assert_eq!(IncidentStatus::parse(" aberto "), Some(IncidentStatus::Open));
        assert_eq!(IncidentStatus::parse("fechado"), Some(IncidentStatus::Closed));
    }

    #[test]
    fn test_status_parse_rejects_unknown_values() {
        assert_eq!(IncidentStatus::parse("CANCELADO"), None);
        assert_eq!(IncidentStatus::parse(""), None);
    }

    #[test]
    fn test_status_display_uses_canonical_form() {
        assert_eq!(IncidentStatus::parse("a").unwrap().to_string(), "ABERTO");
        assert_eq!(IncidentStatus::Closed.to_string(), "FECHADO");
    }
}
