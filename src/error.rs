use thiserror::Error;

use crate::models::ProcedureId;

#[derive(Error, Debug)]
pub enum OcorrenciasError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API request to {url} failed with status {status}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Unexpected API response: {0}")]
    UnexpectedStatus(String),

    #[error("JSON object misses mandatory key '{0}'")]
    MissingField(String),

    #[error("Dictionary of POPs is empty, review the dados.rio API documentation")]
    EmptyCatalog,

    #[error("Empty events list: no open incidents reported, check whether the other systems are working as expected")]
    EmptyEvents,

    #[error("Procedure {0} is not present in the POP catalog")]
    Lookup(ProcedureId),

    #[error("Invalid response date: {0}")]
    ResponseDate(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OcorrenciasError {
    /// Transport faults and non-2xx answers are worth another attempt, anything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { .. })
    }
}

pub type Result<T> = std::result::Result<T, OcorrenciasError>;
