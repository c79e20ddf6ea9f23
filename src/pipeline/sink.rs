use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::info;

use super::aggregator::AggregateCounts;
use crate::error::Result;
use crate::models::IncidentStatus;

pub const CSV_HEADER: &str = "datetime,tipo_ocorrencia,status_ocorrencia,quantidade_ocorrencia";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Server timestamps of the two incident fetches of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotTimes {
    pub open: DateTime<Utc>,
    pub closed: DateTime<Utc>,
}

impl SnapshotTimes {
    pub fn for_status(&self, status: IncidentStatus) -> DateTime<Utc> {
        match status {
            IncidentStatus::Open => self.open,
            IncidentStatus::Closed => self.closed,
        }
    }
}

pub struct CsvSink {
    path: PathBuf,
    timezone: Tz,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            path: path.into(),
            timezone,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row per aggregate key, writing the header first if the file is empty.
    ///
    /// Existing rows are never rewritten or deduplicated. Returns the number of
    /// data rows written.
    pub fn append(&self, counts: &AggregateCounts, snapshot: &SnapshotTimes) -> Result<usize> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut buffer = String::new();
        if file.metadata()?.len() == 0 {
            buffer.push_str(CSV_HEADER);
            buffer.push('\n');
        }

        for (key, count) in counts {
            let datetime = snapshot
                .for_status(key.status)
                .with_timezone(&self.timezone)
                .format(DATETIME_FORMAT);
            buffer.push_str(&format!(
                "{datetime},{},{},{count}\n",
                escape_field(&key.procedure_name),
                key.status
            ));
        }

        file.write_all(buffer.as_bytes())?;
        file.flush()?;

        info!(
            "Appended {} rows to {}",
            counts.len(),
            self.path.display()
        );

        Ok(counts.len())
    }
}

fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}
