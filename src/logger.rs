//! Loop log persistence
//!
//! Sessions are kept as rows of a CSV table. Appending reads the whole table,
//! adds one row and writes the table back. Sessions happen on a human timescale so
//! the rewrite is cheap, but the file is not safe for concurrent writers.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::LoopError;
use crate::types::{ContextTag, LoopType};

/// One logged session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogRecord {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub session_id: Uuid,
    pub pattern: String,
    pub loop_type: LoopType,
    pub duration_sec: f64,
    pub context: ContextTag,
    #[serde(with = "yes_no")]
    pub break_suggested: bool,
}

/// CSV-backed loop log
#[derive(Debug, Clone)]
pub struct PatternLog {
    path: PathBuf,
}

impl PatternLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every logged session; a log that does not exist yet is empty
    pub fn load(&self) -> Result<Vec<LogRecord>, LoopError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            records.push(row?);
        }
        Ok(records)
    }

    /// Append one session and return the number of rows now in the log
    pub fn append(&self, record: &LogRecord) -> Result<usize, LoopError> {
        let mut records = self.load()?;
        records.push(record.clone());
        self.write_all(&records)?;

        debug!(path = %self.path.display(), rows = records.len(), "loop log updated");
        Ok(records.len())
    }

    fn write_all(&self, records: &[LogRecord]) -> Result<(), LoopError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoopError::Persistence(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// `YYYY-MM-DD HH:MM:SS`, as shown in the dashboard
pub(crate) mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

mod yes_no {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "Yes" } else { "No" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected Yes or No, got {other:?}"
            ))),
        }
    }
}
