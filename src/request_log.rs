//! Append-only, date-partitioned request/response log shared by all three
//! protocol front-ends.
//!
//! One file per UTC calendar date, one JSON object per line, strictly in
//! append order. Entries are never rewritten; read paths only filter and
//! slice.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{GatewayError, Result};

/// Wire protocol a log entry originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "REST")]
    Rest,
    #[serde(rename = "SOAP")]
    Soap,
    #[serde(rename = "gRPC")]
    Grpc,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Rest => "REST",
            Protocol::Soap => "SOAP",
            Protocol::Grpc => "gRPC",
        }
    }

    /// Parses the tag used in log files and query strings. Unknown tags are
    /// `None`; a filter for an unknown protocol simply matches nothing.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "REST" => Some(Protocol::Rest),
            "SOAP" => Some(Protocol::Soap),
            "gRPC" => Some(Protocol::Grpc),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error attachment on a log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: Option<String>,
    pub stack: Option<String>,
}

impl ErrorDetail {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            code: None,
            stack: None,
        }
    }
}

impl From<&GatewayError> for ErrorDetail {
    fn from(error: &GatewayError) -> Self {
        Self::new(error.to_string())
    }
}

/// One logged transaction: the request, plus either a response summary or an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub protocol: Protocol,
    pub request: Value,
    pub response: Option<Value>,
    pub error: Option<ErrorDetail>,
}

/// Writer/reader over the log directory. Cheap to clone; concurrent appends
/// are safe because each write is a single appended line.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    dir: PathBuf,
}

impl RequestLogger {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("requests-{}.log", date.format("%Y-%m-%d")))
    }

    /// Appends one entry to today's partition. Best-effort: a disk failure
    /// must never break a protocol response, so it is reported as a warning
    /// and otherwise swallowed.
    pub fn record(
        &self,
        protocol: Protocol,
        request: Value,
        response: Option<Value>,
        error: Option<ErrorDetail>,
    ) {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            protocol,
            request,
            response,
            error,
        };
        if let Err(e) = self.append(&entry) {
            warn!(protocol = %protocol, error = %e, "failed to append request log entry");
        }
    }

    fn append(&self, entry: &LogEntry) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let line = serde_json::to_string(entry)
            .map_err(|e| GatewayError::decode(format!("unserializable log entry: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.partition_path(today()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Reads every entry of one date's partition (default: today). A missing
    /// partition is an empty log; a malformed line is an error, not a skip.
    pub fn read_all(&self, date: Option<NaiveDate>) -> Result<Vec<LogEntry>> {
        let path = self.partition_path(date.unwrap_or_else(today));
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(number, line)| {
                serde_json::from_str(line).map_err(|e| {
                    GatewayError::log_parse(format!(
                        "corrupt entry at {}:{}: {e}",
                        path.display(),
                        number + 1
                    ))
                })
            })
            .collect()
    }

    pub fn filter_by_protocol(
        &self,
        protocol: Protocol,
        date: Option<NaiveDate>,
    ) -> Result<Vec<LogEntry>> {
        let entries = self.read_all(date)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.protocol == protocol)
            .collect())
    }

    /// Last `count` entries of the partition, preserving append order.
    pub fn tail(&self, count: usize, date: Option<NaiveDate>) -> Result<Vec<LogEntry>> {
        let entries = self.read_all(date)?;
        let skip = entries.len().saturating_sub(count);
        Ok(entries.into_iter().skip(skip).collect())
    }

    /// File names of every partition, empty when the directory does not
    /// exist yet.
    pub fn list_partition_files(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        files.sort();
        Ok(files)
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn logger() -> (tempfile::TempDir, RequestLogger) {
        let dir = tempdir().unwrap();
        let logger = RequestLogger::new(dir.path().to_path_buf());
        (dir, logger)
    }

    #[test]
    fn test_record_appends_in_call_order() {
        let (_dir, logger) = logger();
        for i in 0..5 {
            logger.record(Protocol::Rest, json!({"seq": i}), None, None);
        }

        let entries = logger.read_all(None).unwrap();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.request["seq"], json!(i));
        }

        let raw = fs::read_to_string(logger.partition_path(today())).unwrap();
        assert_eq!(raw.lines().count(), 5);
    }

    #[test]
    fn test_tail_returns_last_entries_in_order() {
        let (_dir, logger) = logger();
        for i in 0..10 {
            logger.record(Protocol::Grpc, json!({"seq": i}), None, None);
        }

        let tail = logger.tail(3, None).unwrap();
        assert_eq!(tail.len(), 3);
        assert_eq!(tail[0].request["seq"], json!(7));
        assert_eq!(tail[2].request["seq"], json!(9));

        // Asking for more than exists returns everything
        assert_eq!(logger.tail(100, None).unwrap().len(), 10);
    }

    #[test]
    fn test_filter_by_protocol() {
        let (_dir, logger) = logger();
        logger.record(Protocol::Soap, json!({"a": 1}), None, None);
        logger.record(Protocol::Rest, json!({"b": 2}), None, None);
        logger.record(Protocol::Soap, json!({"c": 3}), None, None);

        let soap_entries = logger.filter_by_protocol(Protocol::Soap, None).unwrap();
        assert_eq!(soap_entries.len(), 2);
        assert!(soap_entries.iter().all(|e| e.protocol == Protocol::Soap));
    }

    #[test]
    fn test_read_all_missing_partition_is_empty() {
        let (_dir, logger) = logger();
        let date = NaiveDate::from_ymd_opt(1999, 1, 1).unwrap();
        assert!(logger.read_all(Some(date)).unwrap().is_empty());
    }

    #[test]
    fn test_read_all_propagates_corrupt_line() {
        let (_dir, logger) = logger();
        logger.record(Protocol::Rest, json!({}), None, None);

        let path = logger.partition_path(today());
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "this is not json").unwrap();

        let err = logger.read_all(None).unwrap_err();
        assert!(matches!(err, GatewayError::LogParse(_)));
    }

    #[test]
    fn test_list_partition_files() {
        let (_dir, logger) = logger();
        assert!(logger.list_partition_files().unwrap().is_empty());

        logger.record(Protocol::Rest, json!({}), None, None);
        let files = logger.list_partition_files().unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with("requests-"));
        assert!(files[0].ends_with(".log"));
    }

    #[test]
    fn test_entry_roundtrip_with_error_detail() {
        let (_dir, logger) = logger();
        logger.record(
            Protocol::Soap,
            json!({"query": {"lat": null}}),
            None,
            Some(ErrorDetail::new("Missing parameters")),
        );

        let entries = logger.read_all(None).unwrap();
        let error = entries[0].error.as_ref().unwrap();
        assert_eq!(error.message, "Missing parameters");
        assert!(error.code.is_none());
    }

    #[test]
    fn test_protocol_tags() {
        assert_eq!(Protocol::Grpc.as_str(), "gRPC");
        assert_eq!(Protocol::parse("SOAP"), Some(Protocol::Soap));
        assert_eq!(Protocol::parse("smtp"), None);
    }
}
