//! Data-logging session bookkeeping and export artifacts.
//!
//! Sessions come back from the webserver with ISO-8601 start times in
//! whatever offset representation the logger used; selection of the most
//! recent session compares parsed instants, never the raw strings.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::{Error, Result};

/// One data-logging session as listed by the webserver.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSession {
    pub id: String,
    pub start_time: String,
}

impl LoggingSession {
    /// Start time as a true instant.
    pub fn start_instant(&self) -> Result<DateTime<Utc>> {
        parse_instant(&self.start_time)
    }
}

/// Parse an ISO-8601 timestamp, with or without an explicit offset.
/// Offset-free values are taken as UTC.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| Error::Protocol(format!("unparsable session start time {s:?}: {e}")))
}

/// Parse the session listing body.
pub fn parse_sessions(body: &str) -> Result<Vec<LoggingSession>> {
    serde_json::from_str(body)
        .map_err(|e| Error::Protocol(format!("unparsable session listing: {e}")))
}

/// The most recently started session, by instant.
pub fn latest_session(sessions: &[LoggingSession]) -> Result<&LoggingSession> {
    let mut best: Option<(&LoggingSession, DateTime<Utc>)> = None;
    for session in sessions {
        let start = session.start_instant()?;
        match best {
            Some((_, t)) if t >= start => {}
            _ => best = Some((session, start)),
        }
    }
    best.map(|(s, _)| s)
        .ok_or_else(|| Error::Protocol("no data-logging sessions available".into()))
}

/// Write a timestamped export artifact carrying `header` above the session
/// export body. Returns the artifact path.
pub fn write_artifact(dir: &Path, header: &str, export_body: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::Config(format!("cannot create artifact dir {dir:?}: {e}")))?;
    let name = format!("session_{}.log", Utc::now().format("%Y%m%dT%H%M%S"));
    let path = dir.join(name);
    let content = format!("{header}\n{export_body}");
    fs::write(&path, content)
        .map_err(|e| Error::Config(format!("cannot write artifact {path:?}: {e}")))?;
    Ok(path)
}
