use board_snapshot::{SnapshotError, UnknownVerdict};
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug)]
pub enum BoardError {
    /// Full mode needs the prior day's frozen snapshot and none was captured.
    MissingSnapshot(NaiveDate),
    /// The frozen snapshot was persisted before its day closed and must be re-captured.
    StaleSnapshot {
        date: NaiveDate,
        persisted_at: i64,
    },
    UnknownVerdict(String),
    Font(String),
    Asset(String),
    InvalidConfiguration(String),
    Snapshot(SnapshotError),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoardError::MissingSnapshot(date) => write!(
                f,
                "no frozen snapshot for {}; render with `now` mode or re-run once the day's data has been captured",
                date
            ),
            BoardError::StaleSnapshot { date, persisted_at } => write!(
                f,
                "snapshot for {} was persisted at {} before the day closed; capture it again",
                date, persisted_at
            ),
            BoardError::UnknownVerdict(label) => write!(f, "unknown verdict: {:?}", label),
            BoardError::Font(message) => write!(f, "font error: {}", message),
            BoardError::Asset(message) => write!(f, "asset error: {}", message),
            BoardError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            BoardError::Snapshot(err) => write!(f, "{}", err),
            BoardError::Json(err) => write!(f, "json error: {}", err),
            BoardError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for BoardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BoardError::Snapshot(err) => Some(err),
            BoardError::Json(err) => Some(err),
            BoardError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BoardError {
    fn from(value: std::io::Error) -> Self {
        BoardError::Io(value)
    }
}

impl From<serde_json::Error> for BoardError {
    fn from(value: serde_json::Error) -> Self {
        BoardError::Json(value)
    }
}

impl From<SnapshotError> for BoardError {
    fn from(value: SnapshotError) -> Self {
        BoardError::Snapshot(value)
    }
}

impl From<UnknownVerdict> for BoardError {
    fn from(value: UnknownVerdict) -> Self {
        BoardError::UnknownVerdict(value.0)
    }
}
