use crate::record::DailyReport;
use chrono::NaiveDate;
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

#[derive(Debug)]
pub enum SnapshotError {
    Io(io::Error),
    Json { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotError::Io(err) => write!(f, "snapshot io error: {}", err),
            SnapshotError::Json { path, source } => {
                write!(f, "snapshot {} is not valid: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for SnapshotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SnapshotError::Io(err) => Some(err),
            SnapshotError::Json { source, .. } => Some(source),
        }
    }
}

impl From<io::Error> for SnapshotError {
    fn from(value: io::Error) -> Self {
        SnapshotError::Io(value)
    }
}

/// A persisted report together with the instant it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    pub report: DailyReport,
    /// Unix seconds of the last write. Acts as the freeze instant for carry-forward merges.
    pub persisted_at: i64,
}

impl StoredSnapshot {
    pub fn new(report: DailyReport, persisted_at: i64) -> Self {
        Self {
            report,
            persisted_at,
        }
    }
}

/// One JSON file per board and day: `{board_id}-{YYYY-MM-DD}.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    board_id: String,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, board_id: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            board_id: board_id.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}-{}.json", self.board_id, date.format("%Y-%m-%d")))
    }

    /// `Ok(None)` when no snapshot was captured for `date`.
    pub fn load(&self, date: NaiveDate) -> Result<Option<StoredSnapshot>, SnapshotError> {
        let path = self.path_for(date);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let report: DailyReport = serde_json::from_slice(&bytes).map_err(|source| {
            SnapshotError::Json {
                path: path.clone(),
                source,
            }
        })?;
        let persisted_at = modified_unix_secs(&path)?;
        Ok(Some(StoredSnapshot {
            report,
            persisted_at,
        }))
    }

    /// Writes through a temporary sibling and renames it into place, so readers never see
    /// a half-written file.
    pub fn save(&self, date: NaiveDate, report: &DailyReport) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(date);
        let json = serde_json::to_vec_pretty(report).map_err(|source| SnapshotError::Json {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        Ok(path)
    }
}

fn modified_unix_secs(path: &Path) -> Result<i64, SnapshotError> {
    let modified = fs::metadata(path)?.modified()?;
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RankingEntry, Submission, User};
    use crate::verdict::Verdict;

    fn sample_report() -> DailyReport {
        DailyReport::new(
            vec![
                Submission::new(User::new("alice", "1"), 100, Verdict::Accepted, "P1", "A+B", 1_700_000_000),
                Submission::new(User::new("bob", "2"), 30, Verdict::WrongAnswer, "P2", "Sort", 1_700_000_100),
            ],
            vec![
                RankingEntry::new("alice", "1", 12).with_rank(1),
                RankingEntry::new("carol", "3", 9).with_rank(2).unrated(true),
            ],
        )
    }

    #[test]
    fn file_name_is_keyed_by_board_and_date() {
        let store = SnapshotStore::new("/data", "hydro");
        let date = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();
        assert_eq!(store.path_for(date), PathBuf::from("/data/hydro-2025-03-09.json"));
    }

    #[test]
    fn save_then_load_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("data"), "board");
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let report = sample_report();

        store.save(date, &report).unwrap();
        let loaded = store.load(date).unwrap().expect("snapshot present");
        assert_eq!(loaded.report, report);
        assert!(loaded.persisted_at > 0);
    }

    #[test]
    fn missing_snapshot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), "board");
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert!(store.load(date).unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path(), "board");
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        fs::write(store.path_for(date), b"{not json").unwrap();
        let err = store.load(date).unwrap_err();
        assert!(matches!(err, SnapshotError::Json { .. }));
        assert!(err.to_string().contains("board-2025-01-02.json"));
    }
}
