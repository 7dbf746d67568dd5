use crate::error::BoardError;
use board_snapshot::{RankingEntry, StoredSnapshot, Submission, Verdict};
use chrono::{Local, NaiveDate, TimeZone};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Which report is being produced. `Full` reports on the closed prior day; `Now` reports on
/// the running day for one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    Full,
    Now(Verdict),
}

impl ReportMode {
    pub fn verdict(self) -> Verdict {
        match self {
            ReportMode::Full => Verdict::Accepted,
            ReportMode::Now(verdict) => verdict,
        }
    }

    /// `Now` mode for a short verdict alias such as `WA`.
    pub fn now_for_alias(alias: &str) -> Result<Self, BoardError> {
        Ok(ReportMode::Now(Verdict::from_alias(alias)?))
    }
}

/// A frozen snapshot is stable once it was persisted on a later local day than the one
/// it describes, i.e. after that day closed.
pub fn is_stable_in<Tz: TimeZone>(frozen: &StoredSnapshot, snapshot_date: NaiveDate, tz: &Tz) -> bool {
    tz.timestamp_opt(frozen.persisted_at, 0)
        .earliest()
        .map(|when| when.date_naive() > snapshot_date)
        .unwrap_or(false)
}

pub fn resolve_rankings(
    mode: ReportMode,
    snapshot_date: NaiveDate,
    frozen: Option<&StoredSnapshot>,
    today: &[Submission],
) -> Result<Vec<RankingEntry>, BoardError> {
    resolve_rankings_in(mode, snapshot_date, frozen, today, &Local)
}

/// `snapshot_date` is the day the frozen snapshot describes (the day before the report).
pub fn resolve_rankings_in<Tz: TimeZone>(
    mode: ReportMode,
    snapshot_date: NaiveDate,
    frozen: Option<&StoredSnapshot>,
    today: &[Submission],
    tz: &Tz,
) -> Result<Vec<RankingEntry>, BoardError> {
    let frozen = frozen.ok_or(BoardError::MissingSnapshot(snapshot_date))?;
    match mode {
        ReportMode::Full => {
            if !is_stable_in(frozen, snapshot_date, tz) {
                return Err(BoardError::StaleSnapshot {
                    date: snapshot_date,
                    persisted_at: frozen.persisted_at,
                });
            }
            info!(
                date = %snapshot_date,
                entries = frozen.report.rankings.len(),
                "reusing frozen ranking"
            );
            Ok(frozen.report.rankings.clone())
        }
        ReportMode::Now(_) => Ok(calculate_ranking(frozen, today)),
    }
}

/// Carries the frozen cumulative counts forward with today's new distinct solves.
/// Submissions judged before the freeze instant are already in the base counts; users
/// absent from the frozen ranking are not added.
pub fn calculate_ranking(frozen: &StoredSnapshot, today: &[Submission]) -> Vec<RankingEntry> {
    let mut entries = frozen.report.rankings.clone();
    let positions: HashMap<String, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.uid.clone(), i))
        .collect();

    let mut counted: HashSet<(&str, &str)> = HashSet::new();
    let mut new_solves = 0usize;
    for submission in today {
        if submission.at < frozen.persisted_at || submission.verdict != Verdict::Accepted {
            continue;
        }
        if !counted.insert((submission.user.uid.as_str(), submission.problem_id.as_str())) {
            continue;
        }
        if let Some(&index) = positions.get(&submission.user.uid) {
            entries[index].accepted += 1;
            new_solves += 1;
        }
    }

    entries.sort_by(|a, b| b.accepted.cmp(&a.accepted));
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i as u32 + 1;
    }
    debug!(entries = entries.len(), new_solves, "recomputed live ranking");
    entries
}

/// Marks configured uids as unrated. They stay on the board but never take a rank slot.
#[derive(Debug, Clone, Default)]
pub struct UnratedPolicy {
    exclude_uids: HashSet<String>,
}

impl UnratedPolicy {
    pub fn new<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude_uids: uids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn apply(&self, entries: &mut [RankingEntry]) {
        for entry in entries {
            if self.exclude_uids.contains(&entry.uid) {
                entry.unrated = true;
            }
        }
    }
}
