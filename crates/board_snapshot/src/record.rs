use crate::verdict::Verdict;
use serde::{Deserialize, Serialize};

const SENTINEL_UID: &str = "-1";
const SENTINEL_NAME: &str = "Nobody got Accepted today";
const SENTINEL_PROBLEM: &str = "Never gonna give you up";
const SENTINEL_AT: i64 = 114_514;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// Display label. May already carry a disambiguating alias.
    pub name: String,
    /// Stable identity key; the only key used for distinct-user counting.
    pub uid: String,
}

impl User {
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub user: User,
    pub score: i32,
    pub verdict: Verdict,
    pub problem_id: String,
    pub problem_name: String,
    /// Judged time, unix seconds.
    pub at: i64,
}

impl Submission {
    pub fn new(
        user: User,
        score: i32,
        verdict: Verdict,
        problem_id: impl Into<String>,
        problem_name: impl Into<String>,
        at: i64,
    ) -> Self {
        Self {
            user,
            score,
            verdict,
            problem_id: problem_id.into(),
            problem_name: problem_name.into(),
            at,
        }
    }

    /// Placeholder returned by first-AC lookups when the day has no Accepted submission.
    pub fn no_accepted_sentinel() -> Self {
        Self {
            user: User::new(SENTINEL_NAME, SENTINEL_UID),
            score: 0,
            verdict: Verdict::Waiting,
            problem_id: String::new(),
            problem_name: SENTINEL_PROBLEM.to_string(),
            at: SENTINEL_AT,
        }
    }

    pub fn is_no_accepted_sentinel(&self) -> bool {
        self.user.uid == SENTINEL_UID && self.verdict != Verdict::Accepted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub user_name: String,
    pub accepted: u32,
    pub uid: String,
    pub rank: u32,
    #[serde(default)]
    pub unrated: bool,
}

impl RankingEntry {
    pub fn new(user_name: impl Into<String>, uid: impl Into<String>, accepted: u32) -> Self {
        Self {
            user_name: user_name.into(),
            accepted,
            uid: uid.into(),
            rank: 0,
            unrated: false,
        }
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    pub fn unrated(mut self, unrated: bool) -> Self {
        self.unrated = unrated;
        self
    }
}

/// One day's captured data: submissions judged that day plus the ranking at capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReport {
    #[serde(default)]
    pub submissions: Vec<Submission>,
    #[serde(default)]
    pub rankings: Vec<RankingEntry>,
}

impl DailyReport {
    pub fn new(submissions: Vec<Submission>, rankings: Vec<RankingEntry>) -> Self {
        Self {
            submissions,
            rankings,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty() && self.rankings.is_empty()
    }
}
