//! Pure statistics over one day's submissions. Nothing here mutates its input or does I/O.

use board_snapshot::{Submission, Verdict};
use chrono::{Local, TimeZone, Timelike};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VerdictSummary {
    pub avg_score: f64,
    pub ac_rate: f64,
    pub per_verdict: BTreeMap<Verdict, usize>,
}

impl VerdictSummary {
    pub fn count(&self, verdict: Verdict) -> usize {
        self.per_verdict.get(&verdict).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.per_verdict.values().sum()
    }
}

pub fn classify_by_verdict(submissions: &[Submission]) -> VerdictSummary {
    if submissions.is_empty() {
        return VerdictSummary::default();
    }
    let mut per_verdict = BTreeMap::new();
    let mut score_sum: i64 = 0;
    let mut accepted = 0usize;
    for submission in submissions {
        *per_verdict.entry(submission.verdict).or_insert(0) += 1;
        score_sum += submission.score as i64;
        if submission.verdict == Verdict::Accepted {
            accepted += 1;
        }
    }
    let count = submissions.len() as f64;
    VerdictSummary {
        avg_score: score_sum as f64 / count,
        ac_rate: accepted as f64 / count,
        per_verdict,
    }
}

/// Earliest Accepted submission, or [`Submission::no_accepted_sentinel`] when there is none.
pub fn get_first_ac(submissions: &[Submission]) -> Submission {
    submissions
        .iter()
        .filter(|s| s.verdict == Verdict::Accepted)
        .min_by_key(|s| s.at)
        .cloned()
        .unwrap_or_else(Submission::no_accepted_sentinel)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HourlyBucket {
    pub ac_rate: f64,
    pub total: usize,
}

pub type HourlyHistogram = [HourlyBucket; 24];

/// Buckets by the hour of `at` in local time.
pub fn get_hourly_submissions(submissions: &[Submission]) -> HourlyHistogram {
    hourly_submissions_in(submissions, &Local)
}

pub fn hourly_submissions_in<Tz: TimeZone>(submissions: &[Submission], tz: &Tz) -> HourlyHistogram {
    let mut totals = [0usize; 24];
    let mut accepted = [0usize; 24];
    for submission in submissions {
        let Some(when) = tz.timestamp_opt(submission.at, 0).earliest() else {
            continue;
        };
        let hour = when.hour() as usize;
        totals[hour] += 1;
        if submission.verdict == Verdict::Accepted {
            accepted[hour] += 1;
        }
    }
    let mut histogram = [HourlyBucket::default(); 24];
    for (hour, bucket) in histogram.iter_mut().enumerate() {
        bucket.total = totals[hour];
        bucket.ac_rate = if totals[hour] == 0 {
            0.0
        } else {
            accepted[hour] as f64 / totals[hour] as f64
        };
    }
    histogram
}

/// Problem with the most distinct submitters. Ties go to the problem seen first.
/// `None` for an empty list.
pub fn get_most_popular_problem(submissions: &[Submission]) -> Option<(String, usize)> {
    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut submitters: HashMap<&str, HashSet<&str>> = HashMap::new();
    for submission in submissions {
        let users = submitters
            .entry(submission.problem_id.as_str())
            .or_insert_with(|| {
                order.push((submission.problem_id.as_str(), submission.problem_name.as_str()));
                HashSet::new()
            });
        users.insert(submission.user.uid.as_str());
    }
    let mut best: Option<(&str, usize)> = None;
    for (problem_id, problem_name) in order {
        let count = submitters.get(problem_id).map(HashSet::len).unwrap_or(0);
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((problem_name, count));
        }
    }
    best.map(|(name, count)| (name.to_string(), count))
}

/// Distinct submitters, keyed by uid.
pub fn count_users_submitted(submissions: &[Submission]) -> usize {
    submissions
        .iter()
        .map(|s| s.user.uid.as_str())
        .collect::<HashSet<_>>()
        .len()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictTally {
    pub uid: String,
    pub user_name: String,
    pub earliest_at: i64,
    pub count: usize,
}

/// Per verdict, one tally per user, ordered by count descending then earliest submission.
/// In the Accepted bucket a repeat solve of the same problem is not counted again.
pub fn rank_by_verdict(submissions: &[Submission]) -> BTreeMap<Verdict, Vec<VerdictTally>> {
    let mut buckets: BTreeMap<Verdict, Vec<VerdictTally>> = BTreeMap::new();
    let mut positions: HashMap<(Verdict, &str), usize> = HashMap::new();
    let mut solved: HashSet<(&str, &str)> = HashSet::new();

    for submission in submissions {
        let uid = submission.user.uid.as_str();
        let bucket = buckets.entry(submission.verdict).or_default();
        let index = *positions.entry((submission.verdict, uid)).or_insert_with(|| {
            bucket.push(VerdictTally {
                uid: uid.to_string(),
                user_name: submission.user.name.clone(),
                earliest_at: submission.at,
                count: 0,
            });
            bucket.len() - 1
        });
        let tally = &mut bucket[index];
        tally.earliest_at = tally.earliest_at.min(submission.at);
        let counts = submission.verdict != Verdict::Accepted
            || solved.insert((uid, submission.problem_id.as_str()));
        if counts {
            tally.count += 1;
        }
    }

    for bucket in buckets.values_mut() {
        bucket.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.earliest_at.cmp(&b.earliest_at))
        });
    }
    buckets
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserDailySummary {
    pub uid: String,
    pub user_name: String,
    pub submissions: usize,
    pub solved_problems: usize,
    pub avg_score: f64,
    pub ac_rate: f64,
}

/// One user's day at a glance; `None` when they have not submitted.
pub fn user_daily_summary(submissions: &[Submission], uid: &str) -> Option<UserDailySummary> {
    let own: Vec<Submission> = submissions
        .iter()
        .filter(|s| s.user.uid == uid)
        .cloned()
        .collect();
    let first = own.first()?;
    let summary = classify_by_verdict(&own);
    let solved_problems = own
        .iter()
        .filter(|s| s.verdict == Verdict::Accepted)
        .map(|s| s.problem_id.as_str())
        .collect::<HashSet<_>>()
        .len();
    Some(UserDailySummary {
        uid: uid.to_string(),
        user_name: first.user.name.clone(),
        submissions: own.len(),
        solved_problems,
        avg_score: summary.avg_score,
        ac_rate: summary.ac_rate,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use board_snapshot::User;
    use chrono::{FixedOffset, Utc};

    pub(crate) fn sub(uid: &str, verdict: Verdict, problem: &str, at: i64) -> Submission {
        Submission::new(
            User::new(format!("user{uid}"), uid),
            if verdict == Verdict::Accepted { 100 } else { 0 },
            verdict,
            problem,
            format!("Problem {problem}"),
            at,
        )
    }

    #[test]
    fn repeat_accepts_are_not_double_counted() {
        let list = vec![
            sub("A", Verdict::Accepted, "P1", 10),
            sub("A", Verdict::Accepted, "P1", 20),
            sub("B", Verdict::Accepted, "P1", 15),
        ];
        let ranked = rank_by_verdict(&list);
        let accepted = &ranked[&Verdict::Accepted];
        assert_eq!(accepted.len(), 2);
        assert_eq!((accepted[0].uid.as_str(), accepted[0].earliest_at, accepted[0].count), ("A", 10, 1));
        assert_eq!((accepted[1].uid.as_str(), accepted[1].earliest_at, accepted[1].count), ("B", 15, 1));
    }

    #[test]
    fn non_accepted_buckets_count_every_submission() {
        let list = vec![
            sub("A", Verdict::WrongAnswer, "P1", 30),
            sub("B", Verdict::WrongAnswer, "P1", 5),
            sub("A", Verdict::WrongAnswer, "P1", 40),
        ];
        let wa = &rank_by_verdict(&list)[&Verdict::WrongAnswer];
        assert_eq!(wa[0].uid, "A");
        assert_eq!(wa[0].count, 2);
        assert_eq!(wa[0].earliest_at, 30);
        assert_eq!(wa[1].uid, "B");
    }

    #[test]
    fn accepted_count_is_bounded_by_distinct_problems() {
        let list = vec![
            sub("A", Verdict::Accepted, "P1", 1),
            sub("A", Verdict::Accepted, "P2", 2),
            sub("A", Verdict::Accepted, "P2", 3),
            sub("A", Verdict::WrongAnswer, "P3", 4),
            sub("A", Verdict::Accepted, "P1", 5),
        ];
        let distinct = list
            .iter()
            .map(|s| s.problem_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        let tally = &rank_by_verdict(&list)[&Verdict::Accepted][0];
        assert_eq!(tally.count, 2);
        assert!(tally.count <= distinct);
    }

    #[test]
    fn empty_input_is_neutral() {
        let summary = classify_by_verdict(&[]);
        assert_eq!(summary.avg_score, 0.0);
        assert_eq!(summary.ac_rate, 0.0);
        assert!(summary.per_verdict.is_empty());

        let first = get_first_ac(&[]);
        assert!(first.is_no_accepted_sentinel());
        assert!(get_most_popular_problem(&[]).is_none());
        assert_eq!(count_users_submitted(&[]), 0);
        assert!(rank_by_verdict(&[]).is_empty());
    }

    #[test]
    fn classification_counts_cover_every_submission() {
        let list = vec![
            sub("A", Verdict::Accepted, "P1", 1),
            sub("B", Verdict::WrongAnswer, "P1", 2),
            sub("B", Verdict::TimeLimitExceeded, "P2", 3),
            sub("C", Verdict::Accepted, "P2", 4),
        ];
        let summary = classify_by_verdict(&list);
        assert_eq!(summary.total(), list.len());
        assert_eq!(summary.count(Verdict::Accepted), 2);
        assert_eq!(summary.avg_score, 50.0);
        assert_eq!(summary.ac_rate, 0.5);
    }

    #[test]
    fn first_ac_is_global_minimum_regardless_of_order() {
        let list = vec![
            sub("A", Verdict::Accepted, "P1", 50),
            sub("B", Verdict::WrongAnswer, "P1", 1),
            sub("C", Verdict::Accepted, "P2", 7),
        ];
        assert_eq!(get_first_ac(&list).user.uid, "C");
    }

    #[test]
    fn hourly_histogram_always_has_24_buckets() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        // 1970-01-01 00:30 UTC is 08:30 at +08:00.
        let list = vec![
            sub("A", Verdict::Accepted, "P1", 1800),
            sub("B", Verdict::WrongAnswer, "P1", 1900),
            sub("C", Verdict::WrongAnswer, "P1", 3600 * 5),
        ];
        let histogram = hourly_submissions_in(&list, &tz);
        assert_eq!(histogram.len(), 24);
        assert_eq!(histogram[8], HourlyBucket { ac_rate: 0.5, total: 2 });
        assert_eq!(histogram[13], HourlyBucket { ac_rate: 0.0, total: 1 });
        assert_eq!(histogram[0], HourlyBucket::default());

        let utc = hourly_submissions_in(&list, &Utc);
        assert_eq!(utc[0].total, 2);
    }

    #[test]
    fn popularity_counts_each_user_once_per_problem() {
        let list = vec![
            sub("A", Verdict::WrongAnswer, "P1", 1),
            sub("A", Verdict::WrongAnswer, "P1", 2),
            sub("A", Verdict::WrongAnswer, "P1", 3),
            sub("B", Verdict::Accepted, "P2", 4),
            sub("C", Verdict::Accepted, "P2", 5),
        ];
        assert_eq!(get_most_popular_problem(&list), Some(("Problem P2".to_string(), 2)));
    }

    #[test]
    fn popularity_ties_go_to_first_seen() {
        let list = vec![
            sub("A", Verdict::WrongAnswer, "P7", 1),
            sub("B", Verdict::Accepted, "P3", 2),
        ];
        assert_eq!(get_most_popular_problem(&list), Some(("Problem P7".to_string(), 1)));
    }

    #[test]
    fn distinct_users_are_keyed_by_uid() {
        let mut list = vec![sub("1", Verdict::Accepted, "P1", 1)];
        list.push(Submission::new(User::new("user1", "2"), 0, Verdict::WrongAnswer, "P1", "x", 2));
        list.push(Submission::new(User::new("renamed", "1"), 0, Verdict::WrongAnswer, "P1", "x", 3));
        assert_eq!(count_users_submitted(&list), 2);
    }

    #[test]
    fn user_summary_reports_own_submissions_only() {
        let list = vec![
            sub("A", Verdict::Accepted, "P1", 1),
            sub("A", Verdict::Accepted, "P1", 2),
            sub("A", Verdict::WrongAnswer, "P2", 3),
            sub("B", Verdict::Accepted, "P2", 4),
        ];
        let summary = user_daily_summary(&list, "A").unwrap();
        assert_eq!(summary.submissions, 3);
        assert_eq!(summary.solved_problems, 1);
        assert!((summary.ac_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(user_daily_summary(&list, "Z").is_none());
    }
}
