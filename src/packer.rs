//! Turns rankings into display rows: tie-compressed ranks, labels and bar progress.

use crate::aggregate::VerdictTally;
use crate::text::ellipsize;
use board_snapshot::RankingEntry;

pub const NAME_LIMIT: usize = 25;
pub const UNRATED_LABEL: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub struct DisplayRankRecord {
    pub rank: u32,
    pub value: u64,
    pub unrated: bool,
    /// Bar fill in `[0, 1]`, relative to the records displayed alongside it.
    pub progress: f64,
    /// The rank label repeats the previous rated row's label.
    pub shares_rank: bool,
    pub rank_label: String,
    pub user_label: String,
    pub value_label: String,
}

impl DisplayRankRecord {
    fn new(rank: u32, value: u64, unrated: bool, user: &str) -> Self {
        Self {
            rank,
            value,
            unrated,
            progress: 1.0,
            shares_rank: false,
            rank_label: if unrated {
                UNRATED_LABEL.to_string()
            } else {
                rank.to_string()
            },
            user_label: ellipsize(user, NAME_LIMIT),
            value_label: value.to_string(),
        }
    }
}

/// Sorts by accepted count and compresses ties into one shared rank. Unrated entries keep
/// their position but do not consume an ordinal, so the next rated value's rank skips them.
pub fn pack_rank_data(entries: &[RankingEntry]) -> Vec<DisplayRankRecord> {
    let mut sorted: Vec<&RankingEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.accepted.cmp(&a.accepted));

    let mut rank = 1u32;
    let mut last_rated: Option<u32> = None;
    let mut unrated_seen = 0u32;
    let mut records = Vec::with_capacity(sorted.len());
    for (i, entry) in sorted.into_iter().enumerate() {
        if i > 0 && !entry.unrated && last_rated != Some(entry.accepted) {
            rank = i as u32 + 1 - unrated_seen;
        }
        if entry.unrated {
            unrated_seen += 1;
        } else {
            last_rated = Some(entry.accepted);
        }
        records.push(DisplayRankRecord::new(
            rank,
            entry.accepted as u64,
            entry.unrated,
            &entry.user_name,
        ));
    }
    refresh_display(&mut records);
    records
}

/// Tie-aware top-N. The cutoff is `min(limit, rank of the last rated record)` and every
/// record at or above it is kept, so a tie at the boundary is never split. Trailing unrated
/// rows are then dropped. With `show_unrated` off, unrated rows are removed first.
pub fn slice_ranking_data(
    records: &[DisplayRankRecord],
    limit: usize,
    show_unrated: bool,
) -> Vec<DisplayRankRecord> {
    let Some(last_rated) = records.iter().rev().find(|r| !r.unrated) else {
        return Vec::new();
    };
    let limit = u32::try_from(limit).unwrap_or(u32::MAX);
    let (cutoff, pool): (u32, Vec<&DisplayRankRecord>) = if show_unrated {
        (limit.min(last_rated.rank), records.iter().collect())
    } else {
        (limit, records.iter().filter(|r| !r.unrated).collect())
    };

    let mut sliced: Vec<DisplayRankRecord> = pool
        .into_iter()
        .filter(|r| r.rank <= cutoff)
        .cloned()
        .collect();
    while sliced.last().is_some_and(|r| r.unrated) {
        sliced.pop();
    }
    refresh_display(&mut sliced);
    sliced
}

/// Single-verdict leaderboard over submission counts; tallies arrive already ordered.
pub fn pack_verdict_rank_data(tallies: &[VerdictTally]) -> Vec<DisplayRankRecord> {
    let mut rank = 1u32;
    let mut records = Vec::with_capacity(tallies.len());
    for (i, tally) in tallies.iter().enumerate() {
        if i > 0 && tally.count != tallies[i - 1].count {
            rank = i as u32 + 1;
        }
        records.push(DisplayRankRecord::new(
            rank,
            tally.count as u64,
            false,
            &tally.user_name,
        ));
    }
    refresh_display(&mut records);
    records
}

/// The two leading rows carry the same value.
pub fn has_parallel_top(records: &[DisplayRankRecord]) -> bool {
    match records {
        [first, second, ..] => first.value == second.value,
        _ => false,
    }
}

fn refresh_display(records: &mut [DisplayRankRecord]) {
    let max = records.iter().map(|r| r.value).max().unwrap_or(0) as f64;
    let min = records.iter().map(|r| r.value).min().unwrap_or(0) as f64;
    let mut previous: Option<String> = None;
    for record in records.iter_mut() {
        record.progress = ((record.value as f64 - min + 1.0) / (max - min + 1.0)).clamp(0.0, 1.0);
        record.shares_rank = !record.unrated && previous.as_deref() == Some(&record.rank_label);
        if !record.unrated {
            previous = Some(record.rank_label.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uid: &str, accepted: u32) -> RankingEntry {
        RankingEntry::new(format!("user{uid}"), uid, accepted)
    }

    fn ranks(records: &[DisplayRankRecord]) -> Vec<u32> {
        records.iter().map(|r| r.rank).collect()
    }

    #[test]
    fn equal_values_share_a_rank() {
        let packed = pack_rank_data(&[entry("a", 3), entry("b", 5), entry("c", 4), entry("d", 4)]);
        assert_eq!(ranks(&packed), vec![1, 2, 2, 4]);
        assert_eq!(packed[0].user_label, "userb");
        assert!(packed[2].shares_rank);
        assert!(!packed[1].shares_rank);
    }

    #[test]
    fn unrated_entries_do_not_use_up_a_rank() {
        let packed = pack_rank_data(&[
            entry("a", 5),
            entry("b", 4).unrated(true),
            entry("c", 3),
        ]);
        assert_eq!(ranks(&packed), vec![1, 1, 2]);
        assert_eq!(packed[1].rank_label, UNRATED_LABEL);
        assert_eq!(packed[2].rank_label, "2");

        let leading = pack_rank_data(&[entry("x", 9).unrated(true), entry("y", 2)]);
        assert_eq!(leading[1].rank, 1);
    }

    #[test]
    fn slice_never_splits_a_tie() {
        let packed = pack_rank_data(&[entry("a", 5), entry("b", 4), entry("c", 4), entry("d", 3)]);
        let sliced = slice_ranking_data(&packed, 2, true);
        assert_eq!(sliced.len(), 3);
        assert_eq!(sliced[1].value, sliced[2].value);
    }

    #[test]
    fn slice_trims_trailing_unrated_rows() {
        let packed = pack_rank_data(&[
            entry("a", 5),
            entry("b", 4).unrated(true),
            entry("c", 3),
        ]);
        let sliced = slice_ranking_data(&packed, 1, true);
        assert_eq!(sliced.len(), 1);
        assert_eq!(sliced[0].user_label, "usera");

        let all = slice_ranking_data(&packed, 10, true);
        assert_eq!(all.len(), 3);
        let rated_only = slice_ranking_data(&packed, 10, false);
        assert_eq!(rated_only.len(), 2);
        assert!(rated_only.iter().all(|r| !r.unrated));
    }

    #[test]
    fn slice_of_only_unrated_rows_is_empty() {
        let packed = pack_rank_data(&[entry("a", 1).unrated(true)]);
        assert!(slice_ranking_data(&packed, 5, true).is_empty());
        assert!(slice_ranking_data(&[], 5, true).is_empty());
    }

    #[test]
    fn progress_is_monotonic_and_bounded() {
        let packed = pack_rank_data(&[
            entry("a", 1),
            entry("b", 9),
            entry("c", 4),
            entry("d", 4),
            entry("e", 0),
        ]);
        for pair in packed.windows(2) {
            assert!(pair[0].progress >= pair[1].progress);
        }
        assert!(packed.iter().all(|r| (0.0..=1.0).contains(&r.progress)));
        assert_eq!(packed[0].progress, 1.0);

        let flat = pack_rank_data(&[entry("a", 2), entry("b", 2)]);
        assert!(flat.iter().all(|r| r.progress == 1.0));
    }

    #[test]
    fn progress_is_relative_to_the_sliced_rows() {
        let packed = pack_rank_data(&[entry("a", 10), entry("b", 6), entry("c", 1)]);
        let sliced = slice_ranking_data(&packed, 2, true);
        assert_eq!(sliced[1].progress, 1.0 / 5.0);
    }

    #[test]
    fn verdict_board_compresses_equal_counts() {
        let tally = |uid: &str, count: usize| VerdictTally {
            uid: uid.to_string(),
            user_name: format!("user{uid}"),
            earliest_at: 0,
            count,
        };
        let packed = pack_verdict_rank_data(&[tally("a", 7), tally("b", 7), tally("c", 2)]);
        assert_eq!(ranks(&packed), vec![1, 1, 3]);
        assert!(has_parallel_top(&packed));
        assert!(!has_parallel_top(&packed[1..]));
        assert!(pack_verdict_rank_data(&[]).is_empty());
    }

    #[test]
    fn long_names_are_ellipsized() {
        let packed = pack_rank_data(&[RankingEntry::new("x".repeat(40), "1", 1)]);
        assert_eq!(packed[0].user_label.chars().count(), 12 + 3 + 12);
    }
}
