mod record;
mod store;
mod verdict;

pub use record::{DailyReport, RankingEntry, Submission, User};
pub use store::{SnapshotError, SnapshotStore, StoredSnapshot};
pub use verdict::{UnknownVerdict, Verdict};

use sha2::{Digest, Sha256};

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// SHA-256 over the canonical (compact) JSON encoding of a report.
pub fn report_fingerprint_sha256(report: &DailyReport) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(report)?;
    Ok(hex_sha256(&bytes))
}

/// SHA-256 of arbitrary text, used for deterministic per-report choices.
pub fn text_sha256(text: &str) -> String {
    hex_sha256(text.as_bytes())
}
