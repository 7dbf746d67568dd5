use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value, json};

/// JSONL timing log. One line per span or count group; totals are written to a sibling
/// `*_hot.log` when the last handle is dropped.
#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, (f64, u64)>,
    count_totals: HashMap<String, u64>,
}

impl PerfLogger {
    pub(crate) fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                count_totals: HashMap::new(),
            })),
        })
    }

    pub(crate) fn log_span_ms(&self, name: &str, report: Option<&str>, ms: f64) {
        let line = json!({
            "type": "perf.span",
            "name": name,
            "report": report,
            "unit": "ms",
            "ms": (ms * 1000.0).round() / 1000.0,
        });
        if let Ok(mut state) = self.inner.lock() {
            let total = state.span_totals.entry(name.to_string()).or_insert((0.0, 0));
            total.0 += ms;
            total.1 = total.1.saturating_add(1);
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub(crate) fn log_counts(&self, name: &str, report: Option<&str>, counts: &[(&str, u64)]) {
        let values: Map<String, Value> = counts
            .iter()
            .map(|(key, value)| (key.to_string(), Value::from(*value)))
            .collect();
        let line = json!({
            "type": "perf.counts",
            "name": name,
            "report": report,
            "counts": values,
        });
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let entry = state.count_totals.entry(format!("{name}.{key}")).or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub(crate) fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Ok(file) = File::create(hot_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &(f64, u64))> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| b.1.0.total_cmp(&a.1.0));
        for (rank, (name, (ms, count))) in spans.into_iter().enumerate() {
            let avg = if *count == 0 { 0.0 } else { ms / *count as f64 };
            let line = json!({
                "type": "perf.hot.span",
                "rank": rank + 1,
                "name": name,
                "ms": ms,
                "count": count,
                "avg_ms": avg,
            });
            let _ = writeln!(writer, "{line}");
        }

        let mut counts: Vec<(&String, &u64)> = self.count_totals.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, value)) in counts.into_iter().enumerate() {
            let line = json!({
                "type": "perf.hot.count",
                "rank": rank + 1,
                "name": name,
                "value": value,
            });
            let _ = writeln!(writer, "{line}");
        }
        let _ = writer.flush();
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("peeper_perf");
    path.with_file_name(format!("{stem}_hot.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn spans_and_counts_are_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf.log");
        {
            let perf = PerfLogger::new(&path).unwrap();
            perf.log_span_ms("render.layout", Some("full"), 1.5);
            perf.log_span_ms("render.layout", Some("now"), 2.5);
            perf.log_counts("render", None, &[("commands", 40), ("glyphs", 7)]);
            perf.flush();

            let logged = lines(&path);
            assert_eq!(logged.len(), 3);
            assert_eq!(logged[0]["type"], "perf.span");
            assert_eq!(logged[0]["report"], "full");
            assert_eq!(logged[2]["counts"]["glyphs"], 7);
            assert!(logged[2]["report"].is_null());
        }

        let hot = lines(&dir.path().join("perf_hot.log"));
        assert_eq!(hot[0]["type"], "perf.hot.span");
        assert_eq!(hot[0]["count"], 2);
        assert_eq!(hot[0]["avg_ms"], 2.0);
        assert_eq!(hot[1]["name"], "render.commands");
        assert_eq!(hot[1]["value"], 40);
    }
}
