use crate::error::BoardError;
use crate::raster::decode_image_source;
use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tiny_skia::Pixmap;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30 * 60);

/// Keyed values that expire a fixed interval after they were loaded. Readers share the
/// lock; a miss or an expired entry reloads transparently.
#[derive(Debug)]
pub(crate) struct TimedCache<K, V> {
    entries: RwLock<HashMap<K, (Instant, V)>>,
    ttl: Duration,
    hits: AtomicU64,
    loads: AtomicU64,
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            hits: AtomicU64::new(0),
            loads: AtomicU64::new(0),
        }
    }

    pub(crate) fn get_or_load<F>(&self, key: &K, load: F) -> Result<V, BoardError>
    where
        F: FnOnce() -> Result<V, BoardError>,
    {
        self.get_or_load_at(key, Instant::now(), load)
    }

    pub(crate) fn get_or_load_at<F>(&self, key: &K, now: Instant, load: F) -> Result<V, BoardError>
    where
        F: FnOnce() -> Result<V, BoardError>,
    {
        if let Ok(entries) = self.entries.read() {
            if let Some((loaded_at, value)) = entries.get(key) {
                if now.saturating_duration_since(*loaded_at) <= self.ttl {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value.clone());
                }
            }
        }
        let value = load()?;
        self.loads.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.clone(), (now, value.clone()));
        }
        Ok(value)
    }

    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub(crate) fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

/// Decoded images and raw font programs shared by every report rendered from one board.
#[derive(Debug)]
pub struct ResourceCache {
    images: TimedCache<String, Arc<Pixmap>>,
    fonts: TimedCache<PathBuf, Arc<Vec<u8>>>,
}

impl ResourceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            images: TimedCache::new(ttl),
            fonts: TimedCache::new(ttl),
        }
    }

    /// `source` is a file path or a `data:` URI.
    pub fn image(&self, source: &str) -> Result<Arc<Pixmap>, BoardError> {
        self.images.get_or_load(&source.to_string(), || {
            if !source.starts_with("data:") && !Path::new(source).is_file() {
                return Err(BoardError::Asset(format!(
                    "image resource not found: {source}"
                )));
            }
            decode_image_source(source).map(Arc::new)
        })
    }

    pub fn font_bytes(&self, path: &Path) -> Result<Arc<Vec<u8>>, BoardError> {
        self.fonts.get_or_load(&path.to_path_buf(), || {
            std::fs::read(path).map(Arc::new).map_err(|err| {
                BoardError::Asset(format!("font resource {}: {}", path.display(), err))
            })
        })
    }

    /// (hits, loads) across both resource kinds.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.images.hits() + self.fonts.hits(),
            self.images.loads() + self.fonts.loads(),
        )
    }
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
