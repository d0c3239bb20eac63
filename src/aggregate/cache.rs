use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ahash::AHashMap;

use crate::error::Result;
use crate::raster::{GridSignature, Window};

/// Identity of one block's cell → node assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssignmentKey {
    pub grid: GridSignature,
    pub fingerprint: String,
    /// Distance cap as raw bits, `None` when unbounded.
    pub max_distance: Option<u64>,
    pub block: Window,
}

/// Per-block assignments shared between rasters on the same grid.
///
/// Entries live until [`AssignmentCache::clear`]; the cache is scoped to one
/// aggregator, which is scoped to one job.
#[derive(Debug, Default)]
pub struct AssignmentCache {
    entries: Mutex<AHashMap<AssignmentKey, Arc<Vec<i32>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl AssignmentCache {
    pub fn new() -> Self { Self::default() }

    /// Cached assignment for `key`, computing and storing it on a miss.
    /// The lock is not held while `compute` runs.
    pub fn get_or_compute(&self, key: AssignmentKey, compute: impl FnOnce() -> Result<Vec<i32>>) -> Result<Arc<Vec<i32>>> {
        if let Some(found) = self.lock().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(found.clone())
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let computed = Arc::new(compute()?);
        Ok(self.lock().entry(key).or_insert(computed).clone())
    }

    pub fn clear(&self) { self.lock().clear() }

    #[inline] pub fn len(&self) -> usize { self.lock().len() }
    #[inline] pub fn is_empty(&self) -> bool { self.len() == 0 }
    #[inline] pub fn hits(&self) -> usize { self.hits.load(Ordering::Relaxed) }
    #[inline] pub fn misses(&self) -> usize { self.misses.load(Ordering::Relaxed) }

    fn lock(&self) -> std::sync::MutexGuard<'_, AHashMap<AssignmentKey, Arc<Vec<i32>>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
