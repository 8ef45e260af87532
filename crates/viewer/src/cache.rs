use std::collections::{HashMap, HashSet};
use std::fmt;

use fetch::{Bitmap, FetchHandle, FetchRequest, FetchResponse};
use sequence::{ResourceId, ViewName};

use crate::persist::PersistedFrameSet;

/// What the presentation layer draws for a loaded resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageHandle {
    Bitmap(Bitmap),
    /// Fetched but not decodable here; render the path directly.
    Raw { path: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Pending,
    Loaded(ImageHandle),
    Error(String),
}

impl CacheEntry {
    pub fn is_settled(&self) -> bool { !matches!(self, CacheEntry::Pending) }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Loaded,
    /// Bytes arrived, decode did not. Counts as success.
    Fallback,
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool { !matches!(self, Outcome::Failed(_)) }
}

/// A worker reply reconciled against the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub id: ResourceId,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.hits + self.misses;
        if total == 0 {
            return f.write_str("no requests");
        }
        let rate = self.hits as f64 / total as f64 * 100.0;
        write!(f, "{:.1}% hit rate ({}/{} requests)", rate, self.hits, total)
    }
}

/// Per-view map from resource to fetch state.
///
/// Owned by the interactive thread. The worker never sees it: requests go out
/// through the [`FetchHandle`] and replies come back through [`AssetCache::apply`],
/// matched by id alone. Entries are never evicted during a session; the live
/// set is bounded by two tiers per frame.
pub struct AssetCache {
    view: ViewName,
    entries: HashMap<ResourceId, CacheEntry>,
    /// Known-good paths from a previous session, not fetched yet.
    candidates: HashSet<String>,
    /// Recency tick per path, used to pick what gets persisted.
    touched: HashMap<String, u64>,
    clock: u64,
    fetcher: FetchHandle,
    stats: CacheStats,
}

impl AssetCache {
    pub fn new(view: ViewName, fetcher: FetchHandle) -> Self {
        Self {
            view,
            entries: HashMap::new(),
            candidates: HashSet::new(),
            touched: HashMap::new(),
            clock: 0,
            fetcher,
            stats: CacheStats::default(),
        }
    }

    pub fn view(&self) -> &ViewName { &self.view }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn stats(&self) -> CacheStats { self.stats }

    pub fn has(&self, id: &ResourceId) -> bool { self.entries.contains_key(id) }

    /// Present in the cache or remembered from a previous session.
    pub fn is_known(&self, id: &ResourceId) -> bool {
        self.has(id) || self.candidates.contains(id.path())
    }

    /// Lookup that counts as a use for recency.
    pub fn get(&mut self, id: &ResourceId) -> Option<&CacheEntry> {
        if self.entries.contains_key(id) {
            self.touch(id.path());
        }
        self.entries.get(id)
    }

    /// Lookup without touching recency.
    pub fn peek(&self, id: &ResourceId) -> Option<&CacheEntry> { self.entries.get(id) }

    pub fn put(&mut self, id: ResourceId, entry: CacheEntry) {
        self.touch(id.path());
        self.entries.insert(id, entry);
    }

    pub fn remove(&mut self, id: &ResourceId) -> Option<CacheEntry> {
        self.touched.remove(id.path());
        self.candidates.remove(id.path());
        self.entries.remove(id)
    }

    /// Requests `id` unless it is already pending or settled. Returns whether
    /// a fetch was issued.
    pub fn warm(&mut self, id: &ResourceId) -> bool {
        self.touch(id.path());
        if self.entries.contains_key(id) {
            self.stats.hits += 1;
            return false;
        }
        self.stats.misses += 1;
        self.request(FetchRequest::new(id.clone()))
    }

    /// Re-requests `id` through a cache-busting path, replacing any entry.
    pub fn warm_busted(&mut self, id: &ResourceId, nonce: impl fmt::Display) -> bool {
        self.touch(id.path());
        self.request(FetchRequest::cache_busted(id.clone(), nonce))
    }

    fn request(&mut self, request: FetchRequest) -> bool {
        let id = request.id.clone();
        tracing::debug!(path = %request.path, "fetch requested");
        match self.fetcher.submit(request) {
            Ok(()) => {
                self.entries.insert(id, CacheEntry::Pending);
                true
            }
            Err(err) => {
                tracing::warn!(%id, error = %err, "could not submit fetch");
                self.entries.insert(id, CacheEntry::Error(err.to_string()));
                false
            }
        }
    }

    /// Records a worker reply. Replies for another view are dropped; replies
    /// whose entry was removed are still recorded for later reuse.
    pub fn apply(&mut self, reply: FetchResponse) -> Option<Resolution> {
        if reply.id().view() != &self.view {
            tracing::debug!(path = reply.path(), view = %self.view, "dropping reply for inactive view");
            return None;
        }
        let (id, entry, outcome) = match reply {
            FetchResponse::Decoded { id, bitmap, .. } => {
                (id, CacheEntry::Loaded(ImageHandle::Bitmap(bitmap)), Outcome::Loaded)
            }
            FetchResponse::Fetched { id, path } => {
                (id, CacheEntry::Loaded(ImageHandle::Raw { path }), Outcome::Fallback)
            }
            FetchResponse::Failed { id, error, .. } => {
                (id, CacheEntry::Error(error.clone()), Outcome::Failed(error))
            }
        };
        if !self.touched.contains_key(id.path()) {
            self.touch(id.path());
        }
        if matches!(outcome, Outcome::Failed(_)) {
            // No longer known good; keep it out of the next snapshot.
            self.candidates.remove(id.path());
        }
        self.entries.insert(id.clone(), entry);
        Some(Resolution { id, outcome })
    }

    /// Marks previously seen paths as known without fetching them. The first
    /// path is treated as the most recent.
    pub fn load_snapshot(&mut self, snapshot: &PersistedFrameSet) {
        for path in snapshot.paths().iter().rev() {
            self.candidates.insert(path.clone());
            self.touch(path);
        }
    }

    /// Up to `cap` known-good paths, most recently touched first. Ties are
    /// broken by path so repeated calls agree.
    pub fn persist_snapshot(&self, cap: usize) -> PersistedFrameSet {
        let loaded: HashSet<&str> = self
            .entries
            .iter()
            .filter(|(_, entry)| matches!(entry, CacheEntry::Loaded(_)))
            .map(|(id, _)| id.path())
            .collect();
        let mut known: Vec<(&String, u64)> = self
            .touched
            .iter()
            .filter(|(path, _)| loaded.contains(path.as_str()) || self.candidates.contains(*path))
            .map(|(path, tick)| (path, *tick))
            .collect();
        known.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        PersistedFrameSet::new(known.into_iter().take(cap).map(|(path, _)| path.clone()).collect())
    }

    fn touch(&mut self, path: &str) {
        self.clock += 1;
        self.touched.insert(path.to_string(), self.clock);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use fetch::{AssetSource, FetchError, FetchWorker};
    use parking_lot::Mutex;
    use sequence::{normalize, Tier, ViewCatalog};

    use super::*;

    #[derive(Default)]
    struct CountingSource {
        seen: Mutex<Vec<String>>,
    }

    impl AssetSource for CountingSource {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, FetchError> {
            self.seen.lock().push(path.to_string());
            if path.contains("0013") {
                return Err(FetchError::Status { status: 500, reason: "Internal Server Error".into() });
            }
            Ok(b"webp bytes the test cannot decode".to_vec())
        }
    }

    fn id(view: &str, frame: i64) -> ResourceId {
        ViewCatalog::default().resolve(&view.into(), normalize(frame, 140), Tier::High).unwrap()
    }

    fn setup() -> (FetchWorker, Arc<CountingSource>, AssetCache) {
        let source = Arc::new(CountingSource::default());
        let worker = FetchWorker::start(2, source.clone());
        let cache = AssetCache::new("villas".into(), worker.handle());
        (worker, source, cache)
    }

    fn settle(worker: &FetchWorker, cache: &mut AssetCache, n: usize) -> Vec<Resolution> {
        (0..n)
            .filter_map(|_| worker.recv_timeout(Duration::from_secs(5)))
            .filter_map(|reply| cache.apply(reply))
            .collect()
    }

    #[test]
    fn warm_deduplicates_in_flight_requests() {
        let (worker, source, mut cache) = setup();
        let target = id("villas", 4);
        let issued = (0..10).filter(|_| cache.warm(&target)).count();
        assert_eq!(issued, 1);
        assert_eq!(cache.peek(&target), Some(&CacheEntry::Pending));

        settle(&worker, &mut cache, 1);
        assert!(!cache.warm(&target));
        assert_eq!(source.seen.lock().len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 10, misses: 1 });
    }

    #[test]
    fn undecodable_bytes_are_a_soft_success() {
        let (worker, _source, mut cache) = setup();
        let target = id("villas", 2);
        cache.warm(&target);
        let resolved = settle(&worker, &mut cache, 1);
        assert_eq!(resolved[0].outcome, Outcome::Fallback);
        assert!(matches!(cache.peek(&target), Some(CacheEntry::Loaded(ImageHandle::Raw { path })) if path == target.path()));
    }

    #[test]
    fn replies_reconcile_by_id_in_any_order() {
        let (worker, _source, mut cache) = setup();
        for frame in [11, 12, 13] {
            cache.warm(&id("villas", frame));
        }
        let mut resolved = settle(&worker, &mut cache, 3);
        resolved.sort_by_key(|r| r.id.frame());
        assert!(resolved[0].outcome.is_success());
        assert!(resolved[1].outcome.is_success());
        assert!(matches!(resolved[2].outcome, Outcome::Failed(ref e) if e.contains("500")));
        assert!(matches!(cache.peek(&id("villas", 13)), Some(CacheEntry::Error(_))));
    }

    #[test]
    fn removed_entry_is_repopulated_by_late_reply() {
        let (worker, _source, mut cache) = setup();
        let target = id("villas", 9);
        cache.warm(&target);
        cache.remove(&target);
        assert!(!cache.has(&target));
        settle(&worker, &mut cache, 1);
        assert!(matches!(cache.peek(&target), Some(CacheEntry::Loaded(_))));
    }

    #[test]
    fn replies_for_other_views_are_dropped() {
        let (_worker, _source, mut cache) = setup();
        let other = id("aerienne", 1);
        let reply = FetchResponse::Fetched { path: other.path().to_string(), id: other.clone() };
        assert!(cache.apply(reply).is_none());
        assert!(!cache.has(&other));
    }

    #[test]
    fn snapshot_is_capped_recent_first_and_deterministic() {
        let (_worker, _source, mut cache) = setup();
        for frame in 1..=60 {
            let target = id("villas", frame);
            cache.put(target.clone(), CacheEntry::Loaded(ImageHandle::Raw { path: target.path().into() }));
        }
        cache.put(id("villas", 61), CacheEntry::Pending);
        cache.get(&id("villas", 3));

        let snapshot = cache.persist_snapshot(50);
        assert_eq!(snapshot.paths().len(), 50);
        assert_eq!(snapshot.paths()[0], id("villas", 3).path());
        assert_eq!(snapshot.paths()[1], id("villas", 60).path());
        assert!(!snapshot.paths().iter().any(|p| p == id("villas", 61).path()));
        assert_eq!(snapshot, cache.persist_snapshot(50));
    }

    #[test]
    fn candidate_that_fails_again_is_not_persisted() {
        let (worker, _source, mut cache) = setup();
        let broken = id("villas", 13);
        let fine = id("villas", 14);
        cache.load_snapshot(&PersistedFrameSet::new(vec![broken.path().into(), fine.path().into()]));
        cache.warm(&broken);
        let resolved = settle(&worker, &mut cache, 1);
        assert!(!resolved[0].outcome.is_success());

        let snapshot = cache.persist_snapshot(50);
        assert!(!snapshot.paths().iter().any(|p| p == broken.path()));
        assert_eq!(snapshot.paths(), &[fine.path().to_string()]);
    }

    #[test]
    fn loaded_snapshot_is_known_but_not_fetched() {
        let (_worker, source, mut cache) = setup();
        let a = id("villas", 20);
        let b = id("villas", 21);
        cache.load_snapshot(&PersistedFrameSet::new(vec![a.path().into(), b.path().into()]));
        assert!(cache.is_known(&a));
        assert!(!cache.has(&a));
        assert!(source.seen.lock().is_empty());
        assert_eq!(cache.persist_snapshot(50).paths(), &[a.path().to_string(), b.path().to_string()]);
    }
}
