//! Rendered page cache keyed by site path.
//!
//! Entries expire lazily after the revalidate interval and can be dropped
//! early through `PageInvalidator`.

use std::{
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use lru::LruCache;

/// Marks a cached page stale. Fire-and-forget: callers do not wait for the
/// page to be regenerated.
pub trait PageInvalidator: Send + Sync {
    fn invalidate(&self, path: &str);
}

/// Strips a trailing `/` so `/tr/projects/` and `/tr/projects` share an entry.
pub fn normalize_path(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[derive(Debug, Clone)]
struct CachedPage {
    body: String,
    expires_at: Instant,
}

/// Invalidation count observed when a render started. A page rendered
/// before a later invalidation is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

#[derive(Debug)]
struct Store {
    pages: LruCache<String, CachedPage>,
    generation: u64,
}

#[derive(Debug)]
pub struct PageCache {
    store: Mutex<Store>,
    ttl: Duration,
}

impl PageCache {
    pub fn new(max_entries: NonZeroUsize, ttl: Duration) -> Self {
        PageCache {
            store: Mutex::new(Store {
                pages: LruCache::new(max_entries),
                generation: 0,
            }),
            ttl,
        }
    }

    fn store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fresh body for `path`, if any. Expired entries are dropped on access.
    pub fn get(&self, path: &str) -> Option<String> {
        let path = normalize_path(path);
        let mut store = self.store();
        match store.pages.get(path) {
            Some(page) if Instant::now() < page.expires_at => return Some(page.body.clone()),
            Some(_) => {}
            None => return None,
        }
        store.pages.pop(path);
        None
    }

    /// Take before rendering and hand back to `put`.
    pub fn generation(&self) -> Generation {
        Generation(self.store().generation)
    }

    /// Stores `body` unless an invalidation happened since `rendered_at`.
    pub fn put(&self, path: &str, body: String, rendered_at: Generation) -> bool {
        let path = normalize_path(path);
        let mut store = self.store();
        if store.generation != rendered_at.0 {
            tracing::debug!(path, "Discarding page rendered before an invalidation");
            return false;
        }
        let page = CachedPage {
            body,
            expires_at: Instant::now() + self.ttl,
        };
        store.pages.put(path.to_string(), page);
        true
    }

    #[cfg(test)]
    pub fn contains(&self, path: &str) -> bool {
        self.store().pages.contains(normalize_path(path))
    }

    pub fn len(&self) -> usize {
        self.store().pages.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.store().pages.is_empty()
    }
}

impl PageInvalidator for PageCache {
    fn invalidate(&self, path: &str) {
        let path = normalize_path(path);
        let mut store = self.store();
        store.generation = store.generation.wrapping_add(1);
        let removed = store.pages.pop(path).is_some();
        tracing::debug!(path, removed, "Invalidated page");
    }
}
