//! A small full-page cache. Rendered pages are kept for a fixed time and served as-is, even if
//! the data behind them changes in the meantime.
use crate::metrics;
use crate::twoface::Fallible;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Key prefix for the index listing.
pub const INDEX_PAGE_PREFIX: &str = "index_page";

#[derive(Debug)]
struct Entry {
    body: String,
    expires_at: Instant,
}

/// Shared between all workers; clones point at the same pages.
#[derive(Clone, Debug)]
pub struct PageCache {
    timeout: Duration,
    max_entries: usize,
    pages: Arc<Mutex<HashMap<String, Entry>>>,
}

impl PageCache {
    /// Once `max_entries` pages are cached, the oldest ones are dropped to make room.
    pub fn new(timeout: Duration, max_entries: usize) -> Self {
        Self {
            timeout,
            max_entries: max_entries.max(1),
            pages: Arc::default(),
        }
    }

    /// Builds a cache key. Pages greet the logged-in user, so they're cached per user.
    pub fn key(prefix: &str, path_and_query: &str, username: Option<&str>) -> String {
        format!("{}:{}:{}", prefix, username.unwrap_or("-"), path_and_query)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A panic while holding the lock can't leave a half-written entry behind.
        self.pages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The cached page, if it hasn't expired yet.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut pages = self.lock();
        if let Some(entry) = pages.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.body.clone());
            }
        }
        pages.remove(key);
        None
    }

    pub fn insert(&self, key: String, body: String) {
        let expires_at = Instant::now() + self.timeout;
        let mut pages = self.lock();
        // Drop anything stale so keys that are never requested again don't pile up.
        pages.retain(|_, entry| entry.expires_at > Instant::now());
        if !pages.contains_key(&key) {
            while pages.len() >= self.max_entries {
                let oldest = pages
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(oldest) => pages.remove(&oldest),
                    None => break,
                };
            }
        }
        pages.insert(key, Entry { body, expires_at });
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Serve the page from the cache, or render it and remember it. The lock isn't held while
    /// rendering, so two concurrent misses both render and the last one wins.
    pub async fn get_or_render<F, Fut>(&self, key: String, render: F) -> Fallible<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Fallible<String>>,
    {
        if let Some(body) = self.get(&key) {
            debug!(key = &key[..], "page cache hit");
            metrics::PAGE_CACHE.with_label_values(&["hit"]).inc();
            return Ok(body);
        }
        debug!(key = &key[..], "page cache miss");
        metrics::PAGE_CACHE.with_label_values(&["miss"]).inc();
        let body = render().await?;
        self.insert(key, body.clone());
        Ok(body)
    }
}
