//! Best-effort on-disk cache for raw fetch payloads.
//!
//! The cache stores the raw response body keyed by the request it
//! answered, under a human-readable sanitized filename. Entries expire
//! by file modification time. Failed fetches are never cached, and a
//! cache that cannot be read or written degrades silently to a live
//! fetch: no cache problem may fail a run.

use crate::config::CacheOptions;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// An on-disk payload cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct FetchCache {
    dir: PathBuf,
    max_age: Duration,
}

impl FetchCache {
    /// Creates a cache from the configured directory and entry age.
    #[must_use]
    pub fn new(options: &CacheOptions) -> Self {
        Self {
            dir: options.dir.clone(),
            max_age: options.max_age,
        }
    }

    /// Creates a cache rooted at `dir` with the given entry lifetime.
    #[must_use]
    pub fn with_dir(dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            dir: dir.into(),
            max_age,
        }
    }

    /// Looks up a fresh cached payload for `key`.
    ///
    /// Returns `None` for a missing, expired, or unreadable entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        if !self.is_fresh(&path) {
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(payload) => {
                tracing::debug!(key, path = %path.display(), "cache hit");
                Some(payload)
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to read cache entry");
                None
            }
        }
    }

    /// Stores a payload for `key`, replacing any previous entry.
    ///
    /// Write failures are logged and swallowed.
    pub fn put(&self, key: &str, payload: &str) {
        if let Err(err) = fs::create_dir_all(&self.dir) {
            tracing::warn!(dir = %self.dir.display(), error = %err, "failed to create cache directory");
            return;
        }
        let path = self.entry_path(key);
        if let Err(err) = fs::write(&path, payload) {
            tracing::warn!(path = %path.display(), error = %err, "failed to write cache entry");
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", sanitize(key)))
    }

    fn is_fresh(&self, path: &Path) -> bool {
        let Ok(metadata) = fs::metadata(path) else {
            return false;
        };
        let Ok(modified) = metadata.modified() else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.max_age,
            // A file modified in the future is treated as fresh.
            Err(_) => true,
        }
    }
}

/// Maps a cache key to a filesystem-safe name. Distinct keys may
/// collide after sanitization; keys are URLs in practice, where the
/// surviving characters keep them apart.
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cache(dir: &Path, max_age: Duration) -> FetchCache {
        FetchCache::with_dir(dir, max_age)
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), Duration::from_secs(60));

        cache.put("https://example.org/api/v1/repos", "payload");
        assert_eq!(
            cache.get("https://example.org/api/v1/repos"),
            Some("payload".to_string())
        );
    }

    #[test]
    fn test_missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), Duration::from_secs(60));

        assert_eq!(cache.get("https://example.org/never-stored"), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), Duration::ZERO);

        cache.put("https://example.org/api", "payload");
        assert_eq!(cache.get("https://example.org/api"), None);
    }

    #[test]
    fn test_keys_map_to_readable_filenames() {
        assert_eq!(
            sanitize("https://example.org/api/v1/repos?state=all"),
            "https___example.org_api_v1_repos_state_all"
        );
    }

    #[test]
    fn test_distinct_keys_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), Duration::from_secs(60));

        cache.put("https://example.org/a", "first");
        cache.put("https://example.org/b", "second");
        assert_eq!(cache.get("https://example.org/a"), Some("first".to_string()));
        assert_eq!(cache.get("https://example.org/b"), Some("second".to_string()));
    }

    #[test]
    fn test_put_replaces_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), Duration::from_secs(60));

        cache.put("key", "old");
        cache.put("key", "new");
        assert_eq!(cache.get("key"), Some("new".to_string()));
    }

    #[test]
    fn test_unwritable_directory_is_swallowed() {
        let cache = FetchCache::with_dir("/proc/nonexistent/cache", Duration::from_secs(60));
        cache.put("key", "payload");
        assert_eq!(cache.get("key"), None);
    }
}
