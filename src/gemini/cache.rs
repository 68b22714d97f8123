use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

use super::dto::GenerateContentResponse;
use crate::config::CacheConfig;

/// Bounded, TTL-limited cache of completion responses keyed by model and prompt.
/// Least recently used entries go first once capacity is reached.
pub struct ResponseCache {
    ttl: Duration,
    // None when capacity is zero: nothing is stored
    entries: Option<Mutex<LruCache<String, Entry>>>,
}

struct Entry {
    response: GenerateContentResponse,
    stored_at: Instant,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            entries: NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c))),
        }
    }

    pub fn from_config(cfg: &CacheConfig) -> Self {
        Self::new(cfg.ttl(), cfg.capacity)
    }

    pub fn key(model: &str, prompt: &str) -> String {
        format!("{model}:{prompt}")
    }

    pub fn get(&self, key: &str) -> Option<GenerateContentResponse> {
        let mut cache = self.entries.as_ref()?.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match cache.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        None
    }

    pub fn insert(&self, key: String, response: GenerateContentResponse) {
        let Some(entries) = &self.entries else {
            return;
        };
        let mut cache = entries.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(
            key,
            Entry {
                response,
                stored_at: Instant::now(),
            },
        );
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |m| m.lock().unwrap_or_else(|e| e.into_inner()).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resp(text: &str) -> GenerateContentResponse {
        GenerateContentResponse::from_text(text)
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResponseCache::new(Duration::from_secs(60), 8);
        cache.insert("k".into(), resp("v"));
        assert_eq!(cache.get("k").unwrap().text(), Some("v"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("k").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("k").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted_at_capacity() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.insert("a".into(), resp("1"));
        cache.insert("b".into(), resp("2"));
        cache.insert("c".into(), resp("3"));

        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b").unwrap().text(), Some("2"));
        assert_eq!(cache.get("c").unwrap().text(), Some("3"));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn reinserting_refreshes_position() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.insert("a".into(), resp("1"));
        cache.insert("b".into(), resp("2"));
        cache.insert("a".into(), resp("1b"));
        cache.insert("c".into(), resp("3"));

        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a").unwrap().text(), Some("1b"));
    }

    #[tokio::test]
    async fn reading_an_entry_protects_it_from_eviction() {
        let cache = ResponseCache::new(Duration::from_secs(60), 2);
        cache.insert("a".into(), resp("1"));
        cache.insert("b".into(), resp("2"));
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), resp("3"));

        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test]
    async fn zero_capacity_stores_nothing() {
        let cache = ResponseCache::new(Duration::from_secs(60), 0);
        cache.insert("a".into(), resp("1"));
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn key_includes_model_and_full_prompt() {
        assert_ne!(
            ResponseCache::key("m", "same prefix, different tail A"),
            ResponseCache::key("m", "same prefix, different tail B")
        );
        assert_ne!(ResponseCache::key("m1", "p"), ResponseCache::key("m2", "p"));
    }
}
