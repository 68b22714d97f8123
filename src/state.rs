use std::sync::Arc;

use crate::config::AppConfig;
use crate::gemini::cache::ResponseCache;
use crate::gemini::{CompletionClient, Completions, GeminiClient, QueuePolicy, RequestQueue, RetryPolicy};
use crate::store::{DocumentStore, MemoryDocumentStore, PgDocumentStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub completions: Arc<Completions>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn DocumentStore> = match &config.database_url {
            Some(url) => Arc::new(PgDocumentStore::connect(url).await?),
            None => {
                tracing::warn!("DATABASE_URL not set; using in-memory document store");
                Arc::new(MemoryDocumentStore::new())
            }
        };

        let client = Arc::new(GeminiClient::new(&config.gemini)?) as Arc<dyn CompletionClient>;
        Ok(Self::from_parts(config, store, client))
    }

    /// Must be called inside a tokio runtime: the queue worker is spawned here.
    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<dyn DocumentStore>,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        let queue = RequestQueue::spawn(client, QueuePolicy::from(&config.queue));
        let completions = Completions::new(
            queue,
            Arc::new(ResponseCache::from_config(&config.cache)),
            RetryPolicy::from(&config.retry),
            config.gemini.clone(),
        );
        Self {
            config,
            store,
            completions: Arc::new(completions),
        }
    }

    /// In-memory store, no pacing and no retry delays.
    #[cfg(test)]
    pub fn fake_with(client: Arc<dyn CompletionClient>) -> Self {
        use crate::config::{CacheConfig, GeminiConfig, JwtConfig, QueueConfig, RetryConfig};

        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test".into(),
                audience: "test".into(),
            },
            gemini: GeminiConfig {
                api_key: "fake".into(),
                model: "gemini-test".into(),
                base_url: "http://localhost".into(),
                temperature: 0.2,
                top_k: 40,
                top_p: 0.8,
                max_output_tokens: 1024,
            },
            queue: QueueConfig {
                min_spacing_ms: 0,
                rate_limit_retries: 3,
                backoff_base_ms: 0,
            },
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 0,
                max_delay_ms: 0,
                jitter_ms: 0,
            },
            cache: CacheConfig {
                ttl_secs: 60,
                capacity: 16,
            },
        });
        Self::from_parts(config, Arc::new(MemoryDocumentStore::new()), client)
    }
}
