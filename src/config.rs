use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

/// Connection and sampling settings for the generative completion API.
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    pub min_spacing_ms: u64,
    pub rate_limit_retries: u32,
    pub backoff_base_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Postgres document store; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub gemini: GeminiConfig,
    pub queue: QueueConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok();
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "dietplanner".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "dietplanner-users".into()),
        };
        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY")?,
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".into()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            temperature: env_or("GEMINI_TEMPERATURE", 0.2),
            top_k: env_or("GEMINI_TOP_K", 40),
            top_p: env_or("GEMINI_TOP_P", 0.8),
            max_output_tokens: env_or("GEMINI_MAX_OUTPUT_TOKENS", 1024),
        };
        let queue = QueueConfig {
            min_spacing_ms: env_or("QUEUE_MIN_SPACING_MS", 2000),
            rate_limit_retries: env_or("QUEUE_RATE_LIMIT_RETRIES", 3),
            backoff_base_ms: env_or("QUEUE_BACKOFF_BASE_MS", 1000),
        };
        let retry = RetryConfig {
            max_attempts: env_or("RETRY_MAX_ATTEMPTS", 3),
            initial_delay_ms: env_or("RETRY_INITIAL_DELAY_MS", 2000),
            max_delay_ms: env_or("RETRY_MAX_DELAY_MS", 30_000),
            jitter_ms: env_or("RETRY_JITTER_MS", 1000),
        };
        let cache = CacheConfig {
            ttl_secs: env_or("CACHE_TTL_SECS", 24 * 60 * 60),
            capacity: env_or("CACHE_CAPACITY", 128),
        };
        Ok(Self {
            database_url,
            jwt,
            gemini,
            queue,
            retry,
            cache,
        })
    }
}

impl QueueConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
