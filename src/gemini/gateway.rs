use std::sync::Arc;

use tracing::{debug, instrument};

use super::cache::ResponseCache;
use super::dto::{GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use super::queue::{QueueError, RequestQueue};
use super::retry::RetryPolicy;
use crate::config::GeminiConfig;

/// A completion plus whether it was replayed from the cache.
#[derive(Debug, Clone)]
pub struct Completion {
    pub response: GenerateContentResponse,
    pub cached: bool,
}

/// Cache → outer retry → queue, in that order.
pub struct Completions {
    queue: RequestQueue,
    cache: Arc<ResponseCache>,
    retry: RetryPolicy,
    config: GeminiConfig,
}

impl Completions {
    pub fn new(
        queue: RequestQueue,
        cache: Arc<ResponseCache>,
        retry: RetryPolicy,
        config: GeminiConfig,
    ) -> Self {
        Self {
            queue,
            cache,
            retry,
            config,
        }
    }

    /// Low temperature, large output budget: a multi-day plan is long.
    pub fn plan_request(&self, prompt: String) -> GenerateContentRequest {
        GenerateContentRequest::from_prompt(
            prompt,
            GenerationConfig {
                temperature: 0.2,
                top_k: 40,
                top_p: 0.8,
                max_output_tokens: 8192,
            },
        )
    }

    pub fn recipe_request(&self, prompt: String) -> GenerateContentRequest {
        GenerateContentRequest::from_prompt(
            prompt,
            GenerationConfig {
                temperature: self.config.temperature,
                top_k: self.config.top_k,
                top_p: self.config.top_p,
                max_output_tokens: self.config.max_output_tokens,
            },
        )
    }

    /// Cached reply if there is one, otherwise a fresh one through the retry
    /// loop and the queue. A fresh reply is cached only when `accept` approves it
    /// and the model did not stop at its token limit, so a cut-off or unusable
    /// answer is asked for again next time.
    #[instrument(skip_all, fields(model = %self.config.model))]
    pub async fn complete<F>(
        &self,
        request: GenerateContentRequest,
        accept: F,
    ) -> Result<Completion, QueueError>
    where
        F: Fn(&GenerateContentResponse) -> bool,
    {
        let key = ResponseCache::key(&self.config.model, &request.prompt_text());
        if let Some(response) = self.cache.get(&key) {
            debug!("using cached completion");
            return Ok(Completion {
                response,
                cached: true,
            });
        }

        let response = self
            .retry
            .run(|| self.queue.submit(request.clone()))
            .await?;

        if response.finish_reason() == Some("MAX_TOKENS") || !accept(&response) {
            debug!(finish_reason = ?response.finish_reason(), "completion not cached");
        } else {
            self.cache.insert(key, response.clone());
        }
        Ok(Completion {
            response,
            cached: false,
        })
    }
}
