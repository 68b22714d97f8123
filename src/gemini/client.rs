use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::dto::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse};
use super::error::GeminiError;
use crate::config::GeminiConfig;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError>;

    fn model(&self) -> &str;
}

/// `generateContent` over HTTPS.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(cfg: &GeminiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn generate(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| GeminiError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GeminiError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GeminiError::InvalidResponse(e.to_string()))?;

        if parsed.candidates.is_empty() || parsed.candidates[0].content.is_none() {
            return Err(GeminiError::InvalidResponse(
                "response has no candidate content".into(),
            ));
        }

        if parsed.finish_reason() == Some("MAX_TOKENS") {
            warn!(model = %self.model, "completion stopped at the output token limit; content may be cut off");
        }
        if let Some(usage) = &parsed.usage_metadata {
            debug!(model = %self.model, %usage, "completion usage");
        }

        Ok(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn classify_failure(status: StatusCode, body: &str) -> GeminiError {
    let parsed = serde_json::from_str::<ApiErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());
    let code = status.as_u16();

    warn!(status = code, %message, "completion API returned an error");

    match status {
        StatusCode::TOO_MANY_REQUESTS => GeminiError::RateLimited(
            parsed
                .map(|e| e.error.rate_limit_message())
                .unwrap_or_else(|| "Rate limit exceeded. Try again after 60s.".into()),
        ),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GeminiError::Auth {
            status: code,
            message,
        },
        StatusCode::BAD_REQUEST => GeminiError::Rejected {
            status: code,
            message,
        },
        _ => GeminiError::Server {
            status: code,
            message,
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::dto::GenerationConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/v1beta/models/gemini-test:generateContent";

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(&GeminiConfig {
            api_key: "test-key".into(),
            model: "gemini-test".into(),
            base_url: format!("{}/", server.uri()),
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 1024,
        })
        .unwrap()
    }

    fn sample_request() -> GenerateContentRequest {
        GenerateContentRequest::from_prompt(
            "Plan my week",
            GenerationConfig {
                temperature: 0.2,
                top_k: 40,
                top_p: 0.8,
                max_output_tokens: 8192,
            },
        )
    }

    #[tokio::test]
    async fn test_successful_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{\"mealPlans\": []}"}]}, "finishReason": "STOP"}],
                "usageMetadata": {"totalTokenCount": 42}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let resp = client_for(&server).generate(&sample_request()).await.unwrap();
        assert_eq!(resp.text(), Some("{\"mealPlans\": []}"));
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {
                    "code": 429,
                    "message": "Resource has been exhausted",
                    "status": "RESOURCE_EXHAUSTED",
                    "details": [{"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "30s"}]
                }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&sample_request())
            .await
            .unwrap_err();
        match err {
            GeminiError::RateLimited(msg) => {
                assert!(msg.starts_with("Rate limit exceeded"));
                assert!(msg.contains("30s"));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&sample_request())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GeminiError::Auth {
                status: 403,
                message: "API key not valid".into()
            }
        );
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&sample_request())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GeminiError::Server {
                status: 503,
                message: "upstream unavailable".into()
            }
        );
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_candidates_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .generate(&sample_request())
            .await
            .unwrap_err();
        assert!(matches!(err, GeminiError::InvalidResponse(_)));
    }
}
