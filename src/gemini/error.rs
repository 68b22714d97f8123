/// Failure of a single call to the completion API.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeminiError {
    /// Explicit "too many requests" signal (HTTP 429).
    #[error("{0}")]
    RateLimited(String),

    /// Key rejected or not permitted (401/403). Never retried.
    #[error("completion API authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Malformed request (400). Never retried.
    #[error("completion API rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("completion API error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("invalid response from completion API: {0}")]
    InvalidResponse(String),
}

impl GeminiError {
    /// Errors worth another attempt by an outer retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(self, GeminiError::Server { .. } | GeminiError::Transport(_))
    }
}
