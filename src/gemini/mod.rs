pub mod cache;
pub mod client;
pub mod dto;
pub mod error;
pub mod gateway;
pub mod queue;
pub mod retry;

pub use client::{CompletionClient, GeminiClient};
pub use dto::GenerateContentResponse;
pub use error::GeminiError;
pub use gateway::{Completion, Completions};
pub use queue::{QueueError, QueuePolicy, RequestQueue};
pub use retry::RetryPolicy;
