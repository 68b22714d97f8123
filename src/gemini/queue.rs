use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use super::client::CompletionClient;
use super::dto::{GenerateContentRequest, GenerateContentResponse};
use super::error::GeminiError;
use crate::config::QueueConfig;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueueError {
    /// Rate limit persisted through every backoff round.
    #[error("{0} Please try again later.")]
    RateLimited(String),

    #[error(transparent)]
    Request(#[from] GeminiError),

    #[error("request queue is closed")]
    Closed,
}

impl QueueError {
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Request(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePolicy {
    pub min_spacing: Duration,
    pub rate_limit_retries: u32,
    pub backoff_base: Duration,
}

impl From<&QueueConfig> for QueuePolicy {
    fn from(cfg: &QueueConfig) -> Self {
        Self {
            min_spacing: cfg.min_spacing(),
            rate_limit_retries: cfg.rate_limit_retries,
            backoff_base: cfg.backoff_base(),
        }
    }
}

impl QueuePolicy {
    fn backoff(&self, retries: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(retries))
    }
}

struct Job {
    request: GenerateContentRequest,
    retries: u32,
    reply: oneshot::Sender<Result<GenerateContentResponse, QueueError>>,
}

/// FIFO front for the completion API.
///
/// A single worker task owns the pending list and dispatches one request at a
/// time, keeping `min_spacing` between the end of one call and the start of the
/// next. Rate-limited requests go to the back of the queue after an exponential
/// backoff; every submission is answered exactly once.
#[derive(Clone)]
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl RequestQueue {
    pub fn spawn(client: Arc<dyn CompletionClient>, policy: QueuePolicy) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(client, policy, rx));
        Self { tx }
    }

    pub async fn submit(
        &self,
        request: GenerateContentRequest,
    ) -> Result<GenerateContentResponse, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Job {
                request,
                retries: 0,
                reply,
            })
            .map_err(|_| QueueError::Closed)?;
        rx.await.map_err(|_| QueueError::Closed)?
    }
}

async fn run_worker(
    client: Arc<dyn CompletionClient>,
    policy: QueuePolicy,
    mut rx: mpsc::UnboundedReceiver<Job>,
) {
    let mut pending: VecDeque<Job> = VecDeque::new();
    let mut last_completed: Option<Instant> = None;

    loop {
        if pending.is_empty() {
            match rx.recv().await {
                Some(job) => pending.push_back(job),
                None => break,
            }
        }
        while let Ok(job) = rx.try_recv() {
            pending.push_back(job);
        }

        let Some(mut job) = pending.pop_front() else {
            continue;
        };

        if let Some(last) = last_completed {
            sleep_until(last + policy.min_spacing).await;
        }

        debug!(model = client.model(), queued = pending.len(), retries = job.retries, "dispatching completion request");
        let result = client.generate(&job.request).await;
        last_completed = Some(Instant::now());

        match result {
            Ok(response) => {
                let _ = job.reply.send(Ok(response));
            }
            Err(GeminiError::RateLimited(message)) if job.retries < policy.rate_limit_retries => {
                let backoff = policy.backoff(job.retries);
                job.retries += 1;
                warn!(
                    attempt = job.retries,
                    backoff_ms = backoff.as_millis() as u64,
                    %message,
                    "rate limited; re-queueing request"
                );
                sleep(backoff).await;
                pending.push_back(job);
            }
            Err(GeminiError::RateLimited(message)) => {
                warn!(retries = job.retries, "rate limit retries exhausted");
                let _ = job.reply.send(Err(QueueError::RateLimited(message)));
            }
            Err(e) => {
                let _ = job.reply.send(Err(QueueError::Request(e)));
            }
        }
    }

    debug!("request queue worker stopped");
}
