use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, Notify, Semaphore, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until, timeout};

use crate::error::GenerationError;
use crate::generation::client::{GenerationRequest, GenerativeClient};
use crate::generation::usage::GenerationUsageService;

/// Admission-control settings for the gateway.
#[derive(Clone, Copy, Debug)]
pub struct GenerationLimits {
    /// Ceiling on dispatches within any rolling 60-second window.
    pub requests_per_minute: u32,
    /// Ceiling on attempts per calendar day.
    pub daily_quota: u32,
    /// Retry budget per request, shared by rate-limit and transient retries.
    pub max_retries: u32,
    /// First transient backoff step; doubles per retry.
    pub base_delay: Duration,
    /// Fixed wait after a 429, long enough to clear a one-minute window.
    pub rate_limit_delay: Duration,
    /// Queue bound; requests beyond it are rejected immediately.
    pub max_queue_size: usize,
    /// Hard deadline for a single dispatch attempt.
    pub request_timeout: Duration,
    /// Fraction of the daily quota at which an advisory warning is logged.
    pub warn_ratio: f32,
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: 15,
            daily_quota: 1500,
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            rate_limit_delay: Duration::from_secs(65),
            max_queue_size: 8,
            request_timeout: Duration::from_secs(30),
            warn_ratio: 0.9,
        }
    }
}

impl GenerationLimits {
    /// Minimum spacing between dispatches that keeps any rolling minute at or
    /// under `requests_per_minute`.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.requests_per_minute.max(1)))
    }
}

struct QueuedRequest {
    request: GenerationRequest,
    retries: u32,
    responder: oneshot::Sender<Result<String, GenerationError>>,
}

struct GatewayShared {
    queue: Mutex<VecDeque<QueuedRequest>>,
    notify: Notify,
    limits: GenerationLimits,
}

/// Serialized access to the generative text endpoint.
///
/// All question and feedback generation goes through one gateway instance so
/// the rate ceiling, the daily quota, and the retry policy hold globally.
/// Construct one per composition root; tests build a fresh gateway each.
pub struct GenerationGateway {
    shared: Arc<GatewayShared>,
    worker: JoinHandle<()>,
}

impl GenerationGateway {
    /// Build a gateway and spawn its drain task.
    ///
    /// The drain task is the single consumer of the queue, so at most one
    /// dispatch decision is in progress at any time.
    #[must_use]
    pub fn new(
        client: Arc<dyn GenerativeClient>,
        usage: GenerationUsageService,
        limits: GenerationLimits,
    ) -> Self {
        let shared = Arc::new(GatewayShared {
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            limits,
        });
        let worker = tokio::spawn(drain(Arc::clone(&shared), client, usage));
        Self { shared, worker }
    }

    /// Generate the next interview question for a fully-assembled prompt.
    ///
    /// # Errors
    ///
    /// Returns `QueueOverloaded` when the admission queue is full, otherwise
    /// the terminal outcome of the dispatch-and-retry cycle.
    pub async fn generate_question(
        &self,
        prompt: impl Into<String>,
    ) -> Result<String, GenerationError> {
        self.submit(GenerationRequest::for_prompt(prompt)).await
    }

    /// Enqueue a request and wait for its terminal outcome.
    ///
    /// Completion order is not arrival order: a slow retry can finish after a
    /// later, faster request. Callers correlate by this future alone.
    ///
    /// # Errors
    ///
    /// Returns `QueueOverloaded` when the admission queue is full, otherwise
    /// the terminal outcome of the dispatch-and-retry cycle.
    pub async fn submit(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let (responder, outcome) = oneshot::channel();
        {
            let mut queue = self.shared.queue.lock().await;
            if queue.len() >= self.shared.limits.max_queue_size {
                return Err(GenerationError::QueueOverloaded);
            }
            queue.push_back(QueuedRequest {
                request,
                retries: 0,
                responder,
            });
        }
        self.shared.notify.notify_one();

        match outcome.await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Transient(
                "gateway shut down before the request completed".into(),
            )),
        }
    }

    /// Current queue depth, for operator visibility.
    pub async fn queued(&self) -> usize {
        self.shared.queue.lock().await.len()
    }
}

impl Drop for GenerationGateway {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn drain(
    shared: Arc<GatewayShared>,
    client: Arc<dyn GenerativeClient>,
    usage: GenerationUsageService,
) {
    let limits = shared.limits;
    let min_interval = limits.min_interval();
    let in_flight = Arc::new(Semaphore::new(limits.requests_per_minute.max(1) as usize));
    let mut next_allowed: Option<Instant> = None;

    loop {
        // One permit per in-flight dispatch; released when the attempt ends.
        let Ok(permit) = Arc::clone(&in_flight).acquire_owned().await else {
            return;
        };

        if let Some(at) = next_allowed {
            sleep_until(at).await;
        }

        let entry = loop {
            if let Some(entry) = shared.queue.lock().await.pop_front() {
                break entry;
            }
            shared.notify.notified().await;
        };

        match usage.check_and_record().await {
            Ok(_) => {}
            Err(err) => {
                let _ = entry.responder.send(Err(err));
                continue;
            }
        }

        next_allowed = Some(Instant::now() + min_interval);
        tokio::spawn(attempt(Arc::clone(&shared), Arc::clone(&client), entry, permit));
    }
}

async fn attempt(
    shared: Arc<GatewayShared>,
    client: Arc<dyn GenerativeClient>,
    entry: QueuedRequest,
    permit: tokio::sync::OwnedSemaphorePermit,
) {
    let limits = shared.limits;
    let outcome = match timeout(limits.request_timeout, client.generate(&entry.request)).await {
        Ok(Ok(text)) => match validate_text(&text) {
            Some(clean) => Ok(clean),
            None => Err(GenerationError::InvalidResponse),
        },
        Ok(Err(err)) => Err(err),
        Err(_) => Err(GenerationError::Transient(
            "dispatch exceeded the per-call deadline".into(),
        )),
    };
    drop(permit);

    match outcome {
        Ok(text) => {
            // A preempted caller may have dropped its receiver; discard.
            let _ = entry.responder.send(Ok(text));
        }
        Err(err) => {
            let retryable = matches!(
                err,
                GenerationError::RateLimited | GenerationError::Transient(_)
            );
            if retryable && entry.retries < limits.max_retries {
                let delay = match err {
                    GenerationError::RateLimited => limits.rate_limit_delay,
                    _ => backoff_delay(limits.base_delay, entry.retries),
                };
                tracing::warn!(
                    retries = entry.retries,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "generation attempt failed; re-enqueueing"
                );
                sleep(delay).await;

                // Retries bypass the admission bound: the request was already
                // admitted once, and dropping it here would lose it silently.
                shared.queue.lock().await.push_back(QueuedRequest {
                    retries: entry.retries + 1,
                    ..entry
                });
                shared.notify.notify_one();
            } else {
                let _ = entry.responder.send(Err(err));
            }
        }
    }
}

/// Exponential backoff with a little jitter to avoid retry alignment.
fn backoff_delay(base: Duration, retries: u32) -> Duration {
    let exp = base.saturating_mul(2_u32.saturating_pow(retries));
    let jitter = Duration::from_millis(rand::rng().random_range(0..100));
    exp + jitter
}

/// Reject empty and degenerate generations before they reach a session.
fn validate_text(text: &str) -> Option<String> {
    const DEGENERATE: [&str; 6] = [
        "hello",
        "hi",
        "hey",
        "hi there",
        "hello there",
        "how can i help you today",
    ];

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized: String = trimmed
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    if DEGENERATE.contains(&normalized.trim()) {
        return None;
    }

    Some(trimmed.to_string())
}
