// ABOUTME: Client-side polling of a generation task until it finishes
// ABOUTME: Sequential status checks with coalesced progress, time budget and cancellation

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{ClientError, FetchedImage, GenerationApi, TaskProgress};

/// Shortest interval the poller will use between status checks
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct PollerConfig {
    pub initial_delay: Duration,
    pub interval: Duration,
    pub max_duration: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            interval: Duration::from_secs(10),
            max_duration: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("Polling cancelled")]
    Cancelled,

    #[error("Image generation failed: {0}")]
    Failed(String),

    #[error("Generation did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("Generation task not found")]
    NotFound,

    #[error(transparent)]
    Client(ClientError),
}

/// Owner side of a cancellation pair. Dropping it without cancelling leaves polling running.
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (sender, receiver) = watch::channel(false);
    (CancelHandle { sender }, CancelToken { receiver })
}

impl CancelHandle {
    pub fn cancel(self) {
        let _ = self.sender.send(true);
    }
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        let (_, token) = cancel_pair();
        token
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation is requested
    pub async fn cancelled(&mut self) {
        loop {
            if *self.receiver.borrow_and_update() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                // Handle dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Polls one task at a time through a `GenerationApi`
pub struct GenerationPoller<A> {
    api: A,
    config: PollerConfig,
}

impl<A: GenerationApi> GenerationPoller<A> {
    pub fn new(api: A, config: PollerConfig) -> Self {
        let config = PollerConfig {
            interval: config.interval.max(MIN_POLL_INTERVAL),
            ..config
        };
        Self { api, config }
    }

    pub fn config(&self) -> PollerConfig {
        self.config
    }

    /// Wait for `duration`, returning false if cancelled first
    async fn pause(token: &mut CancelToken, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = token.cancelled() => false,
        }
    }

    /// Poll `task_id` until it completes, fails, times out or is cancelled.
    ///
    /// `on_progress` fires only when the reported percentage goes up.
    pub async fn poll(
        &self,
        task_id: &str,
        mut token: CancelToken,
        mut on_progress: impl FnMut(u8, &str),
    ) -> Result<FetchedImage, PollError> {
        let started = Instant::now();
        let mut shown = 0u8;

        if !Self::pause(&mut token, self.config.initial_delay).await {
            return Err(PollError::Cancelled);
        }

        loop {
            if token.is_cancelled() {
                return Err(PollError::Cancelled);
            }

            if started.elapsed() >= self.config.max_duration {
                warn!(task_id, "Generation polling budget exhausted, trying result once more");
                let last_try = tokio::select! {
                    result = self.api.fetch_result(task_id) => result,
                    _ = token.cancelled() => return Err(PollError::Cancelled),
                };
                return last_try.map_err(|_| PollError::TimedOut(self.config.max_duration));
            }

            let checked = tokio::select! {
                result = self.api.progress(task_id) => result,
                _ = token.cancelled() => return Err(PollError::Cancelled),
            };

            match checked {
                Ok(status) => {
                    let outcome = self
                        .handle(task_id, status, &mut token, &mut shown, &mut on_progress)
                        .await;
                    if let Some(outcome) = outcome {
                        return outcome;
                    }
                }
                Err(ClientError::Api { status: 404, .. }) => return Err(PollError::NotFound),
                Err(e) if e.is_transient() => {
                    warn!(task_id, error = %e, "Progress check failed, will retry");
                }
                Err(e) => return Err(PollError::Client(e)),
            }

            if !Self::pause(&mut token, self.config.interval).await {
                return Err(PollError::Cancelled);
            }
        }
    }

    /// React to one status report. `None` means keep polling.
    async fn handle(
        &self,
        task_id: &str,
        status: TaskProgress,
        token: &mut CancelToken,
        shown: &mut u8,
        on_progress: &mut impl FnMut(u8, &str),
    ) -> Option<Result<FetchedImage, PollError>> {
        if status.is_failed() {
            let reason = status
                .error
                .unwrap_or_else(|| "Image generation failed".to_string());
            return Some(Err(PollError::Failed(reason)));
        }

        if status.is_completed() {
            let fetched = tokio::select! {
                result = self.api.fetch_result(task_id) => result,
                _ = token.cancelled() => return Some(Err(PollError::Cancelled)),
            };
            return match fetched {
                Ok(image) => {
                    if *shown < 100 {
                        *shown = 100;
                        on_progress(100, &status.message);
                    }
                    info!(task_id, size = image.data.len(), "Generated image received");
                    Some(Ok(image))
                }
                Err(e) if e.is_transient() => {
                    warn!(task_id, error = %e, "Result fetch failed, will retry");
                    None
                }
                Err(ClientError::Api { status: 404, .. }) => Some(Err(PollError::NotFound)),
                Err(ClientError::Api {
                    status: 422,
                    message,
                    ..
                }) => Some(Err(PollError::Failed(message))),
                Err(e) => Some(Err(PollError::Client(e))),
            };
        }

        let progress = status.progress.min(100);
        if progress > *shown {
            *shown = progress;
            on_progress(progress, &status.message);
        } else {
            debug!(task_id, progress, "Progress unchanged");
        }
        None
    }
}
