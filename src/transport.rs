//! Background HTTP transport for the Mixpanel provider.
//!
//! The facade never blocks on network I/O: the Mixpanel provider hands wire
//! events to a [`MixpanelSender`] worker over a channel, and the worker owns
//! the HTTP client, the buffer, and the retry policy:
//!
//! - Event buffering (1000 events max, FIFO eviction)
//! - Batch delivery once the configured batch size is reached or a flush is
//!   requested
//! - Exponential backoff retry (1s → 60s max, ±25% jitter) on transient
//!   failures
//! - Rate limit handling (429 with Retry-After header)
//!
//! Delivery uses the Mixpanel ingestion endpoint: `POST {base}/track?verbose=1`
//! with a JSON array body. A `verbose` status of 0 means the batch was
//! rejected (bad token or malformed events) and is not retried.

use std::collections::VecDeque;
use std::time::Duration;

use rand::Rng;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::MixpanelConfig;

/// Initial retry delay in seconds.
const INITIAL_RETRY_DELAY_SECS: u64 = 1;

/// Maximum retry delay in seconds.
const MAX_RETRY_DELAY_SECS: u64 = 60;

/// Jitter factor (±25%).
const JITTER_FACTOR: f64 = 0.25;

/// Maximum number of buffered events before FIFO eviction.
const MAX_BUFFER_SIZE: usize = 1000;

/// Maximum number of retry attempts before giving up on a batch.
const MAX_RETRY_ATTEMPTS: u32 = 5;

/// HTTP request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Length of the random alphanumeric suffix in insert ids.
const INSERT_ID_SUFFIX_LEN: usize = 20;

/// Prefix for insert ids.
const INSERT_ID_PREFIX: &str = "gt_";

/// Errors that can occur while delivering event batches.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The ingestion endpoint rejected the batch (bad token or malformed
    /// events). Not retried.
    #[error("batch rejected by ingestion endpoint: {message}")]
    Rejected { message: String },

    /// Server returned an error status.
    #[error("server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Maximum retry attempts exceeded.
    #[error("max retries exceeded after {attempts} attempts")]
    MaxRetriesExceeded { attempts: u32 },
}

/// A single event in Mixpanel wire format.
#[derive(Debug, Clone, Serialize)]
pub struct WireEvent {
    /// Event name (e.g. `App Launched`).
    pub event: String,

    /// Flattened property map: `token`, `distinct_id`, `time`, `$insert_id`
    /// plus the event's own properties.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Commands accepted by the transport worker.
#[derive(Debug)]
pub enum TransportCommand {
    /// Buffer an event, delivering the batch if it is full.
    Track(WireEvent),
    /// Deliver all buffered events now.
    Flush,
    /// Drain the buffer and stop the worker.
    Shutdown,
}

/// Verbose-mode response from the ingestion endpoint.
#[derive(Debug, Deserialize)]
struct VerboseResponse {
    status: i64,
    error: Option<String>,
}

/// Buffering HTTP sender for Mixpanel event batches.
pub struct MixpanelSender {
    config: MixpanelConfig,
    client: Client,
    buffer: VecDeque<WireEvent>,
    current_retry_delay: Duration,
}

impl MixpanelSender {
    /// Creates a sender for the given Mixpanel configuration.
    #[must_use]
    pub fn new(config: MixpanelConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .build()
            .expect("failed to create HTTP client");

        Self {
            config,
            client,
            buffer: VecDeque::new(),
            current_retry_delay: Duration::from_secs(INITIAL_RETRY_DELAY_SECS),
        }
    }

    /// Buffers an event, evicting the oldest events if the buffer is full.
    ///
    /// Returns the number of events evicted.
    pub fn queue(&mut self, event: WireEvent) -> usize {
        let mut evicted = 0;

        while self.buffer.len() >= MAX_BUFFER_SIZE {
            self.buffer.pop_front();
            evicted += 1;
        }

        self.buffer.push_back(event);

        if evicted > 0 {
            warn!(evicted_count = evicted, "Buffer overflow, events evicted");
        }

        evicted
    }

    /// Returns the number of events currently buffered.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Delivers all buffered events as one batch.
    ///
    /// On success the buffer is cleared; on failure events remain buffered
    /// for a later attempt.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the batch cannot be delivered after all
    /// retries, or if the endpoint rejected it.
    pub async fn flush(&mut self) -> Result<(), TransportError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let events: Vec<WireEvent> = self.buffer.iter().cloned().collect();
        self.send_batch(&events).await?;

        self.buffer.clear();
        self.reset_retry_delay();

        Ok(())
    }

    /// Runs the command loop until shutdown, then drains the buffer.
    ///
    /// Returns the number of events that could not be delivered.
    pub async fn run(mut self, mut rx: UnboundedReceiver<TransportCommand>) -> usize {
        while let Some(command) = rx.recv().await {
            match command {
                TransportCommand::Track(event) => {
                    self.queue(event);
                    if self.buffer.len() >= self.config.batch_size {
                        if let Err(e) = self.flush().await {
                            warn!(error = %e, "Batch delivery failed, events kept buffered");
                        }
                    }
                }
                TransportCommand::Flush => {
                    if let Err(e) = self.flush().await {
                        warn!(error = %e, "Requested flush failed, events kept buffered");
                    }
                }
                TransportCommand::Shutdown => break,
            }
        }

        // Final drain: on channel close or shutdown, one last attempt.
        if let Err(e) = self.flush().await {
            error!(error = %e, undelivered = self.buffer.len(), "Final flush failed");
        }
        self.buffer.len()
    }

    /// Sends a batch of events with retry logic.
    async fn send_batch(&mut self, events: &[WireEvent]) -> Result<(), TransportError> {
        let url = format!("{}/track?verbose=1", self.config.api_url);

        let mut attempts = 0;

        loop {
            attempts += 1;

            debug!(
                url = %url,
                events = events.len(),
                attempt = attempts,
                "Sending event batch"
            );

            let result = self.client.post(&url).json(events).send().await;

            match result {
                Ok(response) => {
                    let status = response.status();

                    match status {
                        StatusCode::OK => {
                            let body = response.text().await.unwrap_or_default();
                            return self.check_verbose_response(&body, events.len());
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            let retry_after = self.parse_retry_after(&response);
                            warn!(retry_after_secs = retry_after, "Rate limited by server");

                            if attempts >= MAX_RETRY_ATTEMPTS {
                                return Err(TransportError::MaxRetriesExceeded { attempts });
                            }

                            sleep(Duration::from_secs(retry_after)).await;
                            continue;
                        }
                        _ if status.is_server_error() => {
                            let message = response.text().await.unwrap_or_default();
                            warn!(
                                status = status.as_u16(),
                                message = %message,
                                "Server error, will retry"
                            );

                            if attempts >= MAX_RETRY_ATTEMPTS {
                                return Err(TransportError::ServerError {
                                    status: status.as_u16(),
                                    message,
                                });
                            }

                            self.wait_with_backoff().await;
                            continue;
                        }
                        _ => {
                            let message = response.text().await.unwrap_or_default();
                            return Err(TransportError::ServerError {
                                status: status.as_u16(),
                                message,
                            });
                        }
                    }
                }
                Err(e) => {
                    if e.is_timeout() || e.is_connect() {
                        warn!(error = %e, "Connection error, will retry");

                        if attempts >= MAX_RETRY_ATTEMPTS {
                            return Err(TransportError::MaxRetriesExceeded { attempts });
                        }

                        self.wait_with_backoff().await;
                        continue;
                    }

                    return Err(TransportError::Http(e));
                }
            }
        }
    }

    /// Interprets a verbose-mode response body.
    fn check_verbose_response(
        &mut self,
        body: &str,
        batch_len: usize,
    ) -> Result<(), TransportError> {
        match serde_json::from_str::<VerboseResponse>(body) {
            Ok(verbose) if verbose.status == 1 => {
                info!(events = batch_len, "Events delivered");
                self.reset_retry_delay();
                Ok(())
            }
            Ok(verbose) => Err(TransportError::Rejected {
                message: verbose.error.unwrap_or_else(|| "unknown".to_string()),
            }),
            // Some endpoints answer the classic "1"/"0" body instead.
            Err(_) if body.trim() == "1" => {
                info!(events = batch_len, "Events delivered");
                self.reset_retry_delay();
                Ok(())
            }
            Err(_) => Err(TransportError::Rejected {
                message: format!("unexpected response body: {body}"),
            }),
        }
    }

    /// Parses the Retry-After header from a 429 response.
    fn parse_retry_after(&self, response: &reqwest::Response) -> u64 {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(self.current_retry_delay.as_secs())
    }

    /// Waits for the current retry delay with jitter, then increases the delay.
    async fn wait_with_backoff(&mut self) {
        let delay = self.add_jitter(self.current_retry_delay);
        debug!(delay_ms = delay.as_millis(), "Waiting before retry");
        sleep(delay).await;
        self.increase_retry_delay();
    }

    /// Adds ±25% jitter to a duration.
    fn add_jitter(&self, duration: Duration) -> Duration {
        let mut rng = rand::rng();
        let jitter_range = duration.as_secs_f64() * JITTER_FACTOR;
        let jitter = rng.random_range(-jitter_range..=jitter_range);
        let new_secs = (duration.as_secs_f64() + jitter).max(0.1);
        Duration::from_secs_f64(new_secs)
    }

    /// Doubles the retry delay up to the maximum.
    fn increase_retry_delay(&mut self) {
        let new_secs = (self.current_retry_delay.as_secs() * 2).min(MAX_RETRY_DELAY_SECS);
        self.current_retry_delay = Duration::from_secs(new_secs);
    }

    /// Resets the retry delay to the initial value.
    fn reset_retry_delay(&mut self) {
        self.current_retry_delay = Duration::from_secs(INITIAL_RETRY_DELAY_SECS);
    }
}

/// Generates a unique `$insert_id` with the format `gt_` followed by 20
/// alphanumeric characters, used by the ingestion endpoint for
/// deduplication.
#[must_use]
pub fn generate_insert_id() -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

    let mut rng = rand::rng();
    let suffix: String = (0..INSERT_ID_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();

    format!("{INSERT_ID_PREFIX}{suffix}")
}
