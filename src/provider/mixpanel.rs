//! Mixpanel provider.
//!
//! Converts tracked events into Mixpanel wire format and hands them to the
//! background [`transport`](crate::transport) worker over a channel. Track
//! and flush calls never touch the network themselves.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::config::MixpanelConfig;
use crate::provider::{Provider, ProviderError};
use crate::transport::{generate_insert_id, MixpanelSender, TransportCommand, WireEvent};
use crate::types::{PropertyValue, TrackedEvent};

/// Handle to a running transport worker, used for graceful drain at
/// process exit.
pub struct TransportHandle {
    tx: UnboundedSender<TransportCommand>,
    join: JoinHandle<usize>,
}

impl TransportHandle {
    /// Asks the worker to drain its buffer and stop, waiting up to
    /// `timeout`.
    ///
    /// Returns the number of events the worker reported undelivered; if the
    /// drain timed out the worker is detached and the count is unknown
    /// (reported as 0).
    pub async fn shutdown(self, timeout: Duration) -> usize {
        // A closed channel means the worker is already gone.
        let _ = self.tx.send(TransportCommand::Shutdown);

        match tokio::time::timeout(timeout, self.join).await {
            Ok(Ok(undelivered)) => undelivered,
            Ok(Err(e)) => {
                error!(error = %e, "Transport worker failed");
                0
            }
            Err(_) => {
                error!("Timeout while draining transport buffer");
                0
            }
        }
    }
}

/// A provider that delivers events to the Mixpanel ingestion API.
///
/// Each tracked event is flattened into the wire schema expected by the
/// `/track` endpoint: the event name plus a property map carrying `token`,
/// `distinct_id`, `time` and a `$insert_id` for server-side deduplication,
/// alongside the event's own properties.
pub struct MixpanelProvider {
    token: String,
    distinct_id: String,
    tx: UnboundedSender<TransportCommand>,
}

impl MixpanelProvider {
    /// Spawns the transport worker and returns the provider plus the handle
    /// used to drain it at shutdown.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(config: MixpanelConfig, distinct_id: String) -> (Arc<Self>, TransportHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let sender = MixpanelSender::new(config.clone());
        let join = tokio::spawn(sender.run(rx));

        let provider = Arc::new(Self {
            token: config.token,
            distinct_id,
            tx: tx.clone(),
        });

        (provider, TransportHandle { tx, join })
    }

    /// Flattens a tracked event into the wire schema.
    fn wire_event(&self, event: &TrackedEvent) -> WireEvent {
        let mut properties = serde_json::Map::new();
        properties.insert("token".to_string(), Value::from(self.token.clone()));
        properties.insert(
            "distinct_id".to_string(),
            Value::from(self.distinct_id.clone()),
        );
        properties.insert("time".to_string(), Value::from(Utc::now().timestamp()));
        properties.insert("$insert_id".to_string(), Value::from(generate_insert_id()));

        for (name, value) in event.properties() {
            let json = match value {
                PropertyValue::Bool(b) => Value::Bool(*b),
                PropertyValue::Int(i) => Value::from(*i),
            };
            properties.insert((*name).to_string(), json);
        }

        WireEvent {
            event: event.name().as_str().to_string(),
            properties,
        }
    }
}

impl Provider for MixpanelProvider {
    fn name(&self) -> &'static str {
        "mixpanel"
    }

    fn track(&self, event: &TrackedEvent) -> Result<(), ProviderError> {
        self.tx
            .send(TransportCommand::Track(self.wire_event(event)))
            .map_err(|_| ProviderError::TransportUnavailable {
                provider: "mixpanel",
            })
    }

    fn flush(&self) {
        if self.tx.send(TransportCommand::Flush).is_err() {
            warn!("Flush requested but transport worker is gone");
        }
    }
}
