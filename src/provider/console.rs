//! Console provider: emits tracked events as structured log records.
//!
//! Useful during development and as a second backend when fanning out, so
//! every event sent to a remote provider is also visible locally.

use tracing::info;

use crate::provider::{Provider, ProviderError};
use crate::types::TrackedEvent;

/// A provider that writes every event to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct ConsoleProvider;

impl ConsoleProvider {
    /// Creates a console provider.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Provider for ConsoleProvider {
    fn name(&self) -> &'static str {
        "console"
    }

    fn track(&self, event: &TrackedEvent) -> Result<(), ProviderError> {
        let properties = serde_json::to_string(event.properties()).unwrap_or_default();
        info!(
            event = event.name().as_str(),
            %properties,
            "Tracked event"
        );
        Ok(())
    }

    fn flush(&self) {
        // Log records are not buffered; nothing to deliver.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_never_fails() {
        let provider = ConsoleProvider::new();

        assert!(provider.track(&TrackedEvent::app_launched(true, 1)).is_ok());
        assert!(provider.track(&TrackedEvent::game_played(100, 2)).is_ok());
    }

    #[test]
    fn name_is_console() {
        assert_eq!(ConsoleProvider::new().name(), "console");
    }

    #[test]
    fn track_repeats_without_suppression() {
        // Guarding is the facade's job; the provider must accept duplicates.
        let provider = ConsoleProvider::new();
        let event = TrackedEvent::app_launched(false, 2);

        assert!(provider.track(&event).is_ok());
        assert!(provider.track(&event).is_ok());
    }
}
