//! Analytics provider abstraction.
//!
//! A provider is one concrete analytics backend integration. The facade
//! constructs a [`TrackedEvent`] per tracking call and forwards it to every
//! active provider, so several backends can be fed from a single call site.
//!
//! Providers MUST NOT apply their own once-per-session suppression: the
//! session guard lives in the facade, and a provider-level guard would make
//! fan-out order-dependent.

pub mod console;
pub mod mixpanel;

use thiserror::Error;

use crate::types::TrackedEvent;

pub use console::ConsoleProvider;
pub use mixpanel::{MixpanelProvider, TransportHandle};

/// Errors a provider can report when accepting an event.
///
/// Acceptance means "handed to the provider's transport", not delivery:
/// network-level failures are retried inside the transport and never
/// surface here.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider's background transport is no longer running.
    #[error("{provider} transport unavailable")]
    TransportUnavailable {
        /// Name of the affected provider.
        provider: &'static str,
    },
}

/// A concrete analytics backend.
pub trait Provider: Send + Sync {
    /// Stable name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Accepts an event for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] if the event cannot be handed to the
    /// provider's transport.
    fn track(&self, event: &TrackedEvent) -> Result<(), ProviderError>;

    /// Requests that buffered events be delivered soon.
    ///
    /// A hint, not a synchronous wait: callers never block on delivery.
    fn flush(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display() {
        let err = ProviderError::TransportUnavailable {
            provider: "mixpanel",
        };
        assert_eq!(err.to_string(), "mixpanel transport unavailable");
    }
}
