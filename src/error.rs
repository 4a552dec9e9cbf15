//! Error types for the gametrack crate.
//!
//! This module defines the error types used throughout the crate, providing
//! structured error handling with clear, human-readable messages.
//!
//! A duplicate launch-tracking call is not an error: the facade reports it
//! through its `Ok(false)` return value and never through this type.

use thiserror::Error;

use crate::config::ConfigError;
use crate::provider::ProviderError;
use crate::store::StoreError;

/// Errors that can occur during tracking operations.
///
/// This is the primary error type for the crate, encompassing all possible
/// failure modes of the [`Tracker`](crate::tracker::Tracker) facade.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// The persisted launch count is non-positive on a non-first launch.
    ///
    /// This indicates corrupted state and is never silently repaired: the
    /// operation performs no write and tracks no event.
    #[error("invalid persisted launch count: {count}")]
    InvalidPersistedState {
        /// The non-positive count found in the store.
        count: i64,
    },

    /// No analytics provider is configured for the given selector.
    ///
    /// Raised at the first attempted tracking call, not at construction.
    #[error("no analytics provider configured (selector: {selector})")]
    UnconfiguredProvider {
        /// The selector that resolved to no provider.
        selector: String,
    },

    /// State store error.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider-level error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// A specialized `Result` type for tracking operations.
pub type Result<T> = std::result::Result<T, TrackingError>;
