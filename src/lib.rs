//! gametrack - game analytics tracking with pluggable providers.
//!
//! This crate records two fixed event kinds ("App Launched", "Game Played")
//! and forwards them to one or more analytics backends, persisting launch
//! counters locally so first-launch and launch-count semantics survive
//! process restarts.
//!
//! # Overview
//!
//! Application code talks to a single [`Tracker`] facade. The facade:
//!
//! - guarantees the app-launch event fires at most once per process
//!   lifetime (an in-memory session guard, atomic under concurrent calls);
//! - derives `(first_time, count)` from the persistent store, rejecting
//!   corrupted counters instead of repairing them;
//! - fans each event out to every active [`Provider`], so several backends
//!   can be fed from one call site.
//!
//! Providers are selected by configuration and constructed lazily: an
//! unconfigured or unknown selector fails at the first tracking call, never
//! at startup.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gametrack::config::Config;
//! use gametrack::registry::ProviderRegistry;
//! use gametrack::store::FileStore;
//! use gametrack::tracker::Tracker;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let store = FileStore::open(&config.state_path)?;
//! let registry = Arc::new(ProviderRegistry::new(config));
//! let tracker = Tracker::new(Box::new(store), registry);
//!
//! if tracker.app_launched()? {
//!     // First tracking call of this session.
//! }
//! tracker.game_played(1337, 42)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`types`]: The fixed tracked-event vocabulary
//! - [`tracker`]: The tracking facade (session guard, derivation, fan-out)
//! - [`provider`]: Provider abstraction and the console/Mixpanel backends
//! - [`registry`]: Selector-driven lazy provider construction
//! - [`transport`]: Background Mixpanel HTTP worker
//! - [`store`]: Persistent launch counter storage
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for tracking operations

pub mod config;
pub mod error;
pub mod provider;
pub mod registry;
pub mod store;
pub mod tracker;
pub mod transport;
pub mod types;

pub use config::{Config, ConfigError, MixpanelConfig};
pub use error::{Result, TrackingError};
pub use provider::{ConsoleProvider, MixpanelProvider, Provider, ProviderError, TransportHandle};
pub use registry::{ProviderKind, ProviderRegistry};
pub use store::{FileStore, MemoryStore, StateStore, StoreError, StoreKey};
pub use tracker::Tracker;
pub use types::{EventName, PropertyValue, TrackedEvent};
