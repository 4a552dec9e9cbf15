//! Tracking facade.
//!
//! [`Tracker`] is the single entry point used by application code. It owns
//! the per-session idempotency guard, derives first-launch/launch-count
//! state from the persistent store, and fans tracked events out to the
//! active providers.
//!
//! The facade is an explicitly constructed object: build it once at the
//! composition root and share it (e.g. behind an `Arc`) with whatever needs
//! to track events. It holds no global state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::error::{Result, TrackingError};
use crate::provider::Provider;
use crate::registry::ProviderRegistry;
use crate::store::{StateStore, StoreKey};
use crate::types::TrackedEvent;

/// Stored value of the first-launch flag while no launch has been recorded.
const FIRST_LAUNCH_FLAG_DEFAULT: i64 = 1;

/// Stored launch count before any launch has been recorded.
const LAUNCH_COUNT_DEFAULT: i64 = 0;

/// Where the facade gets its providers from.
enum ProviderSource {
    /// Resolved lazily from configuration at each tracking call.
    Registry(Arc<ProviderRegistry>),
    /// A fixed list supplied by the caller.
    Fixed(Vec<Arc<dyn Provider>>),
}

/// The tracking facade.
///
/// Guarantees that an app-launch event fires at most once per process
/// lifetime, regardless of how many times and from how many threads
/// [`app_launched`](Self::app_launched) or
/// [`app_launched_with`](Self::app_launched_with) are called.
pub struct Tracker {
    store: Mutex<Box<dyn StateStore>>,
    providers: ProviderSource,
    launched: AtomicBool,
}

impl Tracker {
    /// Creates a tracker whose providers are resolved lazily from the
    /// registry.
    ///
    /// An unconfigured registry does not fail here: the first tracking call
    /// reports it.
    #[must_use]
    pub fn new(store: Box<dyn StateStore>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            store: Mutex::new(store),
            providers: ProviderSource::Registry(registry),
            launched: AtomicBool::new(false),
        }
    }

    /// Creates a tracker over an explicit provider list.
    ///
    /// An empty list fails with
    /// [`TrackingError::UnconfiguredProvider`] at the first tracking call,
    /// matching the registry behavior.
    #[must_use]
    pub fn with_providers(store: Box<dyn StateStore>, providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            store: Mutex::new(store),
            providers: ProviderSource::Fixed(providers),
            launched: AtomicBool::new(false),
        }
    }

    /// Tracks the app launch, deriving launch state from the store.
    ///
    /// Reads the persisted first-launch flag and launch count, derives
    /// `(first_time, count)`, forwards the event through
    /// [`app_launched_with`](Self::app_launched_with), and on success
    /// persists the updated counters and flushes the store.
    ///
    /// Returns `Ok(false)` without side effects when the launch was already
    /// tracked this session.
    ///
    /// If the process dies after the event is handed to the providers but
    /// before the counters are saved, the next session re-derives the same
    /// state: an at-least-once replay on the first-launch transition and an
    /// under-count on the counter, accepted instead of transactional
    /// storage.
    ///
    /// # Errors
    ///
    /// - [`TrackingError::InvalidPersistedState`] if the persisted count is
    ///   non-positive on a non-first launch; nothing is written and no
    ///   event is tracked.
    /// - [`TrackingError::UnconfiguredProvider`] if no provider is
    ///   configured.
    /// - [`TrackingError::Store`] if persisting the updated counters fails.
    pub fn app_launched(&self) -> Result<bool> {
        if self.launched.load(Ordering::SeqCst) {
            debug!("App launch already tracked this session, skipping");
            return Ok(false);
        }

        let (first_time, count) = {
            let store = self.store.lock().expect("state store lock poisoned");
            derive_launch_state(&**store)?
        };

        if !self.app_launched_with(first_time, count)? {
            // Lost the guard race; the winner persists.
            return Ok(false);
        }

        let mut store = self.store.lock().expect("state store lock poisoned");
        store.set_int(StoreKey::AppLaunchedFirstTime, 0);
        store.set_int(StoreKey::AppLaunchedCount, count);
        store.save()?;

        Ok(true)
    }

    /// Tracks the app launch with caller-supplied launch state.
    ///
    /// For callers that maintain launch counters in their own save system:
    /// the store is not consulted or written, but the same once-per-session
    /// guarantee applies. The session guard is the single source of truth
    /// for "has this session already reported a launch".
    ///
    /// Returns `Ok(false)` without side effects when the launch was already
    /// tracked this session.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::UnconfiguredProvider`] if no provider is
    /// configured; the session guard is not consumed in that case.
    pub fn app_launched_with(&self, first_time: bool, count: i64) -> Result<bool> {
        let providers = self.active_providers()?;

        // The only mutation of the guard: a single irreversible
        // false -> true transition.
        if self
            .launched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("App launch already tracked this session, skipping");
            return Ok(false);
        }

        let event = TrackedEvent::app_launched(first_time, count);
        self.fan_out(&providers, &event);
        for provider in &providers {
            provider.flush();
        }

        info!(first_time, count, "App launch tracked");
        Ok(true)
    }

    /// Tracks a played game.
    ///
    /// No idempotency guard and no store access: every call tracks. No
    /// flush is requested; delivery follows the providers' batching.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::UnconfiguredProvider`] if no provider is
    /// configured.
    pub fn game_played(&self, score: i64, game_count: i64) -> Result<()> {
        let providers = self.active_providers()?;

        let event = TrackedEvent::game_played(score, game_count);
        self.fan_out(&providers, &event);

        info!(score, game_count, "Game play tracked");
        Ok(())
    }

    /// Resolves the active provider set.
    fn active_providers(&self) -> Result<Vec<Arc<dyn Provider>>> {
        match &self.providers {
            ProviderSource::Registry(registry) => registry.active(),
            ProviderSource::Fixed(providers) => {
                if providers.is_empty() {
                    return Err(TrackingError::UnconfiguredProvider {
                        selector: "none".to_string(),
                    });
                }
                Ok(providers.clone())
            }
        }
    }

    /// Forwards one event to every provider.
    ///
    /// A provider that fails to accept the event is logged and skipped; the
    /// call result communicates "handed to transport", not delivery, and
    /// one broken backend must not starve the others.
    fn fan_out(&self, providers: &[Arc<dyn Provider>], event: &TrackedEvent) {
        for provider in providers {
            if let Err(e) = provider.track(event) {
                warn!(
                    provider = provider.name(),
                    error = %e,
                    event = event.name().as_str(),
                    "Provider rejected event"
                );
            }
        }
    }
}

/// Derives `(first_time, count)` from the persisted counters.
fn derive_launch_state(store: &dyn StateStore) -> Result<(bool, i64)> {
    let first_raw = store.get_int(StoreKey::AppLaunchedFirstTime, FIRST_LAUNCH_FLAG_DEFAULT);
    let count_raw = store.get_int(StoreKey::AppLaunchedCount, LAUNCH_COUNT_DEFAULT);

    if first_raw == FIRST_LAUNCH_FLAG_DEFAULT {
        debug!("First launch");
        return Ok((true, 1));
    }

    // The count must be positive once a launch has been recorded.
    if count_raw <= 0 {
        return Err(TrackingError::InvalidPersistedState { count: count_raw });
    }

    Ok((false, count_raw + 1))
}
