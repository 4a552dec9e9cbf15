//! Provider registry: selector-driven, lazily constructed provider set.
//!
//! The registry maps configured selector strings to provider instances.
//! Construction is lazy and cached: the first tracking call builds each
//! selected provider exactly once (the cache lock makes concurrent first
//! access safe), and the instances live for the process lifetime.
//!
//! Selection problems surface at the first tracking call, never at registry
//! construction, so tracking calls are always the failure point.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::TrackingError;
use crate::provider::{ConsoleProvider, MixpanelProvider, Provider, TransportHandle};

/// Selector for a concrete provider implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Mixpanel,
    Console,
}

impl ProviderKind {
    /// Parses a configuration selector. `none` and unknown selectors yield
    /// `None`; the caller reports them as unconfigured.
    #[must_use]
    pub fn from_selector(selector: &str) -> Option<Self> {
        match selector {
            "mixpanel" => Some(ProviderKind::Mixpanel),
            "console" => Some(ProviderKind::Console),
            _ => None,
        }
    }

    /// The canonical selector string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Mixpanel => "mixpanel",
            ProviderKind::Console => "console",
        }
    }
}

/// Cached instances plus the transport handles of spawned workers.
#[derive(Default)]
struct RegistryState {
    instances: HashMap<ProviderKind, Arc<dyn Provider>>,
    handles: Vec<TransportHandle>,
}

/// Lazily constructs and caches the configured providers.
pub struct ProviderRegistry {
    config: Config,
    state: Mutex<RegistryState>,
}

impl ProviderRegistry {
    /// Creates a registry over the given configuration.
    ///
    /// Never fails: selection problems are reported by
    /// [`active`](Self::active) at the first tracking call.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// Resolves the configured provider set, constructing instances on
    /// first use.
    ///
    /// Duplicate selectors resolve to the same cached instance and appear
    /// once in the result, so fan-out never double-tracks.
    ///
    /// # Errors
    ///
    /// Returns [`TrackingError::UnconfiguredProvider`] when no selector is
    /// configured, or when a selector is `none` or unrecognized.
    pub fn active(&self) -> Result<Vec<Arc<dyn Provider>>, TrackingError> {
        if self.config.providers.is_empty() {
            return Err(TrackingError::UnconfiguredProvider {
                selector: "none".to_string(),
            });
        }

        let mut state = self.state.lock().expect("registry state lock poisoned");
        let mut resolved: Vec<(ProviderKind, Arc<dyn Provider>)> = Vec::new();

        for selector in &self.config.providers {
            let kind = ProviderKind::from_selector(selector).ok_or_else(|| {
                TrackingError::UnconfiguredProvider {
                    selector: selector.clone(),
                }
            })?;

            if resolved.iter().any(|(k, _)| *k == kind) {
                debug!(selector = kind.as_str(), "Duplicate selector ignored");
                continue;
            }

            if !state.instances.contains_key(&kind) {
                let (provider, handle) = self.construct(kind)?;
                state.instances.insert(kind, provider);
                if let Some(handle) = handle {
                    state.handles.push(handle);
                }
                info!(provider = kind.as_str(), "Provider constructed");
            }

            resolved.push((kind, Arc::clone(&state.instances[&kind])));
        }

        Ok(resolved.into_iter().map(|(_, p)| p).collect())
    }

    /// Builds a provider instance for `kind`, plus the transport handle for
    /// providers that spawn a worker.
    fn construct(
        &self,
        kind: ProviderKind,
    ) -> Result<(Arc<dyn Provider>, Option<TransportHandle>), TrackingError> {
        match kind {
            ProviderKind::Console => Ok((Arc::new(ConsoleProvider::new()), None)),
            ProviderKind::Mixpanel => {
                let mixpanel_config = self.config.mixpanel.clone().ok_or_else(|| {
                    TrackingError::UnconfiguredProvider {
                        selector: "mixpanel".to_string(),
                    }
                })?;

                let (provider, handle) =
                    MixpanelProvider::spawn(mixpanel_config, self.config.distinct_id.clone());
                Ok((provider, Some(handle)))
            }
        }
    }

    /// Drains every spawned transport worker, waiting up to `timeout` per
    /// worker. Returns the total number of undelivered events.
    pub async fn shutdown(&self, timeout: Duration) -> usize {
        let handles = {
            let mut state = self.state.lock().expect("registry state lock poisoned");
            std::mem::take(&mut state.handles)
        };

        let mut undelivered = 0;
        for handle in handles {
            undelivered += handle.shutdown(timeout).await;
        }
        undelivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MixpanelConfig;
    use std::path::PathBuf;

    fn config_with_providers(providers: &[&str]) -> Config {
        Config {
            providers: providers.iter().map(|s| s.to_string()).collect(),
            distinct_id: "test-device".to_string(),
            state_path: PathBuf::from("/tmp/state.json"),
            mixpanel: None,
        }
    }

    #[test]
    fn selector_parsing() {
        assert_eq!(
            ProviderKind::from_selector("mixpanel"),
            Some(ProviderKind::Mixpanel)
        );
        assert_eq!(
            ProviderKind::from_selector("console"),
            Some(ProviderKind::Console)
        );
        assert_eq!(ProviderKind::from_selector("none"), None);
        assert_eq!(ProviderKind::from_selector("amplitude"), None);
    }

    #[test]
    fn empty_selection_is_unconfigured() {
        let registry = ProviderRegistry::new(config_with_providers(&[]));

        let err = match registry.active() {
            Err(e) => e,
            Ok(_) => panic!("expected active() to fail"),
        };
        assert!(matches!(
            err,
            TrackingError::UnconfiguredProvider { ref selector } if selector == "none"
        ));
    }

    #[test]
    fn unknown_selector_is_unconfigured() {
        let registry = ProviderRegistry::new(config_with_providers(&["amplitude"]));

        let err = match registry.active() {
            Err(e) => e,
            Ok(_) => panic!("expected active() to fail"),
        };
        assert!(matches!(
            err,
            TrackingError::UnconfiguredProvider { ref selector } if selector == "amplitude"
        ));
    }

    #[test]
    fn none_selector_is_unconfigured() {
        let registry = ProviderRegistry::new(config_with_providers(&["none"]));

        let err = match registry.active() {
            Err(e) => e,
            Ok(_) => panic!("expected active() to fail"),
        };
        assert!(matches!(
            err,
            TrackingError::UnconfiguredProvider { ref selector } if selector == "none"
        ));
    }

    #[test]
    fn console_provider_resolves() {
        let registry = ProviderRegistry::new(config_with_providers(&["console"]));

        let providers = registry.active().unwrap();
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), "console");
    }

    #[test]
    fn instances_are_cached_across_calls() {
        let registry = ProviderRegistry::new(config_with_providers(&["console"]));

        let first = registry.active().unwrap();
        let second = registry.active().unwrap();

        assert!(Arc::ptr_eq(&first[0], &second[0]));
    }

    #[test]
    fn duplicate_selectors_resolve_once() {
        let registry = ProviderRegistry::new(config_with_providers(&["console", "console"]));

        let providers = registry.active().unwrap();
        assert_eq!(providers.len(), 1);
    }

    #[test]
    fn mixpanel_without_settings_is_unconfigured() {
        // A hand-built config can select mixpanel without its settings.
        let registry = ProviderRegistry::new(config_with_providers(&["mixpanel"]));

        let err = match registry.active() {
            Err(e) => e,
            Ok(_) => panic!("expected active() to fail"),
        };
        assert!(matches!(
            err,
            TrackingError::UnconfiguredProvider { ref selector } if selector == "mixpanel"
        ));
    }

    #[tokio::test]
    async fn mixpanel_resolves_and_shuts_down() {
        let mut config = config_with_providers(&["mixpanel", "console"]);
        config.mixpanel = Some(MixpanelConfig {
            api_url: "http://localhost:9".to_string(),
            token: "t".to_string(),
            batch_size: 50,
        });
        let registry = ProviderRegistry::new(config);

        let providers = registry.active().unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name(), "mixpanel");
        assert_eq!(providers[1].name(), "console");

        // Nothing queued, so the drain reports nothing undelivered.
        let undelivered = registry.shutdown(Duration::from_secs(1)).await;
        assert_eq!(undelivered, 0);
    }

    #[tokio::test]
    async fn shutdown_without_workers_is_noop() {
        let registry = ProviderRegistry::new(config_with_providers(&["console"]));
        let _ = registry.active().unwrap();

        let undelivered = registry.shutdown(Duration::from_millis(10)).await;
        assert_eq!(undelivered, 0);
    }
}
