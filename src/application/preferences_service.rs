// Preferences service - Parse-or-default reads, validated merged writes
use std::sync::{Arc, Mutex};

use crate::application::preference_store::PreferenceStore;
use crate::domain::preferences::{Preferences, PreferencesError, PreferencesPatch};

/// Fixed storage key for the flat JSON preferences object
pub const PREFERENCES_KEY: &str = "analytics-dashboard-preferences";

#[derive(Clone)]
pub struct PreferencesService {
    store: Arc<dyn PreferenceStore>,
    current: Arc<Mutex<Preferences>>,
}

impl PreferencesService {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        let current = read_stored(store.as_ref());
        Self {
            store,
            current: Arc::new(Mutex::new(current)),
        }
    }

    /// Re-read from the store. Never fails; falls back to defaults.
    pub fn read(&self) -> Preferences {
        let prefs = read_stored(self.store.as_ref());
        *self.lock() = prefs;
        prefs
    }

    pub fn current(&self) -> Preferences {
        *self.lock()
    }

    /// Merge, validate and persist. A failed write is logged; the in-memory
    /// preferences still change.
    pub fn update(&self, patch: &PreferencesPatch) -> Result<Preferences, PreferencesError> {
        let mut current = self.lock();
        let next = current.merged(patch);
        next.check()?;

        self.write(&next);
        *current = next;
        Ok(next)
    }

    pub fn write(&self, prefs: &Preferences) {
        let result = serde_json::to_string(prefs)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.store.set(PREFERENCES_KEY, &json));
        if let Err(e) = result {
            tracing::error!("Failed to persist preferences: {:#}", e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Preferences> {
        self.current.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn read_stored(store: &dyn PreferenceStore) -> Preferences {
    match store.get(PREFERENCES_KEY) {
        Ok(stored) => Preferences::parse_or_default(stored.as_deref()),
        Err(e) => {
            tracing::error!("Failed to read preferences, using defaults: {:#}", e);
            Preferences::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::preferences::{ChartTimeRange, Theme};
    use crate::infrastructure::preference_store::MemoryPreferenceStore;

    struct BrokenStore;

    impl PreferenceStore for BrokenStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("disk on fire")
        }

        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk on fire")
        }
    }

    #[test]
    fn test_update_persists_merged_preferences() {
        let store = Arc::new(MemoryPreferenceStore::new());
        let service = PreferencesService::new(store.clone());
        assert_eq!(service.current(), Preferences::default());

        let patch = PreferencesPatch {
            theme: Some(Theme::Dark),
            chart_time_range: Some(ChartTimeRange::SevenDays),
            ..Default::default()
        };
        let updated = service.update(&patch).unwrap();
        assert_eq!(updated.theme, Theme::Dark);
        assert_eq!(updated.max_feed_items, 100);

        let reloaded = PreferencesService::new(store);
        assert_eq!(reloaded.current(), updated);
    }

    #[test]
    fn test_invalid_update_rejected_without_writing() {
        let store = Arc::new(MemoryPreferenceStore::new());
        let service = PreferencesService::new(store.clone());
        let patch = PreferencesPatch {
            max_feed_items: Some(9),
            ..Default::default()
        };
        assert_eq!(service.update(&patch), Err(PreferencesError::MaxFeedItems(9)));
        assert_eq!(store.get(PREFERENCES_KEY).unwrap(), None);
    }

    #[test]
    fn test_malformed_store_falls_back_to_defaults() {
        let store = Arc::new(MemoryPreferenceStore::new());
        store.set(PREFERENCES_KEY, "{\"theme\": 42}").unwrap();
        let service = PreferencesService::new(store);
        assert_eq!(service.read(), Preferences::default());
    }

    #[test]
    fn test_broken_store_never_throws() {
        let service = PreferencesService::new(Arc::new(BrokenStore));
        assert_eq!(service.current(), Preferences::default());

        let patch = PreferencesPatch {
            refresh_interval_ms: Some(2000),
            ..Default::default()
        };
        assert_eq!(service.update(&patch).unwrap().refresh_interval_ms, 2000);
        assert_eq!(service.current().refresh_interval_ms, 2000);
    }
}
