//! Preference store
//!
//! Durable storage of `Settings` under a single key, with defaulting on load
//! and change notification on save.

use super::model::{Settings, SettingsPatch, StoredSettings};
use super::storage::KeyValueStore;
use crate::events::{ListenerId, Listeners};
use log::{debug, error, info, warn};
use std::sync::{Mutex, MutexGuard};

/// Key the serialized settings record lives under
pub const SETTINGS_KEY: &str = "@bt_car_settings";

pub struct PreferenceStore<S>
where
    S: KeyValueStore,
{
    storage: S,
    current: Mutex<Settings>,
    listeners: Listeners<Settings>,
}

impl<S> PreferenceStore<S>
where
    S: KeyValueStore,
{
    /// Create a store holding the built-in defaults; call `load` to read persisted data
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            current: Mutex::new(Settings::default()),
            listeners: Listeners::new(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn current(&self) -> MutexGuard<'_, Settings> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read persisted settings, merged onto the defaults.
    ///
    /// Missing or unreadable data yields the defaults. The result becomes the
    /// in-memory snapshot.
    pub fn load(&self) -> Settings {
        let loaded = match self.storage.get(SETTINGS_KEY) {
            Ok(Some(json)) => match serde_json::from_str::<StoredSettings>(&json) {
                Ok(stored) => {
                    info!("✓ Settings loaded");
                    Settings::from_stored(stored)
                }
                Err(e) => {
                    warn!("Failed to parse stored settings, using defaults: {}", e);
                    Settings::default()
                }
            },
            Ok(None) => {
                debug!("No stored settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                error!("Failed to load settings: {}", e);
                Settings::default()
            }
        };

        *self.current() = loaded.clone();
        loaded
    }

    /// Merge `patch` onto the current settings, persist and notify.
    ///
    /// The snapshot only changes once the record is persisted; on failure it
    /// is left as it was and false is returned.
    pub fn save(&self, patch: SettingsPatch) -> bool {
        let saved = {
            let mut current = self.current();
            let merged = current.clone().apply(patch);

            let json = match serde_json::to_string(&merged) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize settings: {}", e);
                    return false;
                }
            };

            if let Err(e) = self.storage.set(SETTINGS_KEY, &json) {
                error!("Failed to save settings: {}", e);
                return false;
            }

            *current = merged.clone();
            merged
        };

        debug!("Settings saved: {:?}", saved);
        self.listeners.emit(&saved);
        true
    }

    /// Restore and persist the defaults; returns the resulting snapshot
    pub fn reset(&self) -> Settings {
        info!("Resetting settings to defaults");
        self.save(Settings::default().into());
        self.get()
    }

    /// Current snapshot, no I/O
    pub fn get(&self) -> Settings {
        self.current().clone()
    }

    /// Subscribe to settings changes
    pub fn add_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Settings) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::model::{ControlMode, Direction};
    use crate::settings::storage::MemoryStore;
    use std::sync::Arc;

    #[test]
    fn test_load_without_data_gives_defaults() {
        let store = PreferenceStore::new(MemoryStore::new());
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_load_corrupt_data_gives_defaults() {
        let storage = MemoryStore::new();
        storage.insert_raw(SETTINGS_KEY, "{not json");
        let store = PreferenceStore::new(storage);

        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_load_wrong_types_gives_defaults() {
        let storage = MemoryStore::new();
        storage.insert_raw(SETTINGS_KEY, r#"{"vibrationEnabled":"yes"}"#);
        let store = PreferenceStore::new(storage);

        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn test_failed_save_keeps_snapshot() {
        let storage = MemoryStore::new();
        let store = PreferenceStore::new(storage.clone());
        let notified = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&notified);
        store.add_listener(move |_| *counter.lock().unwrap() += 1);

        storage.set_fail_writes(true);
        assert!(!store.save(SettingsPatch::default().mode(ControlMode::Switch)));

        assert_eq!(store.get().control_mode, ControlMode::Continuous);
        assert_eq!(*notified.lock().unwrap(), 0);
        assert_eq!(storage.raw(SETTINGS_KEY), None);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let store = PreferenceStore::new(MemoryStore::new());
        let mapping = Settings::default().button_mapping.with(Direction::Stop, "X");
        assert!(store.save(SettingsPatch::default().vibration(false).mapping(mapping)));

        assert_eq!(store.reset(), Settings::default());
        assert_eq!(store.load(), Settings::default());
    }
}
