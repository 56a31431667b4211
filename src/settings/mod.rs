//! Settings module - user preferences, their persistence and defaults

pub mod model;
pub mod storage;
pub mod store;

pub use model::{normalize_mapping_input, ButtonMapping, ControlMode, Direction, Settings, SettingsPatch};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
pub use store::{PreferenceStore, SETTINGS_KEY};
