//! rc-remote: Bluetooth remote control for a toy car
//!
//! This library provides the connection manager, command dispatcher and
//! preference store behind a remote-control front-end, plus the transports
//! they run over.

pub mod config;
pub mod console;
pub mod control;
pub mod events;
pub mod manager;
pub mod settings;
pub mod transport;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError};
pub use control::{CommandDispatcher, CommandSink, Haptics};
pub use events::ListenerId;
pub use manager::{ConnectionEvent, ConnectionManager, ConnectionState, LINK_LOST};
pub use settings::{ControlMode, Direction, PreferenceStore, Settings, SettingsPatch};
pub use transport::{BluetoothAdapter, Device, DeviceLink};
