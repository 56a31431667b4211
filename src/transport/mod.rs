//! Transport abstraction for the Bluetooth serial link
//!
//! This module provides a unified interface over the platform radio: capability
//! negotiation, device enumeration and a point-to-point byte channel to the car.

pub mod ble_serial;
pub mod constants;
pub mod mock;

pub use ble_serial::BleSerialAdapter;
pub use mock::{MockAdapter, MockLink};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder shown for devices that do not advertise a name
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown device";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Bluetooth adapter unavailable: {0}")]
    Unavailable(String),

    #[error("Scan failed: {0}")]
    Scan(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Channel is closed")]
    Closed,

    #[error("Platform error: {0}")]
    Platform(String),
}

impl From<btleplug::Error> for TransportError {
    fn from(e: btleplug::Error) -> Self {
        TransportError::Platform(e.to_string())
    }
}

/// Discovered or paired remote endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Advertised name, if any
    pub name: Option<String>,

    /// Hardware address, unique per device
    pub address: String,

    /// Whether the host already knew this device before scanning
    pub is_paired: bool,
}

impl Device {
    pub fn new(name: Option<&str>, address: &str, is_paired: bool) -> Self {
        Self {
            name: name.map(str::to_string),
            address: address.to_string(),
            is_paired,
        }
    }

    /// Name for display, falling back to a placeholder
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_DEVICE_NAME)
    }
}

/// Platform grants needed to discover and connect to devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Scan,
    Connect,
    Location,
}

/// Unified interface for the platform Bluetooth radio.
///
/// The required capability set depends on the host platform version; the
/// adapter reports it and the caller only cares whether it was fully granted.
pub trait BluetoothAdapter {
    type Link: DeviceLink;

    /// Capabilities that must all be granted before scanning/connecting
    fn required_capabilities(&self) -> Vec<Capability>;

    /// Ask the host for `capabilities`, returning the ones that were granted
    fn request_capabilities(&self, capabilities: &[Capability]) -> Result<Vec<Capability>, TransportError>;

    /// Whether the radio is currently powered on
    fn is_enabled(&self) -> Result<bool, TransportError>;

    /// Devices the host already knows about
    fn bonded_devices(&self) -> Result<Vec<Device>, TransportError>;

    /// Run a fresh discovery and return what it found, in discovery order
    fn discover_devices(&self) -> Result<Vec<Device>, TransportError>;

    /// Open a point-to-point channel to `device`
    fn connect(&self, device: &Device) -> Result<Self::Link, TransportError>;
}

/// An open channel to a connected device
pub trait DeviceLink {
    /// Write raw bytes to the device
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Whether the channel still reports itself open
    fn is_open(&self) -> bool;

    /// Close the channel
    fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_for_unnamed_devices() {
        let named = Device::new(Some("HC-05"), "00:11:22:33:44:55", true);
        let unnamed = Device::new(None, "AA:BB:CC:DD:EE:FF", false);

        assert_eq!(named.display_name(), "HC-05");
        assert_eq!(unnamed.display_name(), UNKNOWN_DEVICE_NAME);
    }
}
