//! Mock transport for testing.
//!
//! This adapter keeps its devices and link state in memory and logs every
//! write instead of sending it over the air. Useful for testing the connection
//! manager and dispatcher without a radio or a car.

use super::{BluetoothAdapter, Capability, Device, DeviceLink, TransportError};
use log::info;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared state between a mock adapter, its links and the test inspecting them
#[derive(Debug, Default)]
struct MockState {
    enabled: bool,
    bonded: Vec<Device>,
    discovered: Vec<Device>,
    granted: HashSet<Capability>,
    required: Vec<Capability>,
    fail_scan: bool,
    fail_enabled_query: bool,
    fail_permissions: bool,
    unreachable: HashSet<String>,
    fail_writes: bool,
    fail_close: bool,
    open_links: HashSet<String>,
    writes: Vec<(String, String)>,
    connect_attempts: Vec<String>,
}

/// Mock Bluetooth adapter. Clones share the same state.
#[derive(Clone, Debug)]
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockAdapter {
    /// Create a powered-on adapter that grants every capability
    pub fn new() -> Self {
        let state = MockState {
            enabled: true,
            granted: [Capability::Scan, Capability::Connect, Capability::Location]
                .into_iter()
                .collect(),
            required: vec![Capability::Scan, Capability::Connect],
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A poisoned mock is still usable for inspection
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_bonded(self, device: Device) -> Self {
        self.state().bonded.push(device);
        self
    }

    pub fn with_discovered(self, device: Device) -> Self {
        self.state().discovered.push(device);
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state().enabled = enabled;
    }

    pub fn set_fail_enabled_query(&self, fail: bool) {
        self.state().fail_enabled_query = fail;
    }

    pub fn set_fail_scan(&self, fail: bool) {
        self.state().fail_scan = fail;
    }

    pub fn set_fail_permissions(&self, fail: bool) {
        self.state().fail_permissions = fail;
    }

    /// Deny a capability from now on
    pub fn deny(&self, capability: Capability) {
        self.state().granted.remove(&capability);
    }

    /// Make connection attempts to `address` fail
    pub fn set_unreachable(&self, address: &str) {
        self.state().unreachable.insert(address.to_string());
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state().fail_writes = fail;
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.state().fail_close = fail;
    }

    /// Simulate the remote end dropping the link (out of range, power loss)
    pub fn drop_link(&self, address: &str) {
        info!("[MOCK BT] Link to {} dropped", address);
        self.state().open_links.remove(address);
    }

    /// Whether a link to `address` is currently open
    pub fn is_link_open(&self, address: &str) -> bool {
        self.state().open_links.contains(address)
    }

    /// Every command written so far, as (address, payload)
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state().writes.clone()
    }

    /// Payloads written so far, in order
    pub fn written_commands(&self) -> Vec<String> {
        self.state().writes.iter().map(|(_, cmd)| cmd.clone()).collect()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    pub fn connect_attempts(&self) -> Vec<String> {
        self.state().connect_attempts.clone()
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl BluetoothAdapter for MockAdapter {
    type Link = MockLink;

    fn required_capabilities(&self) -> Vec<Capability> {
        self.state().required.clone()
    }

    fn request_capabilities(&self, capabilities: &[Capability]) -> Result<Vec<Capability>, TransportError> {
        let state = self.state();
        if state.fail_permissions {
            return Err(TransportError::Platform("permission dialog failed".into()));
        }
        Ok(capabilities
            .iter()
            .copied()
            .filter(|c| state.granted.contains(c))
            .collect())
    }

    fn is_enabled(&self) -> Result<bool, TransportError> {
        let state = self.state();
        if state.fail_enabled_query {
            return Err(TransportError::Unavailable("adapter query failed".into()));
        }
        Ok(state.enabled)
    }

    fn bonded_devices(&self) -> Result<Vec<Device>, TransportError> {
        let state = self.state();
        if state.fail_scan {
            return Err(TransportError::Scan("bonded device query failed".into()));
        }
        Ok(state.bonded.clone())
    }

    fn discover_devices(&self) -> Result<Vec<Device>, TransportError> {
        let state = self.state();
        if state.fail_scan {
            return Err(TransportError::Scan("discovery failed".into()));
        }
        info!("[MOCK BT] Discovery found {} devices", state.discovered.len());
        Ok(state.discovered.clone())
    }

    fn connect(&self, device: &Device) -> Result<MockLink, TransportError> {
        let mut state = self.state();
        state.connect_attempts.push(device.address.clone());
        if !state.enabled {
            return Err(TransportError::Unavailable("adapter is off".into()));
        }
        if state.unreachable.contains(&device.address) {
            return Err(TransportError::Connect(format!("{} did not answer", device.address)));
        }
        state.open_links.insert(device.address.clone());
        info!("[MOCK BT] Connected to {}", device.address);
        Ok(MockLink {
            address: device.address.clone(),
            state: Arc::clone(&self.state),
        })
    }
}

/// Mock channel that records writes into the adapter state
#[derive(Debug)]
pub struct MockLink {
    address: String,
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DeviceLink for MockLink {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state();
        if !state.open_links.contains(&self.address) {
            return Err(TransportError::Closed);
        }
        if state.fail_writes {
            return Err(TransportError::Write("output stream error".into()));
        }
        let payload = String::from_utf8_lossy(data).into_owned();
        info!("[MOCK BT] Write to {}: {:?}", self.address, payload);
        state.writes.push((self.address.clone(), payload));
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open_links.contains(&self.address)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state();
        if state.fail_close {
            return Err(TransportError::Platform("socket refused to close".into()));
        }
        state.open_links.remove(&self.address);
        info!("[MOCK BT] Disconnected from {}", self.address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_link_records_writes_until_dropped() {
        let adapter = MockAdapter::new();
        let device = Device::new(Some("HC-05"), "00:11:22:33:44:55", true);

        let mut link = adapter.connect(&device).unwrap();
        assert!(link.is_open());
        assert!(link.write(b"F").is_ok());

        adapter.drop_link(&device.address);
        assert!(!link.is_open());
        assert!(matches!(link.write(b"S"), Err(TransportError::Closed)));

        assert_eq!(adapter.written_commands(), vec!["F".to_string()]);
    }

    #[test]
    fn mock_filters_denied_capabilities() {
        let adapter = MockAdapter::new();
        adapter.deny(Capability::Connect);

        let granted = adapter
            .request_capabilities(&[Capability::Scan, Capability::Connect])
            .unwrap();
        assert_eq!(granted, vec![Capability::Scan]);
    }
}
