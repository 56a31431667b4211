//! Connection manager
//!
//! Owns the single active link to the car and mediates all command traffic.
//! Every platform failure is caught here, logged, and turned into a boolean
//! result plus (where relevant) a `ConnectionEvent` for the subscribers.

use crate::events::{ListenerId, Listeners};
use crate::transport::{BluetoothAdapter, Device, DeviceLink};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Payload of the `Disconnected` event emitted when a dead link is found on send
pub const LINK_LOST: &str = "Connection lost";

/// Failures reported to subscribers through `ConnectionEvent::Error`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Bluetooth permissions were not granted")]
    PermissionDenied,

    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(String),

    #[error("Device scan failed: {0}")]
    ScanFailed(String),

    #[error("Could not connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    #[error("Connection to the device was lost")]
    LinkLost,

    #[error("Failed to write command: {0}")]
    WriteFailed(String),
}

/// Lifecycle events fanned out to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// A link was opened to this device
    Connected(Device),
    /// The link closed; carries the device name, or `LINK_LOST`
    Disconnected(String),
    Error(ConnectionError),
}

/// Observable connection state
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(Device),
}

/// The active link and the device it belongs to
struct Active<L> {
    device: Device,
    link: L,
}

struct Slot<L> {
    active: Option<Active<L>>,
    connecting: bool,
}

/// Manager for the single Bluetooth connection to the car
pub struct ConnectionManager<A>
where
    A: BluetoothAdapter,
{
    adapter: A,
    slot: Mutex<Slot<A::Link>>,
    listeners: Listeners<ConnectionEvent>,
}

impl<A> ConnectionManager<A>
where
    A: BluetoothAdapter,
{
    /// Create a new connection manager on top of `adapter`
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            slot: Mutex::new(Slot {
                active: None,
                connecting: false,
            }),
            listeners: Listeners::new(),
        }
    }

    /// Access the underlying adapter
    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn slot(&self) -> MutexGuard<'_, Slot<A::Link>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: ConnectionEvent) {
        debug!("Connection event: {:?}", event);
        self.listeners.emit(&event);
    }

    /// Ask the host for the capabilities it requires for scanning and connecting.
    ///
    /// The required set depends on the host platform version; this only
    /// reports whether all of it was granted.
    pub fn request_permissions(&self) -> bool {
        let required = self.adapter.required_capabilities();
        match self.adapter.request_capabilities(&required) {
            Ok(granted) => {
                let granted: HashSet<_> = granted.into_iter().collect();
                let missing: Vec<_> = required.iter().filter(|c| !granted.contains(*c)).collect();
                if missing.is_empty() {
                    info!("✓ Bluetooth permissions granted");
                    true
                } else {
                    warn!("{}: missing {:?}", ConnectionError::PermissionDenied, missing);
                    false
                }
            }
            Err(e) => {
                warn!("Permission request failed: {}", e);
                false
            }
        }
    }

    /// Whether the radio is on. Query errors count as "off".
    pub fn is_adapter_enabled(&self) -> bool {
        match self.adapter.is_enabled() {
            Ok(enabled) => enabled,
            Err(e) => {
                error!("{}", ConnectionError::AdapterUnavailable(e.to_string()));
                false
            }
        }
    }

    /// Paired devices followed by freshly discovered ones, one entry per address.
    ///
    /// Returns an empty list if either source fails.
    pub fn scan_devices(&self) -> Vec<Device> {
        let scanned = self
            .adapter
            .bonded_devices()
            .and_then(|paired| Ok((paired, self.adapter.discover_devices()?)));

        let (paired, discovered) = match scanned {
            Ok(lists) => lists,
            Err(e) => {
                error!("{}", ConnectionError::ScanFailed(e.to_string()));
                return Vec::new();
            }
        };

        let mut seen = HashSet::new();
        let devices: Vec<Device> = paired
            .into_iter()
            .chain(discovered)
            .filter(|d| seen.insert(d.address.clone()))
            .collect();

        info!("Found {} devices", devices.len());
        devices
    }

    fn refuse_connect(&self, device: &Device, reason: &str) -> bool {
        let err = ConnectionError::ConnectFailed {
            address: device.address.clone(),
            reason: reason.to_string(),
        };
        error!("{}", err);
        self.emit(ConnectionEvent::Error(err));
        false
    }

    /// Open a link to `device`.
    ///
    /// An already active link is closed first (subscribers see its
    /// `Disconnected`), so at most one connection exists at any time. A
    /// connect issued while another attempt is in flight is refused.
    pub fn connect(&self, device: &Device) -> bool {
        let replaced = {
            let mut slot = self.slot();
            if slot.connecting {
                drop(slot);
                return self.refuse_connect(device, "another connection attempt is in progress");
            }

            let closed = slot.active.as_mut().map(|active| active.link.close());
            let replaced = match closed {
                Some(Err(e)) => {
                    drop(slot);
                    error!("Failed to disconnect: {}", e);
                    return self.refuse_connect(device, "the active connection could not be closed");
                }
                Some(Ok(())) => slot.active.take().map(|a| a.device.display_name().to_string()),
                None => None,
            };

            // Claimed under the same lock that cleared the old link
            slot.connecting = true;
            replaced
        };

        if let Some(name) = replaced {
            info!("Disconnected from {} to connect to {}", name, device.address);
            self.emit(ConnectionEvent::Disconnected(name));
        }

        info!("Connecting to {} ({})...", device.display_name(), device.address);
        let result = self.adapter.connect(device);

        let mut slot = self.slot();
        slot.connecting = false;
        match result {
            Ok(link) => {
                slot.active = Some(Active {
                    device: device.clone(),
                    link,
                });
                drop(slot);
                info!("✓ Connected to {}", device.display_name());
                self.emit(ConnectionEvent::Connected(device.clone()));
                true
            }
            Err(e) => {
                drop(slot);
                let err = ConnectionError::ConnectFailed {
                    address: device.address.clone(),
                    reason: e.to_string(),
                };
                error!("{}", err);
                self.emit(ConnectionEvent::Error(err));
                false
            }
        }
    }

    /// Close the active link. Returns false if there was none, or if the
    /// platform refused to close it (the link is then kept).
    pub fn disconnect(&self) -> bool {
        let mut slot = self.slot();
        let Some(active) = slot.active.as_mut() else {
            debug!("Disconnect requested with no active connection");
            return false;
        };

        if let Err(e) = active.link.close() {
            error!("Failed to disconnect: {}", e);
            return false;
        }

        let name = slot
            .active
            .take()
            .map(|a| a.device.display_name().to_string())
            .unwrap_or_default();
        drop(slot);

        info!("Disconnected from {}", name);
        self.emit(ConnectionEvent::Disconnected(name));
        true
    }

    /// Write a command to the car.
    ///
    /// A link that reports itself closed is dropped and announced once as
    /// `Disconnected(LINK_LOST)`; a write error only returns false.
    pub fn send_command(&self, command: &str) -> bool {
        let mut slot = self.slot();
        let Some(active) = slot.active.as_mut() else {
            warn!("No device connected, dropping command {:?}", command);
            return false;
        };

        if !active.link.is_open() {
            warn!("{}", ConnectionError::LinkLost);
            slot.active = None;
            drop(slot);
            self.emit(ConnectionEvent::Disconnected(LINK_LOST.to_string()));
            return false;
        }

        match active.link.write(command.as_bytes()) {
            Ok(()) => {
                debug!("Command sent: {:?}", command);
                true
            }
            Err(e) => {
                error!("{}", ConnectionError::WriteFailed(e.to_string()));
                false
            }
        }
    }

    /// True iff a link is active and still reports itself open
    pub fn is_connected(&self) -> bool {
        self.slot()
            .active
            .as_ref()
            .map(|a| a.link.is_open())
            .unwrap_or(false)
    }

    /// The device behind the active link, if any
    pub fn connected_device(&self) -> Option<Device> {
        self.slot().active.as_ref().map(|a| a.device.clone())
    }

    pub fn state(&self) -> ConnectionState {
        let slot = self.slot();
        match (&slot.active, slot.connecting) {
            (_, true) => ConnectionState::Connecting,
            (Some(active), false) => ConnectionState::Connected(active.device.clone()),
            (None, false) => ConnectionState::Disconnected,
        }
    }

    /// Subscribe to connection events
    pub fn add_listener<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Disconnect (if connected) and drop every subscriber. Used at shutdown.
    pub fn cleanup(&self) {
        self.disconnect();
        self.listeners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Capability, MockAdapter};
    use std::sync::Arc;

    fn hc05() -> Device {
        Device::new(Some("HC-05"), "00:11:22:33:44:55", true)
    }

    fn recorder(manager: &ConnectionManager<MockAdapter>) -> Arc<Mutex<Vec<ConnectionEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        manager.add_listener(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    #[test]
    fn permissions_require_the_full_set() {
        let manager = ConnectionManager::new(MockAdapter::new());
        assert!(manager.request_permissions());

        manager.adapter().deny(Capability::Scan);
        assert!(!manager.request_permissions());
    }

    #[test]
    fn optional_capability_denial_is_tolerated() {
        let manager = ConnectionManager::new(MockAdapter::new());
        manager.adapter().deny(Capability::Location);
        assert!(manager.request_permissions());
    }

    #[test]
    fn permission_errors_fail_soft() {
        let manager = ConnectionManager::new(MockAdapter::new());
        manager.adapter().set_fail_permissions(true);
        assert!(!manager.request_permissions());
    }

    #[test]
    fn adapter_query_error_reads_as_disabled() {
        let manager = ConnectionManager::new(MockAdapter::new());
        assert!(manager.is_adapter_enabled());

        manager.adapter().set_fail_enabled_query(true);
        assert!(!manager.is_adapter_enabled());
    }

    #[test]
    fn connect_tracks_connecting_state() {
        let manager = ConnectionManager::new(MockAdapter::new());
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        assert!(manager.connect(&hc05()));
        assert_eq!(manager.state(), ConnectionState::Connected(hc05()));
        assert_eq!(manager.connected_device(), Some(hc05()));
    }

    #[test]
    fn failed_disconnect_keeps_the_link() {
        let manager = ConnectionManager::new(MockAdapter::new());
        let events = recorder(&manager);
        assert!(manager.connect(&hc05()));

        manager.adapter().set_fail_close(true);
        assert!(!manager.disconnect());
        assert!(manager.is_connected());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn connect_is_refused_when_old_link_will_not_close() {
        let manager = ConnectionManager::new(MockAdapter::new());
        let events = recorder(&manager);
        let other = Device::new(Some("RC-CAR"), "98:D3:31:F5:2A:10", false);
        assert!(manager.connect(&hc05()));

        manager.adapter().set_fail_close(true);
        assert!(!manager.connect(&other));
        assert_eq!(manager.connected_device(), Some(hc05()));
        assert!(matches!(events.lock().unwrap().last(), Some(ConnectionEvent::Error(_))));
    }

    #[test]
    fn connect_during_a_pending_connect_is_refused() {
        let manager = Arc::new(ConnectionManager::new(MockAdapter::new()));
        let other = Device::new(Some("RC-CAR"), "98:D3:31:F5:2A:10", false);
        let third = Device::new(None, "5C:F3:70:8B:11:02", false);
        assert!(manager.connect(&hc05()));

        // The replaced link's Disconnected fires while the new attempt holds the slot
        let nested = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&manager);
        let results = Arc::clone(&nested);
        let pending = third.clone();
        manager.add_listener(move |e| {
            if let ConnectionEvent::Disconnected(_) = e {
                assert_eq!(inner.state(), ConnectionState::Connecting);
                results.lock().unwrap().push(inner.connect(&pending));
            }
        });

        assert!(manager.connect(&other));
        assert_eq!(*nested.lock().unwrap(), vec![false]);
        assert_eq!(manager.connected_device(), Some(other.clone()));
        assert!(!manager.adapter().is_link_open(&hc05().address));
        assert!(!manager.adapter().connect_attempts().contains(&third.address));
    }

    #[test]
    fn cleanup_disconnects_and_drops_listeners() {
        let manager = ConnectionManager::new(MockAdapter::new());
        let events = recorder(&manager);
        assert!(manager.connect(&hc05()));

        manager.cleanup();
        assert!(!manager.is_connected());
        assert_eq!(events.lock().unwrap().len(), 2);

        manager.connect(&hc05());
        assert_eq!(events.lock().unwrap().len(), 2);
    }
}
