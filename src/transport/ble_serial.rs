//! BLE serial bridge transport
//!
//! This module drives HM-10 style serial bridges through btleplug. The bridge
//! exposes a single characteristic whose writes come out of the module's UART,
//! which makes it behave like the classic serial socket the car expects.
//!
//! btleplug is async; the adapter owns a tokio runtime and blocks on it so the
//! rest of the crate can stay synchronous.

use super::constants::*;
use super::{BluetoothAdapter, Capability, Device, DeviceLink, TransportError};
use btleplug::api::{Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Runtime;
use uuid::Uuid;

/// Options for the BLE serial transport
#[derive(Debug, Clone)]
pub struct BleSerialOptions {
    /// How long a discovery runs
    pub scan_duration: Duration,

    /// Service advertised by the bridge
    pub service_uuid: Uuid,

    /// Characteristic the commands are written to
    pub characteristic_uuid: Uuid,
}

impl BleSerialOptions {
    /// The command characteristic, and only under the configured service
    fn is_serial_channel(&self, characteristic: &Characteristic) -> bool {
        characteristic.service_uuid == self.service_uuid && characteristic.uuid == self.characteristic_uuid
    }
}

impl Default for BleSerialOptions {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(DEFAULT_SCAN_SECONDS),
            service_uuid: SERIAL_SERVICE_UUID,
            characteristic_uuid: SERIAL_CHARACTERISTIC_UUID,
        }
    }
}

/// Bluetooth adapter backed by the first btleplug adapter on the host
pub struct BleSerialAdapter {
    runtime: Arc<Runtime>,
    adapter: Adapter,
    options: BleSerialOptions,
    /// Peripherals seen so far, by address, so `connect` can find them again
    peripherals: Mutex<HashMap<String, Peripheral>>,
}

impl BleSerialAdapter {
    /// Open the first Bluetooth adapter on the host
    pub fn new(options: BleSerialOptions) -> Result<Self, TransportError> {
        let runtime = Runtime::new()
            .map_err(|e| TransportError::Platform(format!("failed to start async runtime: {}", e)))?;

        let adapter = runtime.block_on(async {
            let manager = Manager::new().await?;
            let adapters = manager.adapters().await?;
            adapters
                .into_iter()
                .next()
                .ok_or_else(|| TransportError::Unavailable("No Bluetooth adapters found".into()))
        })?;

        info!("Using Bluetooth adapter for serial bridge {}", options.service_uuid);

        Ok(Self {
            runtime: Arc::new(runtime),
            adapter,
            options,
            peripherals: Mutex::new(HashMap::new()),
        })
    }

    fn remember(&self, address: &str, peripheral: &Peripheral) {
        if let Ok(mut known) = self.peripherals.lock() {
            known.insert(address.to_string(), peripheral.clone());
        }
    }

    fn lookup(&self, address: &str) -> Option<Peripheral> {
        self.peripherals.lock().ok()?.get(address).cloned()
    }

    async fn find_by_address(&self, address: &str) -> Result<Option<Peripheral>, TransportError> {
        for peripheral in self.adapter.peripherals().await? {
            if peripheral.address().to_string().eq_ignore_ascii_case(address) {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    async fn scan_window(&self) -> Result<Vec<PeripheralId>, TransportError> {
        let known: HashSet<PeripheralId> = self
            .adapter
            .peripherals()
            .await?
            .iter()
            .map(|p| p.id())
            .collect();

        let mut events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![self.options.service_uuid],
            })
            .await?;

        let mut found = Vec::new();
        let deadline = tokio::time::Instant::now() + self.options.scan_duration;
        loop {
            match tokio::time::timeout_at(deadline, events.next()).await {
                Ok(Some(CentralEvent::DeviceDiscovered(id))) => {
                    if !known.contains(&id) && !found.contains(&id) {
                        debug!("Discovered peripheral {:?}", id);
                        found.push(id);
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
        Ok(found)
    }
}

/// Unknown and powered-off radios both count as off
fn radio_is_on(state: &CentralState) -> bool {
    *state == CentralState::PoweredOn
}

async fn describe(peripheral: &Peripheral, is_paired: bool) -> Result<Device, TransportError> {
    let properties = peripheral.properties().await?;
    let name = properties.as_ref().and_then(|p| p.local_name.clone());
    let address = properties
        .map(|p| p.address)
        .unwrap_or_else(|| peripheral.address())
        .to_string();
    Ok(Device {
        name,
        address,
        is_paired,
    })
}

impl BluetoothAdapter for BleSerialAdapter {
    type Link = BleSerialLink;

    fn required_capabilities(&self) -> Vec<Capability> {
        vec![Capability::Scan, Capability::Connect]
    }

    fn request_capabilities(&self, capabilities: &[Capability]) -> Result<Vec<Capability>, TransportError> {
        // Desktop stacks have no runtime grant prompt: an adapter we can talk to is the grant
        let info = self.runtime.block_on(self.adapter.adapter_info())?;
        debug!("Adapter info: {}", info);
        Ok(capabilities.to_vec())
    }

    fn is_enabled(&self) -> Result<bool, TransportError> {
        let state = self.runtime.block_on(self.adapter.adapter_state())?;
        debug!("Adapter state: {:?}", state);
        Ok(radio_is_on(&state))
    }

    fn bonded_devices(&self) -> Result<Vec<Device>, TransportError> {
        self.runtime.block_on(async {
            let mut devices = Vec::new();
            for peripheral in self.adapter.peripherals().await? {
                let device = describe(&peripheral, true).await?;
                self.remember(&device.address, &peripheral);
                devices.push(device);
            }
            Ok::<_, TransportError>(devices)
        })
    }

    fn discover_devices(&self) -> Result<Vec<Device>, TransportError> {
        self.runtime.block_on(async {
            info!("Scanning for {} seconds...", self.options.scan_duration.as_secs());
            let ids = self
                .scan_window()
                .await
                .map_err(|e| TransportError::Scan(e.to_string()))?;

            let mut devices = Vec::with_capacity(ids.len());
            for id in ids {
                let peripheral = self.adapter.peripheral(&id).await?;
                let device = describe(&peripheral, false).await?;
                self.remember(&device.address, &peripheral);
                devices.push(device);
            }
            info!("✓ Discovery finished, {} new devices", devices.len());
            Ok::<_, TransportError>(devices)
        })
    }

    fn connect(&self, device: &Device) -> Result<BleSerialLink, TransportError> {
        self.runtime.block_on(async {
            let peripheral = match self.lookup(&device.address) {
                Some(p) => p,
                None => self
                    .find_by_address(&device.address)
                    .await?
                    .ok_or_else(|| TransportError::Connect(format!("{} is not in range", device.address)))?,
            };

            info!("Connecting to {}...", device.address);
            peripheral
                .connect()
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;

            debug!("Discovering services...");
            peripheral
                .discover_services()
                .await
                .map_err(|e| TransportError::Connect(e.to_string()))?;

            let characteristic = peripheral
                .characteristics()
                .into_iter()
                .find(|c| self.options.is_serial_channel(c));

            let Some(characteristic) = characteristic else {
                if let Err(e) = peripheral.disconnect().await {
                    warn!("Failed to disconnect from {}: {}", device.address, e);
                }
                return Err(TransportError::Connect(
                    "serial characteristic not found on device".into(),
                ));
            };

            info!("✓ Serial channel open on {}", device.address);
            Ok(BleSerialLink {
                runtime: Arc::clone(&self.runtime),
                peripheral,
                characteristic,
            })
        })
    }
}

/// Open channel to a serial bridge
pub struct BleSerialLink {
    runtime: Arc<Runtime>,
    peripheral: Peripheral,
    characteristic: Characteristic,
}

impl DeviceLink for BleSerialLink {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        debug!("Writing {} bytes", data.len());
        self.runtime
            .block_on(
                self.peripheral
                    .write(&self.characteristic, data, WriteType::WithoutResponse),
            )
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    fn is_open(&self) -> bool {
        self.runtime
            .block_on(self.peripheral.is_connected())
            .unwrap_or(false)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.runtime.block_on(self.peripheral.disconnect())?;
        Ok(())
    }
}
