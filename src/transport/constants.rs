//! Transport constants
//!
//! UUIDs and timings for the BLE serial bridge modules (HM-10 and clones)
//! commonly fitted to hobby cars, plus the default command alphabet.

use uuid::Uuid;

// ============================================================================
// BLE Service & Characteristic UUIDs
// ============================================================================

/// Serial bridge service UUID (0xFFE0 in the Bluetooth base UUID)
pub const SERIAL_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

/// Serial bridge characteristic UUID (0xFFE1). Writes are forwarded to the
/// module's UART, which is wired to the car's microcontroller.
pub const SERIAL_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

// ============================================================================
// Timing
// ============================================================================

/// Default discovery window in seconds
pub const DEFAULT_SCAN_SECONDS: u64 = 5;

/// Haptic pulse length for an accepted control interaction
pub const HAPTIC_PULSE_MS: u64 = 50;

// ============================================================================
// Command alphabet
// ============================================================================

pub const CMD_FORWARD: &str = "F";
pub const CMD_BACKWARD: &str = "B";
pub const CMD_LEFT: &str = "L";
pub const CMD_RIGHT: &str = "R";
pub const CMD_STOP: &str = "S";
