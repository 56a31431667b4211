//! Haptic feedback backends
//!
//! Vibration is a side effect of accepted interactions. Backends cannot fail
//! the command path, so the trait has no error type: a backend that cannot
//! vibrate logs and carries on.

use log::{debug, info};
use std::time::Duration;

/// Host haptic capability
pub trait Haptics {
    /// Start a vibration pulse of `duration`. Must not block.
    fn vibrate(&self, duration: Duration);
}

/// Haptics for hosts without a vibration motor
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHaptics;

impl Haptics for NoHaptics {
    fn vibrate(&self, duration: Duration) {
        debug!("No haptics available, skipping {}ms pulse", duration.as_millis());
    }
}

/// Haptics backend that logs pulses instead of vibrating
#[derive(Clone, Copy, Debug, Default)]
pub struct LogHaptics;

impl Haptics for LogHaptics {
    fn vibrate(&self, duration: Duration) {
        info!("[HAPTICS] Vibrate {}ms", duration.as_millis());
    }
}

impl<T: Haptics + ?Sized> Haptics for &T {
    fn vibrate(&self, duration: Duration) {
        (**self).vibrate(duration)
    }
}

impl<T: Haptics + ?Sized> Haptics for std::sync::Arc<T> {
    fn vibrate(&self, duration: Duration) {
        (**self).vibrate(duration)
    }
}
