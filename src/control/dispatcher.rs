//! Command dispatcher - turns control pad interactions into commands
//!
//! The view layer reports raw press/release/tap interactions on the four
//! directional buttons; the dispatcher decides, based on the active control
//! mode and button mapping, which commands go out to the car.

use super::haptics::Haptics;
use crate::manager::ConnectionManager;
use crate::settings::{ControlMode, Direction, Settings};
use crate::transport::constants::HAPTIC_PULSE_MS;
use crate::transport::BluetoothAdapter;
use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;

/// Anything commands can be written to
pub trait CommandSink {
    /// Send one command; true if it was written
    fn send_command(&self, command: &str) -> bool;
}

impl<A: BluetoothAdapter> CommandSink for ConnectionManager<A> {
    fn send_command(&self, command: &str) -> bool {
        ConnectionManager::send_command(self, command)
    }
}

impl<T: CommandSink + ?Sized> CommandSink for &T {
    fn send_command(&self, command: &str) -> bool {
        (**self).send_command(command)
    }
}

impl<T: CommandSink + ?Sized> CommandSink for Arc<T> {
    fn send_command(&self, command: &str) -> bool {
        (**self).send_command(command)
    }
}

/// Control pad state and command dispatch
pub struct CommandDispatcher<S, H>
where
    S: CommandSink,
    H: Haptics,
{
    sink: S,
    haptics: H,
    settings: Settings,
    enabled: bool,

    /// Button currently held down (continuous mode)
    pressed: Option<Direction>,

    /// Direction toggled on (switch mode)
    active_toggle: Option<Direction>,
}

impl<S, H> CommandDispatcher<S, H>
where
    S: CommandSink,
    H: Haptics,
{
    /// Create a disabled dispatcher; enable it once a connection exists
    pub fn new(sink: S, haptics: H, settings: Settings) -> Self {
        Self {
            sink,
            haptics,
            settings,
            enabled: false,
            pressed: None,
            active_toggle: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn pressed(&self) -> Option<Direction> {
        self.pressed
    }

    pub fn active_toggle(&self) -> Option<Direction> {
        self.active_toggle
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Enable or disable the pad. Disabling resets the visual state without
    /// sending anything.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.reset_visual_state();
        }
        self.enabled = enabled;
    }

    /// Take new settings. A control mode change resets the pad state.
    pub fn apply_settings(&mut self, settings: Settings) {
        if settings.control_mode != self.settings.control_mode {
            debug!("Control mode: {:?} -> {:?}", self.settings.control_mode, settings.control_mode);
            self.reset_visual_state();
        }
        self.settings = settings;
    }

    /// Continuous mode: a button went down
    pub fn press_in(&mut self, direction: Direction) -> bool {
        if !self.accepts(direction, ControlMode::Continuous) {
            return false;
        }

        self.pressed = Some(direction);
        self.feedback();
        self.send(direction)
    }

    /// Continuous mode: a button came back up
    pub fn press_out(&mut self, direction: Direction) -> bool {
        if !self.accepts(direction, ControlMode::Continuous) {
            return false;
        }

        if self.pressed == Some(direction) {
            self.pressed = None;
        }
        self.send(Direction::Stop)
    }

    /// Switch mode: a completed tap toggles `direction`.
    ///
    /// Tapping the active direction stops the car. Tapping another one takes
    /// over directly; no stop is sent for the one it replaces.
    pub fn tap(&mut self, direction: Direction) -> bool {
        if !self.accepts(direction, ControlMode::Switch) {
            return false;
        }

        self.feedback();
        if self.active_toggle == Some(direction) {
            self.active_toggle = None;
            return self.send(Direction::Stop);
        }

        if let Some(previous) = self.active_toggle.replace(direction) {
            trace!("Toggle {} -> {}", previous, direction);
        }
        self.send(direction)
    }

    fn accepts(&self, direction: Direction, mode: ControlMode) -> bool {
        if !self.enabled {
            trace!("Pad disabled, ignoring {}", direction);
            return false;
        }
        if self.settings.control_mode != mode {
            trace!("Ignoring {:?} interaction in {:?} mode", mode, self.settings.control_mode);
            return false;
        }
        if direction == Direction::Stop {
            debug!("Stop has no button on the pad, ignoring");
            return false;
        }
        true
    }

    fn feedback(&self) {
        if self.settings.vibration_enabled {
            self.haptics.vibrate(Duration::from_millis(HAPTIC_PULSE_MS));
        }
    }

    fn send(&self, direction: Direction) -> bool {
        // A missing mapping entry goes out as an empty command
        let command = self.settings.button_mapping.command(direction);
        debug!("{} -> {:?}", direction, command);
        self.sink.send_command(command)
    }

    fn reset_visual_state(&mut self) {
        self.pressed = None;
        self.active_toggle = None;
    }
}
