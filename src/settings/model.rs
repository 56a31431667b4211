//! Settings model
//!
//! The persisted preference record, the partial fragment used to update it,
//! and the merge rules that keep every direction mapped.

use crate::transport::constants::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Logical control direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

impl Direction {
    pub const ALL: [Direction; 5] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
        Direction::Stop,
    ];

    /// The four directions that have a button on the pad
    pub const MOVES: [Direction; 4] = [
        Direction::Forward,
        Direction::Backward,
        Direction::Left,
        Direction::Right,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Stop => "stop",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "f" => Ok(Direction::Forward),
            "backward" | "b" => Ok(Direction::Backward),
            "left" | "l" => Ok(Direction::Left),
            "right" | "r" => Ok(Direction::Right),
            "stop" | "s" => Ok(Direction::Stop),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Interaction model of the control pad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlMode {
    /// Press and hold: moving while the button is held
    #[default]
    Continuous,
    /// Tap to toggle a direction on and off
    Switch,
}

impl FromStr for ControlMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(ControlMode::Continuous),
            "switch" => Ok(ControlMode::Switch),
            other => Err(format!("unknown control mode '{}'", other)),
        }
    }
}

/// Direction → outbound command table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ButtonMapping(BTreeMap<Direction, String>);

impl ButtonMapping {
    /// A mapping with no entries
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    /// Command for `direction`; empty when the mapping has no entry for it
    pub fn command(&self, direction: Direction) -> &str {
        self.0.get(&direction).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, direction: Direction, command: impl Into<String>) {
        self.0.insert(direction, command.into());
    }

    pub fn with(mut self, direction: Direction, command: impl Into<String>) -> Self {
        self.set(direction, command);
        self
    }

    pub fn contains(&self, direction: Direction) -> bool {
        self.0.contains_key(&direction)
    }

    /// Overlay `other` key by key
    fn merge(&mut self, other: ButtonMapping) {
        self.0.extend(other.0);
    }
}

impl Default for ButtonMapping {
    fn default() -> Self {
        Self::empty()
            .with(Direction::Forward, CMD_FORWARD)
            .with(Direction::Backward, CMD_BACKWARD)
            .with(Direction::Left, CMD_LEFT)
            .with(Direction::Right, CMD_RIGHT)
            .with(Direction::Stop, CMD_STOP)
    }
}

/// User preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub vibration_enabled: bool,
    pub control_mode: ControlMode,
    pub button_mapping: ButtonMapping,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vibration_enabled: true,
            control_mode: ControlMode::Continuous,
            button_mapping: ButtonMapping::default(),
        }
    }
}

impl Settings {
    /// Shallow merge: every field present in `patch` replaces ours.
    /// A mapping in the patch replaces the whole mapping.
    pub fn apply(mut self, patch: SettingsPatch) -> Self {
        if let Some(vibration) = patch.vibration_enabled {
            self.vibration_enabled = vibration;
        }
        if let Some(mode) = patch.control_mode {
            self.control_mode = mode;
        }
        if let Some(mapping) = patch.button_mapping {
            self.button_mapping = mapping;
        }
        self
    }

    /// Rebuild settings from a persisted record, filling gaps from the defaults.
    /// The mapping is merged key by key so older records keep default entries.
    pub fn from_stored(stored: StoredSettings) -> Self {
        let mut settings = Settings::default();
        if let Some(vibration) = stored.vibration_enabled {
            settings.vibration_enabled = vibration;
        }
        if let Some(mode) = stored.control_mode {
            settings.control_mode = mode;
        }
        if let Some(entries) = stored.button_mapping {
            let mut partial = ButtonMapping::empty();
            for (key, command) in entries {
                match key.parse::<Direction>() {
                    Ok(direction) => partial.set(direction, command),
                    Err(e) => warn!("Ignoring stored mapping entry: {}", e),
                }
            }
            settings.button_mapping.merge(partial);
        }
        settings
    }
}

/// Partial settings fragment passed to `PreferenceStore::save`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub vibration_enabled: Option<bool>,
    pub control_mode: Option<ControlMode>,
    pub button_mapping: Option<ButtonMapping>,
}

impl SettingsPatch {
    pub fn vibration(mut self, enabled: bool) -> Self {
        self.vibration_enabled = Some(enabled);
        self
    }

    pub fn mode(mut self, mode: ControlMode) -> Self {
        self.control_mode = Some(mode);
        self
    }

    pub fn mapping(mut self, mapping: ButtonMapping) -> Self {
        self.button_mapping = Some(mapping);
        self
    }
}

impl From<Settings> for SettingsPatch {
    fn from(settings: Settings) -> Self {
        Self {
            vibration_enabled: Some(settings.vibration_enabled),
            control_mode: Some(settings.control_mode),
            button_mapping: Some(settings.button_mapping),
        }
    }
}

/// Lenient view of the persisted record: any field may be missing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSettings {
    #[serde(default)]
    pub vibration_enabled: Option<bool>,

    #[serde(default)]
    pub control_mode: Option<ControlMode>,

    #[serde(default)]
    pub button_mapping: Option<BTreeMap<String, String>>,
}

/// Normalise text typed into a mapping field: keep the last character,
/// upper-cased. Empty input stays empty.
pub fn normalize_mapping_input(input: &str) -> String {
    input
        .chars()
        .last()
        .map(|c| c.to_uppercase().collect())
        .unwrap_or_default()
}
