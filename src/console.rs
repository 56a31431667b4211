//! Console front-end commands
//!
//! Parses the lines typed into the interactive front-end.

use crate::settings::{normalize_mapping_input, ControlMode, Direction, Settings, SettingsPatch};
use std::str::FromStr;

pub const HELP: &str = "\
Commands:
  scan                         list paired and nearby devices
  connect <index|address>      connect to a device from the last scan
  disconnect                   close the connection
  press <dir> / release <dir>  hold / let go of a button (continuous mode)
  tap <dir>                    toggle a direction (switch mode)
  mode <continuous|switch>     change the control mode
  vibration <on|off>           toggle haptic feedback
  map <dir> [char]             set the command sent for a direction
  reset                        restore default settings
  status                       show connection and settings
  help                         show this text
  quit                         disconnect and exit
Directions: forward, backward, left, right (map also accepts stop)";

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Scan,
    Connect(String),
    Disconnect,
    Press(Direction),
    Release(Direction),
    Tap(Direction),
    Mode(ControlMode),
    Vibration(bool),
    Map(Direction, String),
    Reset,
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or_else(|| "empty command".to_string())?;
        let arg = words.next();

        let need = || arg.ok_or_else(|| format!("'{}' needs an argument", verb));

        let command = match verb.to_ascii_lowercase().as_str() {
            "scan" => ConsoleCommand::Scan,
            "connect" => ConsoleCommand::Connect(need()?.to_string()),
            "disconnect" => ConsoleCommand::Disconnect,
            "press" => ConsoleCommand::Press(need()?.parse()?),
            "release" => ConsoleCommand::Release(need()?.parse()?),
            "tap" => ConsoleCommand::Tap(need()?.parse()?),
            "mode" => ConsoleCommand::Mode(need()?.parse()?),
            "vibration" => match need()?.to_ascii_lowercase().as_str() {
                "on" | "true" => ConsoleCommand::Vibration(true),
                "off" | "false" => ConsoleCommand::Vibration(false),
                other => return Err(format!("expected on/off, got '{}'", other)),
            },
            "map" => {
                let direction = need()?.parse()?;
                ConsoleCommand::Map(direction, words.next().unwrap_or("").to_string())
            }
            "reset" => ConsoleCommand::Reset,
            "status" => ConsoleCommand::Status,
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(format!("unknown command '{}'", other)),
        };
        Ok(command)
    }
}

impl ConsoleCommand {
    /// The settings change a command asks for, built on top of `current`.
    ///
    /// `None` for commands that do not touch the settings.
    pub fn settings_patch(&self, current: &Settings) -> Option<SettingsPatch> {
        match self {
            ConsoleCommand::Mode(mode) => Some(SettingsPatch::default().mode(*mode)),
            ConsoleCommand::Vibration(enabled) => Some(SettingsPatch::default().vibration(*enabled)),
            ConsoleCommand::Map(direction, text) => {
                let mut mapping = current.button_mapping.clone();
                mapping.set(*direction, normalize_mapping_input(text));
                Some(SettingsPatch::default().mapping(mapping))
            }
            ConsoleCommand::Reset => Some(Settings::default().into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{MemoryStore, PreferenceStore};

    #[test]
    fn parses_control_commands() {
        assert_eq!("press forward".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Press(Direction::Forward)));
        assert_eq!("TAP l".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Tap(Direction::Left)));
        assert_eq!("mode switch".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Mode(ControlMode::Switch)));
        assert_eq!("vibration off".parse::<ConsoleCommand>(), Ok(ConsoleCommand::Vibration(false)));
    }

    #[test]
    fn map_without_char_clears_the_entry() {
        assert_eq!(
            "map stop".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Map(Direction::Stop, String::new()))
        );
        assert_eq!(
            "map right x".parse::<ConsoleCommand>(),
            Ok(ConsoleCommand::Map(Direction::Right, "x".to_string()))
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<ConsoleCommand>().is_err());
        assert!("connect".parse::<ConsoleCommand>().is_err());
        assert!("press up".parse::<ConsoleCommand>().is_err());
        assert!("fly".parse::<ConsoleCommand>().is_err());
    }

    #[test]
    fn every_settings_command_reports_a_failed_save() {
        let storage = MemoryStore::new();
        let prefs = PreferenceStore::new(storage.clone());
        storage.set_fail_writes(true);

        let commands = ["mode switch", "vibration off", "map left a", "reset"];
        for line in commands {
            let command = line.parse::<ConsoleCommand>().unwrap();
            let patch = command.settings_patch(&prefs.get()).expect("settings command");
            assert!(!prefs.save(patch), "{} should fail", line);
        }

        storage.set_fail_writes(false);
        let patch = "map left xa".parse::<ConsoleCommand>().unwrap().settings_patch(&prefs.get()).unwrap();
        assert!(prefs.save(patch));
        assert_eq!(prefs.get().button_mapping.command(Direction::Left), "A");
    }

    #[test]
    fn non_settings_commands_have_no_patch() {
        assert!(ConsoleCommand::Scan.settings_patch(&Settings::default()).is_none());
        assert!(ConsoleCommand::Tap(Direction::Left).settings_patch(&Settings::default()).is_none());
    }
}
