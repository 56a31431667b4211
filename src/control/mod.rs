//! Control module - converts control pad interactions into car commands

pub mod dispatcher;
pub mod haptics;

pub use dispatcher::{CommandDispatcher, CommandSink};
pub use haptics::{Haptics, LogHaptics, NoHaptics};
