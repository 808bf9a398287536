//! Remote buttons and their Samsung key codes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

/// A button on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TvCommand {
    PowerToggle,
    Home,
    Back,
    Up,
    Down,
    Left,
    Right,
    Select,
    VolumeUp,
    VolumeDown,
    Mute,
    PlayPause,
    Next,
    Previous,
}

impl TvCommand {
    /// Every command, in remote-layout order.
    pub const ALL: [TvCommand; 14] = [
        TvCommand::PowerToggle,
        TvCommand::Home,
        TvCommand::Back,
        TvCommand::Up,
        TvCommand::Down,
        TvCommand::Left,
        TvCommand::Right,
        TvCommand::Select,
        TvCommand::VolumeUp,
        TvCommand::VolumeDown,
        TvCommand::Mute,
        TvCommand::PlayPause,
        TvCommand::Next,
        TvCommand::Previous,
    ];

    /// Samsung remote key code sent in `DataOfCmd`.
    pub fn key_code(self) -> &'static str {
        match self {
            TvCommand::PowerToggle => "KEY_POWER",
            TvCommand::Home => "KEY_HOME",
            TvCommand::Back => "KEY_RETURN",
            TvCommand::Up => "KEY_UP",
            TvCommand::Down => "KEY_DOWN",
            TvCommand::Left => "KEY_LEFT",
            TvCommand::Right => "KEY_RIGHT",
            TvCommand::Select => "KEY_ENTER",
            TvCommand::VolumeUp => "KEY_VOLUP",
            TvCommand::VolumeDown => "KEY_VOLDOWN",
            TvCommand::Mute => "KEY_MUTE",
            TvCommand::PlayPause => "KEY_PLAY",
            TvCommand::Next => "KEY_FF",
            TvCommand::Previous => "KEY_REWIND",
        }
    }

    /// Kebab-case name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            TvCommand::PowerToggle => "power-toggle",
            TvCommand::Home => "home",
            TvCommand::Back => "back",
            TvCommand::Up => "up",
            TvCommand::Down => "down",
            TvCommand::Left => "left",
            TvCommand::Right => "right",
            TvCommand::Select => "select",
            TvCommand::VolumeUp => "volume-up",
            TvCommand::VolumeDown => "volume-down",
            TvCommand::Mute => "mute",
            TvCommand::PlayPause => "play-pause",
            TvCommand::Next => "next",
            TvCommand::Previous => "previous",
        }
    }
}

impl fmt::Display for TvCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TvCommand {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        TvCommand::ALL
            .into_iter()
            .find(|cmd| cmd.name() == wanted || cmd.key_code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RemoteError::UnknownCommand {
                name: s.to_string(),
            })
    }
}
