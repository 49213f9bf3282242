//! Toggle Hotkey
//!
//! Parses `keyboard`-style combos such as `ctrl+alt+shift+q`.
//! Registration itself happens on the Windows UI thread (see `alert_window`).

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("hotkey is empty")]
    Empty,
    #[error("unknown key '{0}' in hotkey")]
    UnknownKey(String),
    #[error("hotkey needs exactly one non-modifier key, found {0}")]
    KeyCount(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// `a`-`z` (stored uppercase) or `0`-`9`
    Char(char),
    /// F1-F24
    Function(u8),
    Space,
    Tab,
    Enter,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub win: bool,
    pub key: Key,
}

impl Hotkey {
    /// Windows virtual-key code of the main key
    #[cfg_attr(not(windows), allow(dead_code))]
    pub fn virtual_key(&self) -> u32 {
        match self.key {
            Key::Char(c) => c as u32,
            Key::Function(n) => 0x70 + (n as u32 - 1),
            Key::Space => 0x20,
            Key::Tab => 0x09,
            Key::Enter => 0x0D,
            Key::Escape => 0x1B,
        }
    }
}

fn parse_key(token: &str) -> Option<Key> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphanumeric() {
            return Some(Key::Char(c.to_ascii_uppercase()));
        }
        return None;
    }

    match token {
        "space" => Some(Key::Space),
        "tab" => Some(Key::Tab),
        "enter" | "return" => Some(Key::Enter),
        "esc" | "escape" => Some(Key::Escape),
        _ => token
            .strip_prefix('f')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=24).contains(n))
            .map(Key::Function),
    }
}

impl FromStr for Hotkey {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(HotkeyError::Empty);
        }

        let (mut ctrl, mut alt, mut shift, mut win) = (false, false, false, false);
        let mut keys = Vec::new();

        for token in s.split('+').map(|t| t.trim().to_lowercase()) {
            match token.as_str() {
                "ctrl" | "control" => ctrl = true,
                "alt" => alt = true,
                "shift" => shift = true,
                "win" | "windows" | "super" | "cmd" => win = true,
                other => keys.push(
                    parse_key(other).ok_or_else(|| HotkeyError::UnknownKey(other.to_string()))?,
                ),
            }
        }

        if keys.len() != 1 {
            return Err(HotkeyError::KeyCount(keys.len()));
        }

        Ok(Hotkey {
            ctrl,
            alt,
            shift,
            win,
            key: keys[0],
        })
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "ctrl+")?;
        }
        if self.alt {
            write!(f, "alt+")?;
        }
        if self.shift {
            write!(f, "shift+")?;
        }
        if self.win {
            write!(f, "win+")?;
        }
        match self.key {
            Key::Char(c) => write!(f, "{}", c.to_ascii_lowercase()),
            Key::Function(n) => write!(f, "f{}", n),
            Key::Space => write!(f, "space"),
            Key::Tab => write!(f, "tab"),
            Key::Enter => write!(f, "enter"),
            Key::Escape => write!(f, "esc"),
        }
    }
}
