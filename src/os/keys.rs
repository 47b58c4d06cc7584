//! Key combinations
//!
//! Parses identifiers such as `"ctrl+shift+esc"` and matches them against a
//! virtual-key code plus the current modifier state. Codes are the Win32
//! virtual-key values.

use crate::core::error::OsError;

pub const VK_TAB: u16 = 0x09;
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;
pub const VK_DELETE: u16 = 0x2E;
pub const VK_LWIN: u16 = 0x5B;
pub const VK_RWIN: u16 = 0x5C;
pub const VK_F1: u16 = 0x70;
pub const VK_LSHIFT: u16 = 0xA0;
pub const VK_RSHIFT: u16 = 0xA1;
pub const VK_LCONTROL: u16 = 0xA2;
pub const VK_RCONTROL: u16 = 0xA3;
pub const VK_LMENU: u16 = 0xA4;
pub const VK_RMENU: u16 = 0xA5;

/// Modifier keys held down
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub ctrl: bool,
    /// Left Alt
    pub alt: bool,
    /// Right Alt
    pub altgr: bool,
    pub shift: bool,
    pub win: bool,
}

/// Non-modifier key of a combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Tab,
    Escape,
    Delete,
    Space,
    Letter(char),
    Digit(u8),
    Function(u8),
}

impl Key {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "tab" => return Some(Key::Tab),
            "esc" | "escape" => return Some(Key::Escape),
            "del" | "delete" => return Some(Key::Delete),
            "space" => return Some(Key::Space),
            _ => {}
        }

        let mut chars = token.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphabetic() {
                return Some(Key::Letter(c.to_ascii_uppercase()));
            }
            if let Some(d) = c.to_digit(10) {
                return Some(Key::Digit(d as u8));
            }
        }

        token
            .strip_prefix('f')
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=24).contains(n))
            .map(Key::Function)
    }

    /// Virtual-key code
    pub fn vk(self) -> u16 {
        match self {
            Key::Tab => VK_TAB,
            Key::Escape => VK_ESCAPE,
            Key::Delete => VK_DELETE,
            Key::Space => VK_SPACE,
            Key::Letter(c) => c as u16,
            Key::Digit(d) => 0x30 + d as u16,
            Key::Function(n) => VK_F1 + (n as u16 - 1),
        }
    }
}

/// Parsed hotkey combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: ModifierState,
    pub key: Option<Key>,
}

impl KeyCombo {
    /// Parse a `+`-separated identifier, case-insensitive
    pub fn parse(combination: &str) -> Result<Self, OsError> {
        let mut modifiers = ModifierState::default();
        let mut key = None;

        for raw in combination.split('+') {
            let token = raw.trim().to_ascii_lowercase();
            match token.as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "alt" => modifiers.alt = true,
                "altgr" | "alt gr" => modifiers.altgr = true,
                "shift" => modifiers.shift = true,
                "win" | "windows" => modifiers.win = true,
                other => {
                    let parsed = Key::parse(other).filter(|_| key.is_none());
                    match parsed {
                        Some(k) => key = Some(k),
                        None => {
                            return Err(OsError::UnknownKey {
                                combination: combination.to_string(),
                                key: other.to_string(),
                            })
                        }
                    }
                }
            }
        }

        let combo = Self { modifiers, key };
        if combo.key.is_none() && combo.modifier_count() != 1 {
            return Err(OsError::UnknownKey {
                combination: combination.to_string(),
                key: String::new(),
            });
        }
        Ok(combo)
    }

    fn modifier_count(&self) -> usize {
        let m = &self.modifiers;
        [m.ctrl, m.alt, m.altgr, m.shift, m.win]
            .iter()
            .filter(|held| **held)
            .count()
    }

    /// True for a bare modifier such as `"win"`
    pub fn is_modifier_only(&self) -> bool {
        self.key.is_none()
    }

    /// Whether pressing `vk` with `state` held triggers this combination.
    ///
    /// Modifiers must match exactly. AltGr is reported by the OS together with
    /// a synthetic left Ctrl, so Ctrl is ignored while AltGr is held.
    pub fn matches(&self, vk: u16, state: &ModifierState) -> bool {
        match self.key {
            Some(key) => {
                if vk != key.vk() {
                    return false;
                }
                let mut held = *state;
                if held.altgr && !self.modifiers.ctrl {
                    held.ctrl = false;
                }
                held == self.modifiers
            }
            None => modifier_of(vk).map_or(false, |m| m == self.modifiers),
        }
    }
}

/// Modifier represented by a modifier key's own code
fn modifier_of(vk: u16) -> Option<ModifierState> {
    let mut m = ModifierState::default();
    match vk {
        VK_LWIN | VK_RWIN => m.win = true,
        VK_LMENU | VK_MENU => m.alt = true,
        VK_RMENU => m.altgr = true,
        VK_LCONTROL | VK_RCONTROL | VK_CONTROL => m.ctrl = true,
        VK_LSHIFT | VK_RSHIFT | VK_SHIFT => m.shift = true,
        _ => return None,
    }
    Some(m)
}
