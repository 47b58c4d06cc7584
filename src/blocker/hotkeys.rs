//! Hotkey table

/// What happens when a suppressed combination is pressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    /// Swallow the keystroke and log it
    Suppress,
    /// Stop auto-restart, drop all hooks and lock the workstation
    LockWorkstation,
    /// Swallow and send a right Alt key-up so it does not stay stuck
    ReleaseRightAlt,
}

/// One suppressed combination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyEntry {
    pub combination: &'static str,
    pub label: &'static str,
    pub action: HotkeyAction,
}

const fn suppress(combination: &'static str, label: &'static str) -> HotkeyEntry {
    HotkeyEntry {
        combination,
        label,
        action: HotkeyAction::Suppress,
    }
}

/// Combination that locks the workstation instead of being ignored
pub const SECURE_ATTENTION_COMBINATION: &str = "ctrl+alt+del";

/// Combinations suppressed while the lock screen is up
pub const LOCK_SCREEN_HOTKEYS: &[HotkeyEntry] = &[
    suppress("alt+tab", "Alt+Tab"),
    suppress("shift+alt+tab", "Shift+Alt+Tab"),
    suppress("win+tab", "Win+Tab"),
    suppress("win", "Windows Key (Standalone)"),
    suppress("win+r", "Win+R (Run)"),
    suppress("win+x", "Win+X (Quick Menu)"),
    suppress("win+s", "Win+S (Search)"),
    suppress("alt+f4", "Alt+F4"),
    suppress("ctrl+shift+esc", "Ctrl+Shift+Esc (Task Manager)"),
    HotkeyEntry {
        combination: SECURE_ATTENTION_COMBINATION,
        label: "Ctrl+Alt+Del (Security Screen)",
        action: HotkeyAction::LockWorkstation,
    },
    suppress("altgr+tab", "AltGr+Tab"),
    suppress("ctrl+esc", "Ctrl+Esc (Start Menu)"),
    suppress("ctrl+alt+esc", "Ctrl+Alt+Esc (Task Manager)"),
    HotkeyEntry {
        combination: "altgr",
        label: "AltGr (Right Alt Standalone)",
        action: HotkeyAction::ReleaseRightAlt,
    },
];

/// Combination that starts the lock screen from idle mode
pub const IDLE_TRIGGER: HotkeyEntry = suppress("win+s", "Win+S (Start Lock Screen)");

/// Look up an entry by combination
pub fn find(table: &[HotkeyEntry], combination: &str) -> Option<HotkeyEntry> {
    table.iter().copied().find(|e| e.combination == combination)
}
