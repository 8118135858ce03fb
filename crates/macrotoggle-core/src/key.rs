//! Closed set of key identifiers.
//!
//! Accepted spellings:
//! - `Key.<name>` (`Key.ctrl_l`, `Key.f6`, `Key.enter`)
//! - a single character (`a`, `1`, `;`)
//! - a bare, case-insensitive key name (`ctrl`, `F6`, `PageDown`)

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// A printable character.
    Char(char),
    Alt,
    AltL,
    AltR,
    AltGr,
    Backspace,
    CapsLock,
    Cmd,
    CmdL,
    CmdR,
    Ctrl,
    CtrlL,
    CtrlR,
    Delete,
    Down,
    End,
    Enter,
    Esc,
    /// Function key F1..=F24.
    F(u8),
    Home,
    Insert,
    Left,
    Menu,
    NumLock,
    PageDown,
    PageUp,
    Pause,
    PrintScreen,
    Right,
    ScrollLock,
    Shift,
    ShiftL,
    ShiftR,
    Space,
    Tab,
    Up,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParseError(pub String);

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key: {:?}", self.0)
    }
}

impl std::error::Error for KeyParseError {}

impl Key {
    /// Collapse side-specific modifiers and letter case, for hotkey matching.
    pub fn canonical(self) -> Key {
        match self {
            Key::AltL | Key::AltR => Key::Alt,
            Key::CmdL | Key::CmdR => Key::Cmd,
            Key::CtrlL | Key::CtrlR => Key::Ctrl,
            Key::ShiftL | Key::ShiftR => Key::Shift,
            Key::Char(c) => Key::Char(c.to_ascii_lowercase()),
            other => other,
        }
    }

    /// Whether a key reported by the OS hook satisfies a configured key.
    ///
    /// A configured side-less modifier (`ctrl`) accepts either side; letters
    /// match regardless of case.
    pub fn matches(self, configured: Key) -> bool {
        if self == configured {
            return true;
        }
        match (self, configured) {
            (Key::Char(a), Key::Char(b)) => a.eq_ignore_ascii_case(&b),
            _ => configured == configured.canonical() && self.canonical() == configured,
        }
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self.canonical(),
            Key::Alt | Key::AltGr | Key::Cmd | Key::Ctrl | Key::Shift
        )
    }

    /// Look up a named key. `name` must already be lowercase with `_` removed.
    fn from_name(name: &str) -> Option<Key> {
        let key = match name {
            "alt" | "option" => Key::Alt,
            "altl" | "lalt" => Key::AltL,
            "altr" | "ralt" => Key::AltR,
            "altgr" => Key::AltGr,
            "backspace" | "back" => Key::Backspace,
            "capslock" | "caps" => Key::CapsLock,
            "cmd" | "meta" | "win" | "super" | "command" => Key::Cmd,
            "cmdl" | "lcmd" | "metaleft" => Key::CmdL,
            "cmdr" | "rcmd" | "metaright" => Key::CmdR,
            "ctrl" | "control" => Key::Ctrl,
            "ctrll" | "lctrl" | "lcontrol" | "controlleft" => Key::CtrlL,
            "ctrlr" | "rctrl" | "rcontrol" | "controlright" => Key::CtrlR,
            "delete" | "del" => Key::Delete,
            "down" | "downarrow" => Key::Down,
            "end" => Key::End,
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Esc,
            "home" => Key::Home,
            "insert" | "ins" => Key::Insert,
            "left" | "leftarrow" => Key::Left,
            "menu" => Key::Menu,
            "numlock" => Key::NumLock,
            "pagedown" | "pgdn" => Key::PageDown,
            "pageup" | "pgup" => Key::PageUp,
            "pause" => Key::Pause,
            "printscreen" | "prtsc" => Key::PrintScreen,
            "right" | "rightarrow" => Key::Right,
            "scrolllock" => Key::ScrollLock,
            "shift" => Key::Shift,
            "shiftl" | "lshift" | "shiftleft" => Key::ShiftL,
            "shiftr" | "rshift" | "shiftright" => Key::ShiftR,
            "space" => Key::Space,
            "tab" => Key::Tab,
            "up" | "uparrow" => Key::Up,
            _ => {
                let n: u8 = name.strip_prefix('f')?.parse().ok()?;
                if (1..=24).contains(&n) {
                    Key::F(n)
                } else {
                    return None;
                }
            }
        };
        Some(key)
    }

    fn normalize(name: &str) -> String {
        name.chars()
            .filter(|c| *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect()
    }

    /// Name used after the `Key.` prefix.
    fn name(self) -> String {
        let name = match self {
            Key::Char(c) => return c.to_string(),
            Key::Alt => "alt",
            Key::AltL => "alt_l",
            Key::AltR => "alt_r",
            Key::AltGr => "alt_gr",
            Key::Backspace => "backspace",
            Key::CapsLock => "caps_lock",
            Key::Cmd => "cmd",
            Key::CmdL => "cmd_l",
            Key::CmdR => "cmd_r",
            Key::Ctrl => "ctrl",
            Key::CtrlL => "ctrl_l",
            Key::CtrlR => "ctrl_r",
            Key::Delete => "delete",
            Key::Down => "down",
            Key::End => "end",
            Key::Enter => "enter",
            Key::Esc => "esc",
            Key::F(n) => return format!("f{n}"),
            Key::Home => "home",
            Key::Insert => "insert",
            Key::Left => "left",
            Key::Menu => "menu",
            Key::NumLock => "num_lock",
            Key::PageDown => "page_down",
            Key::PageUp => "page_up",
            Key::Pause => "pause",
            Key::PrintScreen => "print_screen",
            Key::Right => "right",
            Key::ScrollLock => "scroll_lock",
            Key::Shift => "shift",
            Key::ShiftL => "shift_l",
            Key::ShiftR => "shift_r",
            Key::Space => "space",
            Key::Tab => "tab",
            Key::Up => "up",
        };
        name.to_string()
    }
}

impl FromStr for Key {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || KeyParseError(s.to_string());

        if s == " " {
            return Ok(Key::Space);
        }
        let trimmed = s.trim();
        if let Some(name) = trimmed.strip_prefix("Key.") {
            return Key::from_name(&Key::normalize(name)).ok_or_else(err);
        }

        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Err(err()),
            (Some(c), None) => Ok(Key::Char(c)),
            _ => Key::from_name(&Key::normalize(trimmed)).ok_or_else(err),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            other => write!(f, "Key.{}", other.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixed_names() {
        assert_eq!("Key.ctrl_l".parse::<Key>().unwrap(), Key::CtrlL);
        assert_eq!("Key.f6".parse::<Key>().unwrap(), Key::F(6));
        assert_eq!("Key.page_down".parse::<Key>().unwrap(), Key::PageDown);
        assert_eq!("Key.enter".parse::<Key>().unwrap(), Key::Enter);
        assert!("Key.hyper".parse::<Key>().is_err());
        assert!("Key.f25".parse::<Key>().is_err());
    }

    #[test]
    fn test_parse_chars_and_bare_names() {
        assert_eq!("a".parse::<Key>().unwrap(), Key::Char('a'));
        assert_eq!(";".parse::<Key>().unwrap(), Key::Char(';'));
        assert_eq!(" ".parse::<Key>().unwrap(), Key::Space);
        assert_eq!("ENTER".parse::<Key>().unwrap(), Key::Enter);
        assert_eq!("Control".parse::<Key>().unwrap(), Key::Ctrl);
        assert_eq!("F12".parse::<Key>().unwrap(), Key::F(12));
        assert!("".parse::<Key>().is_err());
        assert!("banana".parse::<Key>().is_err());
    }

    #[test]
    fn test_display_round_trips_named_keys() {
        for key in [Key::CtrlL, Key::F(11), Key::PageUp, Key::Char('x')] {
            assert_eq!(key.to_string().parse::<Key>().unwrap(), key);
        }
        assert_eq!(Key::ShiftR.to_string(), "Key.shift_r");
    }

    #[test]
    fn test_canonical_and_matches() {
        assert_eq!(Key::CtrlR.canonical(), Key::Ctrl);
        assert_eq!(Key::Char('H').canonical(), Key::Char('h'));
        assert!(Key::CtrlL.matches(Key::Ctrl));
        assert!(!Key::Ctrl.matches(Key::CtrlL));
        assert!(!Key::CtrlR.matches(Key::CtrlL));
        assert!(Key::Char('a').matches(Key::Char('A')));
        assert!(!Key::F(1).matches(Key::F(2)));
        assert!(Key::ShiftL.is_modifier());
        assert!(!Key::Space.is_modifier());
    }
}
