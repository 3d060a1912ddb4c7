//! Key Combinations
//!
//! Canonical form for shortcut key strings and the global hotkey binding.
//!
//! A canonical key string is the modifier symbols in the fixed order
//! Control, Option, Shift, Command (`⌃⌥⇧⌘`) followed by the main key,
//! e.g. `⇧⌘S` or `⌃⌥↩`. Word forms such as `Cmd+Shift+S` or `ctrl-alt-del`
//! are accepted on input.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Modifier set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const CONTROL: Modifiers = Modifiers(1 << 0);
    pub const OPTION: Modifiers = Modifiers(1 << 1);
    pub const SHIFT: Modifiers = Modifiers(1 << 2);
    pub const COMMAND: Modifiers = Modifiers(1 << 3);

    /// Display order for canonical strings
    const ORDER: [(Modifiers, char); 4] = [
        (Modifiers::CONTROL, '⌃'),
        (Modifiers::OPTION, '⌥'),
        (Modifiers::SHIFT, '⇧'),
        (Modifiers::COMMAND, '⌘'),
    ];

    // macOS event modifier flag bits, used for the persisted hotkey mask
    const MASK_SHIFT: u64 = 1 << 17;
    const MASK_CONTROL: u64 = 1 << 18;
    const MASK_OPTION: u64 = 1 << 19;
    const MASK_COMMAND: u64 = 1 << 20;

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Modifiers) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Symbols in canonical order
    pub fn symbols(self) -> String {
        Self::ORDER
            .iter()
            .filter(|(m, _)| self.contains(*m))
            .map(|(_, c)| *c)
            .collect()
    }

    fn from_symbol(c: char) -> Option<Modifiers> {
        Self::ORDER.iter().find(|(_, s)| *s == c).map(|(m, _)| *m)
    }

    fn from_word(word: &str) -> Option<Modifiers> {
        match word.to_lowercase().as_str() {
            "ctrl" | "control" | "ctl" | "^" | "⌃" => Some(Modifiers::CONTROL),
            "alt" | "opt" | "option" | "⌥" => Some(Modifiers::OPTION),
            "shift" | "⇧" => Some(Modifiers::SHIFT),
            "cmd" | "command" | "meta" | "super" | "win" | "⌘" => Some(Modifiers::COMMAND),
            _ => None,
        }
    }

    /// Encode as a macOS-style modifier flag mask
    pub fn to_mask(self) -> u64 {
        let mut mask = 0;
        if self.contains(Modifiers::SHIFT) {
            mask |= Self::MASK_SHIFT;
        }
        if self.contains(Modifiers::CONTROL) {
            mask |= Self::MASK_CONTROL;
        }
        if self.contains(Modifiers::OPTION) {
            mask |= Self::MASK_OPTION;
        }
        if self.contains(Modifiers::COMMAND) {
            mask |= Self::MASK_COMMAND;
        }
        mask
    }

    /// Decode a modifier flag mask, ignoring unrelated bits
    pub fn from_mask(mask: u64) -> Self {
        let mut mods = Modifiers::NONE;
        if mask & Self::MASK_SHIFT != 0 {
            mods.insert(Modifiers::SHIFT);
        }
        if mask & Self::MASK_CONTROL != 0 {
            mods.insert(Modifiers::CONTROL);
        }
        if mask & Self::MASK_OPTION != 0 {
            mods.insert(Modifiers::OPTION);
        }
        if mask & Self::MASK_COMMAND != 0 {
            mods.insert(Modifiers::COMMAND);
        }
        mods
    }
}

impl std::ops::BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

/// A parsed key combination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: String,
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.modifiers.symbols(), self.key)
    }
}

/// Parse a key combination in symbol or word form
pub fn parse_keys(input: &str) -> Option<KeyCombo> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let mut modifiers = Modifiers::NONE;
    let mut rest = input;

    // Leading symbol modifiers: "⇧⌘S", "⌘ + S"
    while let Some(c) = rest.chars().next() {
        match Modifiers::from_symbol(c) {
            Some(m) => {
                modifiers.insert(m);
                rest = rest[c.len_utf8()..].trim_start_matches([' ', '+']);
            }
            None => break,
        }
    }

    if rest.is_empty() {
        return None;
    }

    let tokens = split_tokens(rest)?;
    let (key, mods) = tokens.split_last()?;
    for word in mods {
        modifiers.insert(Modifiers::from_word(word)?);
    }

    let key = canonical_key(key)?;
    Some(KeyCombo { modifiers, key })
}

/// Canonical key string, or the trimmed input when it does not parse
pub fn normalize_keys(input: &str) -> String {
    match parse_keys(input) {
        Some(combo) => combo.to_string(),
        None => input.trim().to_string(),
    }
}

fn split_tokens(s: &str) -> Option<Vec<String>> {
    if s.chars().count() == 1 {
        return Some(vec![s.to_string()]);
    }

    // "Cmd++" binds the plus key
    let (body, plus_key) = match s.strip_suffix("++") {
        Some(body) => (body, true),
        None => (s, false),
    };

    let separator = if body.contains('+') {
        '+'
    } else if body.contains('-') && !body.ends_with('-') {
        // Only treat '-' as a separator when everything before the last part is a modifier
        let parts: Vec<&str> = body.split('-').collect();
        let all_mods = parts[..parts.len() - 1]
            .iter()
            .all(|p| Modifiers::from_word(p.trim()).is_some());
        if all_mods {
            '-'
        } else {
            return Some(vec![body.trim().to_string()]);
        }
    } else {
        return Some(if plus_key {
            vec![body.trim().to_string(), "+".to_string()]
        } else {
            vec![body.trim().to_string()]
        });
    };

    let mut tokens: Vec<String> = body
        .split(separator)
        .map(|t| t.trim().to_string())
        .collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return None;
    }
    if plus_key {
        tokens.push("+".to_string());
    }
    Some(tokens)
}

fn canonical_key(key: &str) -> Option<String> {
    let key = key.trim();
    let mut chars = key.chars();
    let first = chars.next()?;
    if chars.next().is_none() {
        return Some(first.to_uppercase().collect());
    }

    let named = match key.to_lowercase().as_str() {
        "return" | "enter" | "↩" => "↩",
        "esc" | "escape" | "⎋" => "⎋",
        "tab" | "⇥" => "⇥",
        "space" | "spacebar" => "Space",
        "delete" | "backspace" | "⌫" => "⌫",
        "forwarddelete" | "del" | "fwddel" | "⌦" => "⌦",
        "left" | "arrowleft" | "←" => "←",
        "right" | "arrowright" | "→" => "→",
        "up" | "arrowup" | "↑" => "↑",
        "down" | "arrowdown" | "↓" => "↓",
        "home" | "↖" => "↖",
        "end" | "↘" => "↘",
        "pageup" | "pgup" | "⇞" => "⇞",
        "pagedown" | "pgdn" | "⇟" => "⇟",
        "plus" => "+",
        "minus" => "-",
        lower => {
            if let Some(n) = lower.strip_prefix('f') {
                if let Ok(n) = n.parse::<u8>() {
                    if (1..=24).contains(&n) {
                        return Some(format!("F{}", n));
                    }
                }
            }
            return None;
        }
    };
    Some(named.to_string())
}

/// Global hotkey binding as persisted in settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyBinding {
    /// Modifier flag mask (see [`Modifiers::to_mask`])
    pub modifier_mask: u64,
    /// Virtual key code
    pub key_code: u16,
    /// Human readable form, e.g. `⇧⌘K`
    pub display: String,
}

impl HotkeyBinding {
    pub fn new(modifiers: Modifiers, key_code: u16) -> Self {
        let display = format!(
            "{}{}",
            modifiers.symbols(),
            key_name(key_code).unwrap_or("?")
        );
        Self {
            modifier_mask: modifiers.to_mask(),
            key_code,
            display,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        Modifiers::from_mask(self.modifier_mask)
    }

    /// Build a binding from a key string like `Cmd+Shift+K`
    pub fn parse(input: &str) -> Option<Self> {
        let combo = parse_keys(input)?;
        if combo.modifiers.is_empty() {
            return None;
        }
        let code = key_code(&combo.key)?;
        Some(Self::new(combo.modifiers, code))
    }
}

impl Default for HotkeyBinding {
    fn default() -> Self {
        Self::new(Modifiers::SHIFT | Modifiers::COMMAND, 40)
    }
}

/// ANSI virtual key codes and their canonical key names
const KEY_CODES: &[(u16, &str)] = &[
    (0, "A"), (1, "S"), (2, "D"), (3, "F"), (4, "H"), (5, "G"), (6, "Z"), (7, "X"),
    (8, "C"), (9, "V"), (11, "B"), (12, "Q"), (13, "W"), (14, "E"), (15, "R"),
    (16, "Y"), (17, "T"), (18, "1"), (19, "2"), (20, "3"), (21, "4"), (22, "6"),
    (23, "5"), (24, "="), (25, "9"), (26, "7"), (27, "-"), (28, "8"), (29, "0"),
    (30, "]"), (31, "O"), (32, "U"), (33, "["), (34, "I"), (35, "P"), (36, "↩"),
    (37, "L"), (38, "J"), (39, "'"), (40, "K"), (41, ";"), (42, "\\"), (43, ","),
    (44, "/"), (45, "N"), (46, "M"), (47, "."), (48, "⇥"), (49, "Space"), (50, "`"),
    (51, "⌫"), (53, "⎋"), (96, "F5"), (97, "F6"), (98, "F7"), (99, "F3"), (100, "F8"),
    (101, "F9"), (103, "F11"), (109, "F10"), (111, "F12"), (115, "↖"), (116, "⇞"),
    (117, "⌦"), (118, "F4"), (119, "↘"), (120, "F2"), (121, "⇟"), (122, "F1"),
    (123, "←"), (124, "→"), (125, "↓"), (126, "↑"),
];

/// Canonical key name for a virtual key code
pub fn key_name(code: u16) -> Option<&'static str> {
    KEY_CODES.iter().find(|(c, _)| *c == code).map(|(_, n)| *n)
}

/// Virtual key code for a canonical key name
pub fn key_code(name: &str) -> Option<u16> {
    KEY_CODES.iter().find(|(_, n)| *n == name).map(|(c, _)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_order_is_normalized() {
        assert_eq!(normalize_keys("⌘⇧S"), "⇧⌘S");
        assert_eq!(normalize_keys("⌘⌥⌃⇧T"), "⌃⌥⇧⌘T");
        assert_eq!(normalize_keys("⌘s"), "⌘S");
    }

    #[test]
    fn test_word_forms() {
        assert_eq!(normalize_keys("Cmd+Shift+S"), "⇧⌘S");
        assert_eq!(normalize_keys("ctrl-alt-delete"), "⌃⌥⌫");
        assert_eq!(normalize_keys("Command + Return"), "⌘↩");
        assert_eq!(normalize_keys("Ctrl+F5"), "⌃F5");
        assert_eq!(normalize_keys("cmd++"), "⌘+");
    }

    #[test]
    fn test_unparseable_input_is_kept() {
        assert_eq!(normalize_keys("  hold space and drag "), "hold space and drag");
        assert_eq!(normalize_keys("Hyper+Q"), "Hyper+Q");
        assert_eq!(normalize_keys(""), "");
    }

    #[test]
    fn test_modifier_mask_round_trip() {
        let mods = Modifiers::CONTROL | Modifiers::COMMAND;
        assert_eq!(Modifiers::from_mask(mods.to_mask()), mods);
        // Unrelated bits (caps lock, function) are ignored
        assert_eq!(Modifiers::from_mask(mods.to_mask() | (1 << 16) | (1 << 23)), mods);
    }

    #[test]
    fn test_hotkey_binding() {
        let binding = HotkeyBinding::default();
        assert_eq!(binding.display, "⇧⌘K");
        assert_eq!(binding.modifiers(), Modifiers::SHIFT | Modifiers::COMMAND);

        let parsed = HotkeyBinding::parse("Ctrl+Option+Space").unwrap();
        assert_eq!(parsed.key_code, 49);
        assert_eq!(parsed.display, "⌃⌥Space");

        assert!(HotkeyBinding::parse("K").is_none());
    }
}
