// Rawkeys Key Type
// Physical key identifiers numbered after Linux input-event-codes.h

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Represents a single physical keyboard key.
///
/// This is a newtype wrapper around u16 for type safety. Every code is a
/// distinct key, including codes that have no display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Key(pub u16);

impl Key {
    /// Get the raw numeric code value
    pub fn code(self) -> u16 {
        self.0
    }

    /// Get the name of this key
    pub fn name(self) -> &'static str {
        key_name(self.0)
    }
}

macro_rules! named_keys {
    ($($name:ident = $code:literal),* $(,)?) => {
        #[allow(missing_docs)]
        impl Key {
            $(pub const $name: Key = Key($code);)*
        }

        const NAMED_KEYS: &[(&str, u16)] = &[$((stringify!($name), $code)),*];
    };
}

named_keys! {
    RESERVED = 0, ESC = 1,
    KEY_1 = 2, KEY_2 = 3, KEY_3 = 4, KEY_4 = 5, KEY_5 = 6,
    KEY_6 = 7, KEY_7 = 8, KEY_8 = 9, KEY_9 = 10, KEY_0 = 11,
    MINUS = 12, EQUAL = 13, BACKSPACE = 14, TAB = 15,
    Q = 16, W = 17, E = 18, R = 19, T = 20, Y = 21, U = 22, I = 23, O = 24, P = 25,
    LEFT_BRACE = 26, RIGHT_BRACE = 27, ENTER = 28, LEFT_CTRL = 29,
    A = 30, S = 31, D = 32, F = 33, G = 34, H = 35, J = 36, K = 37, L = 38,
    SEMICOLON = 39, APOSTROPHE = 40, GRAVE = 41, LEFT_SHIFT = 42, BACKSLASH = 43,
    Z = 44, X = 45, C = 46, V = 47, B = 48, N = 49, M = 50,
    COMMA = 51, DOT = 52, SLASH = 53, RIGHT_SHIFT = 54, KPASTERISK = 55,
    LEFT_ALT = 56, SPACE = 57, CAPSLOCK = 58,
    F1 = 59, F2 = 60, F3 = 61, F4 = 62, F5 = 63,
    F6 = 64, F7 = 65, F8 = 66, F9 = 67, F10 = 68,
    NUMLOCK = 69, SCROLLLOCK = 70,
    KP7 = 71, KP8 = 72, KP9 = 73, KPMINUS = 74,
    KP4 = 75, KP5 = 76, KP6 = 77, KPPLUS = 78,
    KP1 = 79, KP2 = 80, KP3 = 81, KP0 = 82, KPDOT = 83,
    KEY_102ND = 86, F11 = 87, F12 = 88,
    KPENTER = 96, RIGHT_CTRL = 97, KPSLASH = 98, SYSRQ = 99, RIGHT_ALT = 100,
    HOME = 102, UP = 103, PAGE_UP = 104, LEFT = 105, RIGHT = 106,
    END = 107, DOWN = 108, PAGE_DOWN = 109, INSERT = 110, DELETE = 111,
    MUTE = 113, VOLUMEDOWN = 114, VOLUMEUP = 115, POWER = 116,
    KPEQUAL = 117, PAUSE = 119, KPCOMMA = 121,
    LEFT_META = 125, RIGHT_META = 126, COMPOSE = 127,
    MENU = 139, CALC = 140, SLEEP = 142, WAKEUP = 143,
    NEXTSONG = 163, PLAYPAUSE = 164, PREVIOUSSONG = 165, STOPCD = 166,
    F13 = 183, F14 = 184, F15 = 185, F16 = 186, F17 = 187, F18 = 188,
    F19 = 189, F20 = 190, F21 = 191, F22 = 192, F23 = 193, F24 = 194,
}

/// Extra spellings accepted by [`key_from_name`].
const KEY_ALIASES: &[(&str, u16)] = &[
    ("ESCAPE", 1),
    ("1", 2),
    ("2", 3),
    ("3", 4),
    ("4", 5),
    ("5", 6),
    ("6", 7),
    ("7", 8),
    ("8", 9),
    ("9", 10),
    ("0", 11),
    ("RETURN", 28),
    ("PRINT", 99),
    ("PRTSCR", 99),
];

/// Display name for a key code
pub fn key_name(code: u16) -> &'static str {
    static KEY_NAMES: OnceLock<Vec<&'static str>> = OnceLock::new();
    KEY_NAMES
        .get_or_init(|| {
            let mut names = vec!["UNKNOWN"; 0x300];
            for (name, code) in NAMED_KEYS {
                names[*code as usize] = name;
            }
            names
        })
        .get(code as usize)
        .copied()
        .unwrap_or("UNKNOWN")
}

/// Try to parse a key name to a key code (case-insensitive)
pub fn key_from_name(name: &str) -> Option<Key> {
    let name_upper = name.trim().to_uppercase();
    NAMED_KEYS
        .iter()
        .chain(KEY_ALIASES)
        .find(|(n, _)| *n == name_upper)
        .map(|(_, code)| Key(*code))
}

impl From<u16> for Key {
    fn from(code: u16) -> Self {
        Key(code)
    }
}

impl From<Key> for u16 {
    fn from(key: Key) -> Self {
        key.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        key_from_name(s).ok_or_else(|| format!("Unknown key: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_name() {
        assert_eq!(key_from_name("a"), Some(Key::A));
        assert_eq!(key_from_name("SPACE"), Some(Key::from(57)));
        assert_eq!(key_from_name(" enter "), Some(Key::ENTER));
        assert_eq!(key_from_name("1"), Some(Key::KEY_1));
        assert_eq!(key_from_name("escape"), Some(Key::ESC));
        assert_eq!(key_from_name("nope"), None);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(Key::from(30).to_string(), "A");
        assert_eq!(Key::LEFT_SHIFT.to_string(), "LEFT_SHIFT");
        assert_eq!(Key::from(0x2ff).to_string(), "UNKNOWN");
        assert_eq!(Key::from(0xffff).to_string(), "UNKNOWN");
    }

    #[test]
    fn test_unnamed_codes_stay_distinct() {
        let a = Key::from(84);
        let b = Key::from(85);
        assert_eq!(a.name(), b.name());
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_parse_roundtrip_for_named_keys() {
        for (name, code) in NAMED_KEYS {
            assert_eq!(name.parse::<Key>(), Ok(Key(*code)));
        }
    }

    #[test]
    fn test_key_hash() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(Key::A, "value");
        assert_eq!(map.get(&Key::from(30)), Some(&"value"));
    }
}
