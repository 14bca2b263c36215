// File: src/fuzzy/phonetic.rs
use crate::core::text::fold;
use crate::core::types::BaseLocale;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

const SOUNDEX_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneticKey {
    pub locale: BaseLocale,
    pub token: String,
}

/// Both encodings of one folded token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneticCodes {
    pub soundex: String,
    pub primary: String,
    pub secondary: String,
}

impl PhoneticCodes {
    pub fn encode(locale: BaseLocale, folded: &str) -> Self {
        let (primary, secondary) = double_metaphone(folded, locale);
        Self {
            soundex: soundex(folded, locale),
            primary,
            secondary,
        }
    }
}

/// Memoization table for phonetic codes. Entries are never mutated after
/// insertion, so implementations only need to serialize writes.
pub trait PhoneticStore: Send + Sync {
    fn get(&self, key: &PhoneticKey) -> Option<PhoneticCodes>;
    fn put(&self, key: PhoneticKey, codes: PhoneticCodes);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-lifetime in-memory store; no eviction.
#[derive(Default)]
pub struct MemoryPhoneticStore {
    table: RwLock<HashMap<PhoneticKey, PhoneticCodes>>,
}

impl MemoryPhoneticStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PhoneticStore for MemoryPhoneticStore {
    fn get(&self, key: &PhoneticKey) -> Option<PhoneticCodes> {
        // Entries are write-once, so a poisoned lock still holds valid data.
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        table.get(key).cloned()
    }

    fn put(&self, key: PhoneticKey, codes: PhoneticCodes) {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        table.entry(key).or_insert(codes);
    }

    fn len(&self) -> usize {
        self.table.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Letter class for the soundex-family encoder. `'0'` is a separator.
/// Spanish keeps sibilants (s, z) and the jota apart from velar stops.
fn letter_code(ch: char, locale: BaseLocale) -> char {
    match (locale, ch) {
        (_, 'b' | 'f' | 'p' | 'v') => '1',
        (BaseLocale::Es, 'w') => '1',
        (BaseLocale::Es, 's' | 'z') => '7',
        (BaseLocale::Es, 'j') => '8',
        (_, 'c' | 'g' | 'j' | 'k' | 'q' | 's' | 'x' | 'z') => '2',
        (_, 'd' | 't') => '3',
        (_, 'l') => '4',
        (_, 'm' | 'n') => '5',
        (_, 'r') => '6',
        _ => '0',
    }
}

/// Fixed-width soundex code; first letter preserved (uppercased).
pub fn soundex(value: &str, locale: BaseLocale) -> String {
    let folded: String = fold(value).chars().filter(|c| !c.is_whitespace()).collect();
    let mut chars = folded.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut result: String = first.to_uppercase().collect();
    let mut previous = letter_code(first, locale);
    for ch in chars {
        let code = letter_code(ch, locale);
        if code != '0' && code != previous {
            result.push(code);
        }
        previous = code;
    }
    let mut result: String = result.chars().take(SOUNDEX_LEN).collect();
    while result.chars().count() < SOUNDEX_LEN {
        result.push('0');
    }
    result
}

fn is_vowel(ch: Option<char>) -> bool {
    matches!(ch, Some('a' | 'e' | 'i' | 'o' | 'u' | 'y'))
}

fn is_front_vowel(ch: Option<char>) -> bool {
    matches!(ch, Some('e' | 'i' | 'y'))
}

#[derive(Default)]
struct MetaphoneBuf {
    primary: String,
    secondary: String,
}

impl MetaphoneBuf {
    fn push(&mut self, p: &str, s: &str) {
        self.primary.push_str(p);
        self.secondary.push_str(s);
    }
}

/// Lightweight double-metaphone. Primary follows the locale's usual reading;
/// secondary records the most common alternative pronunciation.
pub fn double_metaphone(value: &str, locale: BaseLocale) -> (String, String) {
    let input: Vec<char> = fold(value).chars().filter(|c| !c.is_whitespace()).collect();
    if input.is_empty() {
        return (String::new(), String::new());
    }

    let mut out = MetaphoneBuf::default();

    let mut i = 0;
    while i < input.len() {
        let ch = input[i];
        let next = input.get(i + 1).copied();
        let prev = if i > 0 { input.get(i - 1).copied() } else { None };

        if Some(ch) == next && ch != 'c' {
            // Spanish "ll" is usually pronounced like "y".
            if ch == 'l' && locale == BaseLocale::Es {
                out.push("l", "y");
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }

        match ch {
            'p' if next == Some('h') => {
                out.push("f", "f");
                i += 2;
                continue;
            }
            'p' => out.push("p", "p"),
            'b' | 'v' | 'w' => out.push("b", "b"),
            'c' if next == Some('h') => {
                out.push("x", "x");
                i += 2;
                continue;
            }
            'c' if is_front_vowel(next) => out.push("s", "s"),
            'c' => out.push("k", "k"),
            'g' if is_front_vowel(next) => match locale {
                BaseLocale::En => out.push("j", "k"),
                BaseLocale::Es => out.push("h", "j"),
            },
            'q' | 'k' | 'g' => out.push("k", "k"),
            'x' => match locale {
                BaseLocale::Es => out.push("ks", "h"),
                BaseLocale::En => out.push("ks", "ks"),
            },
            'z' => match locale {
                BaseLocale::En => out.push("z", "s"),
                BaseLocale::Es => out.push("s", "s"),
            },
            'd' | 't' if next == Some('i') && input.get(i + 2) == Some(&'o') => out.push("j", "j"),
            'd' | 't' => out.push("t", "t"),
            'l' => out.push("l", "l"),
            'r' => out.push("r", "r"),
            'y' => out.push("y", "y"),
            'j' => match locale {
                BaseLocale::Es => out.push("h", "j"),
                BaseLocale::En => out.push("j", "j"),
            },
            's' if next == Some('h') => {
                out.push("x", "x");
                i += 2;
                continue;
            }
            's' => out.push("s", "s"),
            'h' => {
                if !is_vowel(prev) || !is_vowel(next) {
                    out.push("h", "h");
                }
            }
            'f' | 'm' | 'n' => {
                let s = ch.to_string();
                out.push(&s, &s);
            }
            _ => {
                if out.primary.is_empty() && ch.is_ascii_alphabetic() {
                    let s = ch.to_string();
                    out.push(&s, &s);
                }
            }
        }
        i += 1;
    }

    let MetaphoneBuf { primary, mut secondary } = out;
    if secondary.is_empty() {
        secondary = primary.clone();
    }
    (primary, secondary)
}
