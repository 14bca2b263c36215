// File: src/core/text.rs
use crate::core::lexicon::Lexicon;
use crate::core::types::Locale;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters trimmed after a removed wake span.
pub const TRAILING_CLEANUP: &[char] = &[',', '.', ';', ':', '!', '?', '¡', '¿', '-'];

/// Decomposes to NFD and drops combining marks ("menú" -> "menu", "ñ" -> "n").
pub fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Comparison form used by every scorer: lowercase, no diacritics, only
/// alphanumerics and single spaces.
pub fn fold(input: &str) -> String {
    let stripped = strip_diacritics(input);
    let mut out = String::with_capacity(stripped.len());
    for word in stripped.split_whitespace() {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        if cleaned.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&cleaned);
    }
    out
}

/// A whitespace-delimited token with byte offsets into the source string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

pub fn tokenize_with_offsets(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, ch) in input.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token { text: &input[s..idx], start: s, end: idx });
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        tokens.push(Token { text: &input[s..], start: s, end: input.len() });
    }
    tokens
}

/// Canonicalizes each token through the lexicon, then lowercases and strips
/// diacritics. Punctuation is preserved so placeholders like `{id}` survive.
pub fn normalize_utterance(lexicon: &Lexicon, locale: &Locale, text: &str) -> String {
    text.split_whitespace()
        .map(|tok| {
            let canonical = lexicon.normalize(locale, tok);
            let chosen = canonical.as_deref().unwrap_or(tok);
            strip_diacritics(&chosen.to_lowercase())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive substring search returning byte offsets in `haystack`.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }
    for (start, _) in haystack.char_indices() {
        let mut matched = 0;
        'walk: for (offset, ch) in haystack[start..].char_indices() {
            for lower in ch.to_lowercase() {
                if matched >= needle.len() || needle[matched] != lower {
                    break 'walk;
                }
                matched += 1;
            }
            if matched == needle.len() {
                return Some((start, start + offset + ch.len_utf8()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_strips_accents_punctuation_and_case() {
        assert_eq!(fold("  Menú   Órdenes! "), "menu ordenes");
        assert_eq!(fold("¿Mañana?"), "manana");
        assert_eq!(fold("..."), "");
    }

    #[test]
    fn tokenize_tracks_offsets() {
        let toks = tokenize_with_offsets(" ok  nura, abre");
        let texts: Vec<_> = toks.iter().map(|t| t.text).collect();
        assert_eq!(texts, vec!["ok", "nura,", "abre"]);
        assert_eq!(toks[1].start, 5);
        assert_eq!(toks[1].end, 10);
    }

    #[test]
    fn case_insensitive_find() {
        assert_eq!(find_case_insensitive("Hey Nura, open", "hey nura"), Some((0, 8)));
        assert_eq!(find_case_insensitive("abre el MENÚ", "menú"), Some((8, 13)));
        assert_eq!(find_case_insensitive("abre", "cierra"), None);
    }

    #[test]
    fn utterance_normalization_keeps_placeholders() {
        let lexicon = Lexicon::new();
        let out = normalize_utterance(&lexicon, &Locale::new("es"), "Abre Menú {orderId}");
        assert_eq!(out, "abre menu {orderid}");
    }
}
