// File: src/wake.rs
use crate::core::text::{find_case_insensitive, fold, tokenize_with_offsets, TRAILING_CLEANUP};
use crate::core::types::{BaseLocale, WakeVia};
use crate::fuzzy::similarity::{FuzzyMatch, FuzzyOptions, SimilarityEngine, Strategy, WAKE_MIN_CONFIDENCE};
use serde::{Deserialize, Serialize};

/// Wake word that is always listened for when wake detection is required.
pub const DEFAULT_WAKE_WORD: &str = "nura";

const FILLER_WORDS: &[&str] = &["ok", "okay", "okey", "oye", "hey", "hola", "eh", "ey"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WakeWordConfig {
    pub canonical: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
}

/// A wake word as written in configuration: either a bare phrase or a full
/// entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WakeWordInput {
    Phrase(String),
    Config(WakeWordConfig),
}

impl From<&str> for WakeWordInput {
    fn from(phrase: &str) -> Self {
        WakeWordInput::Phrase(phrase.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WakeEntry {
    pub canonical: String,
    pub aliases: Vec<String>,
    pub min_confidence: f64,
}

impl WakeEntry {
    pub fn new(canonical: impl Into<String>) -> Self {
        Self {
            canonical: canonical.into(),
            aliases: Vec::new(),
            min_confidence: WAKE_MIN_CONFIDENCE,
        }
    }
}

/// A multi-word bare phrase also accepts its last word on its own
/// ("hey nura" -> alias "nura").
pub fn normalize_wake_words(inputs: &[WakeWordInput]) -> Vec<WakeEntry> {
    inputs
        .iter()
        .filter_map(|item| match item {
            WakeWordInput::Phrase(phrase) => {
                let trimmed = phrase.trim();
                if trimmed.is_empty() {
                    return None;
                }
                let tokens: Vec<&str> = trimmed.split_whitespace().collect();
                let aliases = match tokens.as_slice() {
                    [_, .., last] => vec![last.to_string()],
                    _ => Vec::new(),
                };
                Some(WakeEntry {
                    canonical: trimmed.to_string(),
                    aliases,
                    min_confidence: WAKE_MIN_CONFIDENCE,
                })
            }
            WakeWordInput::Config(config) => Some(WakeEntry {
                canonical: config.canonical.trim().to_string(),
                aliases: config.aliases.clone(),
                min_confidence: config.min_confidence.unwrap_or(WAKE_MIN_CONFIDENCE),
            }),
        })
        .collect()
}

/// Appends the default wake word unless some entry already answers to it.
pub fn with_default_wake(mut entries: Vec<WakeEntry>) -> Vec<WakeEntry> {
    let present = entries.iter().any(|e| {
        fold(&e.canonical) == DEFAULT_WAKE_WORD || e.aliases.iter().any(|a| fold(a) == DEFAULT_WAKE_WORD)
    });
    if !present {
        entries.push(WakeEntry::new(DEFAULT_WAKE_WORD));
    }
    entries
}

#[derive(Debug, Clone, PartialEq)]
pub struct WakeDetection {
    pub matched: bool,
    pub result: Option<FuzzyMatch>,
    pub entry: Option<WakeEntry>,
}

impl WakeDetection {
    fn pass_through() -> Self {
        Self { matched: true, result: None, entry: None }
    }

    /// Score of the wake hit; 1.0 when nothing had to be detected.
    pub fn confidence(&self) -> f64 {
        self.result.as_ref().map_or(1.0, |r| r.score)
    }

    pub fn via(&self) -> WakeVia {
        self.result
            .as_ref()
            .and_then(FuzzyMatch::token_via)
            .map_or(WakeVia::None, WakeVia::from)
    }
}

/// Best wake hit across all entries that clears its entry's own minimum.
/// With no entries configured every input passes.
pub fn detect_wake(
    engine: &SimilarityEngine,
    input: &str,
    entries: &[WakeEntry],
    locale: BaseLocale,
) -> WakeDetection {
    if entries.is_empty() {
        return WakeDetection::pass_through();
    }
    let mut best: Option<(&WakeEntry, FuzzyMatch)> = None;
    for entry in entries {
        let opts = FuzzyOptions::for_locale(locale)
            .with_strategy(Strategy::Hybrid)
            .with_min_confidence(entry.min_confidence)
            .with_max_candidates(3);
        let Some(hit) = engine.compare_wake_word(input, &entry.canonical, &entry.aliases, opts) else {
            continue;
        };
        if hit.score < entry.min_confidence {
            continue;
        }
        if best.as_ref().map_or(true, |(_, b)| hit.score > b.score) {
            best = Some((entry, hit));
        }
    }
    match best {
        Some((entry, hit)) => WakeDetection {
            matched: true,
            result: Some(hit),
            entry: Some(entry.clone()),
        },
        None => WakeDetection { matched: false, result: None, entry: None },
    }
}

fn is_filler(token: &str) -> bool {
    let bare = token.trim_end_matches(TRAILING_CLEANUP).to_lowercase();
    FILLER_WORDS.contains(&bare.as_str())
}

/// Removes the wake span plus any filler words right before it and the
/// punctuation right after it. Without a match the trimmed input comes back.
pub fn strip_wake(input: &str, result: Option<&FuzzyMatch>) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let Some(result) = result else {
        return trimmed.to_string();
    };
    let tokens = tokenize_with_offsets(trimmed);
    if tokens.is_empty() {
        return trimmed.to_string();
    }

    let spans: Vec<(usize, usize)> = result
        .matched_tokens
        .iter()
        .filter_map(|t| t.span)
        .filter(|(s, e)| s <= e && *e < tokens.len())
        .collect();

    let (mut left, mut start, mut end) = if let (Some(l), Some(r)) = (
        spans.iter().map(|(s, _)| *s).min(),
        spans.iter().map(|(_, e)| *e).max(),
    ) {
        (l, tokens[l].start, tokens[r].end)
    } else {
        let Some((start, end)) = find_case_insensitive(trimmed, result.value.trim()) else {
            return trimmed.to_string();
        };
        let left = tokens.iter().position(|t| t.end > start).unwrap_or(0);
        (left, start, end)
    };

    while left > 0 && is_filler(tokens[left - 1].text) {
        left -= 1;
        start = tokens[left].start;
    }

    while let Some(c) = trimmed[end..].chars().next() {
        if !(c.is_whitespace() || TRAILING_CLEANUP.contains(&c)) {
            break;
        }
        end += c.len_utf8();
    }

    let before = trimmed[..start].trim();
    let after = trimmed[end..].trim();
    match (before.is_empty(), after.is_empty()) {
        (true, _) => after.to_string(),
        (_, true) => before.to_string(),
        _ => format!("{before} {after}").split_whitespace().collect::<Vec<_>>().join(" "),
    }
}
