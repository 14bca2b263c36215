// File: src/core/lexicon.rs
use crate::core::types::{BaseLocale, Locale};
use crate::fuzzy::similarity::similarity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Minimum edit similarity for a phonetic-bank hit that is not an exact alias.
pub const PHONETIC_LOOKUP_MIN: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sense {
    pub canonical: String,
    pub weight: u64,
}

impl Sense {
    pub fn new(canonical: impl Into<String>) -> Self {
        Self { canonical: canonical.into(), weight: 1 }
    }
}

/// Alias tables: per-locale term -> canonical senses, plus one phonetic bank
/// per locale family for sound-alike recall.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    entries: HashMap<String, HashMap<String, Sense>>,
    phonetics: HashMap<BaseLocale, HashMap<String, String>>,
    /// Bumped whenever an entry is added or changed. Not persisted.
    #[serde(skip)]
    revision: u64,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, locale: &Locale, term: &str, sense: Sense) {
        let lower = term.trim().to_lowercase();
        if lower.is_empty() {
            return;
        }
        trace!(locale = %locale, term = %lower, canonical = %sense.canonical, "lexicon.register");
        let table = self.entries.entry(locale.as_str().to_string()).or_default();
        if table.get(&lower) != Some(&sense) {
            table.insert(lower, sense);
            self.revision += 1;
        }
    }

    pub fn bulk<'a, I>(&mut self, locale: &Locale, batch: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (term, canonical) in batch {
            self.register(locale, term, Sense::new(canonical));
        }
    }

    /// Bumps the weight of a known term, or registers it with weight `by`.
    /// Returns the resulting weight.
    pub fn reinforce(&mut self, locale: &Locale, term: &str, canonical: &str, by: u64) -> u64 {
        let lower = term.trim().to_lowercase();
        let table = self.entries.entry(locale.as_str().to_string()).or_default();
        let sense = table.entry(lower).or_insert_with(|| Sense { canonical: canonical.to_string(), weight: 0 });
        if sense.canonical != canonical {
            sense.canonical = canonical.to_string();
            sense.weight = 0;
        }
        sense.weight += by;
        self.revision += 1;
        sense.weight
    }

    pub fn sense(&self, locale: &Locale, term: &str) -> Option<&Sense> {
        self.entries
            .get(locale.as_str())
            .and_then(|table| table.get(&term.trim().to_lowercase()))
    }

    pub fn register_phonetic(&mut self, base: BaseLocale, term: &str, canonical: &str) {
        let lower = term.trim().to_lowercase();
        if lower.is_empty() {
            return;
        }
        trace!(locale = base.code(), term = %lower, canonical, "lexicon.phonetic.register");
        let bank = self.phonetics.entry(base).or_default();
        if bank.get(&lower).map(String::as_str) != Some(canonical) {
            bank.insert(lower, canonical.to_string());
            self.revision += 1;
        }
    }

    /// Exact alias first, then the closest alias at or above
    /// [`PHONETIC_LOOKUP_MIN`].
    pub fn lookup_phonetic(&self, base: BaseLocale, term: &str) -> Option<&str> {
        let lower = term.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        let bank = self.phonetics.get(&base)?;
        if let Some(canonical) = bank.get(&lower) {
            return Some(canonical);
        }
        let mut best: Option<(&str, &str, f64)> = None;
        for (alias, canonical) in bank {
            let score = similarity(&lower, alias);
            // Ties resolve on the alias text so lookups don't depend on map order.
            let better = match best {
                None => true,
                Some((best_alias, _, best_score)) => {
                    score > best_score || (score == best_score && alias.as_str() < best_alias)
                }
            };
            if better {
                best = Some((alias, canonical, score));
            }
        }
        best.filter(|(_, _, score)| *score >= PHONETIC_LOOKUP_MIN)
            .map(|(_, canonical, _)| canonical)
    }

    /// Canonical form of `term`: the exact locale table, then the base-family
    /// table, then the phonetic bank.
    pub fn normalize(&self, locale: &Locale, term: &str) -> Option<String> {
        let lower = term.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if let Some(sense) = self.entries.get(locale.as_str()).and_then(|t| t.get(&lower)) {
            trace!(locale = %locale, term = %lower, result = %sense.canonical, "lexicon.normalize");
            return Some(sense.canonical.clone());
        }
        let short = locale.short();
        if let Some(sense) = self.entries.get(&short).and_then(|t| t.get(&lower)) {
            trace!(locale = %locale, term = %lower, result = %sense.canonical, "lexicon.normalize");
            return Some(sense.canonical.clone());
        }
        let phonetic = self.lookup_phonetic(locale.base(), &lower).map(str::to_string);
        trace!(locale = %locale, term = %lower, result = ?phonetic, "lexicon.normalize.phonetic");
        phonetic
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn term_count(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn phonetic_count(&self) -> usize {
        self.phonetics.values().map(HashMap::len).sum()
    }
}
