// File: src/fuzzy/similarity.rs
use crate::core::text::{fold, tokenize_with_offsets};
use crate::core::types::{BaseLocale, TokenVia};
use crate::fuzzy::phonetic::{MemoryPhoneticStore, PhoneticCodes, PhoneticKey, PhoneticStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;
pub const DEFAULT_MAX_CANDIDATES: usize = 5;
pub const WAKE_MIN_CONFIDENCE: f64 = 0.75;
/// Longest token window compared against a wake phrase.
pub const WAKE_WINDOW: usize = 3;

const SOUNDEX_BONUS: f64 = 0.88;
const PRIMARY_BONUS: f64 = 0.90;
const SECONDARY_BONUS: f64 = 0.86;
const PREFIX_BONUS: f64 = 0.03;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    EditOnly,
    SoundexWeighted,
    MetaphoneWeighted,
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Copy)]
pub struct FuzzyOptions {
    pub strategy: Strategy,
    pub min_confidence: f64,
    pub locale: BaseLocale,
    pub max_candidates: usize,
}

impl Default for FuzzyOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::Hybrid,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            locale: BaseLocale::Es,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl FuzzyOptions {
    pub fn for_locale(locale: BaseLocale) -> Self {
        Self { locale, ..Self::default() }
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// Score of one input token (or token window) against one candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenScore {
    pub token: String,
    pub candidate: String,
    pub score: f64,
    pub via: TokenVia,
    /// First and last input token covered, inclusive.
    pub span: Option<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FuzzyMatch {
    pub value: String,
    pub score: f64,
    pub strategy: Strategy,
    pub matched_tokens: Vec<TokenScore>,
}

impl FuzzyMatch {
    /// Via of the strongest matched token, if any.
    pub fn token_via(&self) -> Option<TokenVia> {
        self.matched_tokens.first().map(|t| t.via)
    }
}

/// Normalized Damerau-Levenshtein similarity in [0, 1] over folded strings.
/// Both empty -> 1, one empty -> 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let source: Vec<char> = fold(a).chars().collect();
    let target: Vec<char> = fold(b).chars().collect();
    similarity_chars(&source, &target)
}

fn similarity_chars(source: &[char], target: &[char]) -> f64 {
    if source.is_empty() && target.is_empty() {
        return 1.0;
    }
    if source.is_empty() || target.is_empty() {
        return 0.0;
    }
    let distance = damerau_levenshtein(source, target);
    let max_len = source.len().max(target.len());
    (1.0 - distance as f64 / max_len as f64).clamp(0.0, 1.0)
}

/// Unrestricted Damerau-Levenshtein distance (insert, delete, substitute,
/// adjacent transposition; each cost 1).
/// O(n*m) time and space.
pub fn damerau_levenshtein(source: &[char], target: &[char]) -> usize {
    let len_a = source.len();
    let len_b = target.len();
    let max_dist = len_a + len_b;
    let mut dist = vec![vec![0usize; len_b + 2]; len_a + 2];
    let mut last_row: HashMap<char, usize> = HashMap::new();

    dist[0][0] = max_dist;
    for i in 0..=len_a {
        dist[i + 1][0] = max_dist;
        dist[i + 1][1] = i;
    }
    for j in 0..=len_b {
        dist[0][j + 1] = max_dist;
        dist[1][j + 1] = j;
    }

    for i in 1..=len_a {
        let mut last_match_col = 0;
        for j in 1..=len_b {
            let i1 = last_row.get(&target[j - 1]).copied().unwrap_or(0);
            let j1 = last_match_col;
            let cost = if source[i - 1] == target[j - 1] {
                last_match_col = j;
                0
            } else {
                1
            };
            dist[i + 1][j + 1] = (dist[i][j] + cost)
                .min(dist[i + 1][j] + 1)
                .min(dist[i][j + 1] + 1)
                .min(dist[i1][j1] + (i - i1 - 1) + 1 + (j - j1 - 1));
        }
        last_row.insert(source[i - 1], i);
    }

    dist[len_a + 1][len_b + 1]
}

/// Edit-distance plus phonetic scoring with an injectable code cache.
#[derive(Clone)]
pub struct SimilarityEngine {
    store: Arc<dyn PhoneticStore>,
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimilarityEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityEngine")
            .field("cached_codes", &self.store.len())
            .finish()
    }
}

impl SimilarityEngine {
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryPhoneticStore::new()))
    }

    pub fn with_store(store: Arc<dyn PhoneticStore>) -> Self {
        Self { store }
    }

    /// Cached phonetic codes for an already folded token.
    pub fn phonetic_codes(&self, locale: BaseLocale, folded: &str) -> PhoneticCodes {
        let key = PhoneticKey { locale, token: folded.to_string() };
        if let Some(codes) = self.store.get(&key) {
            return codes;
        }
        let codes = PhoneticCodes::encode(locale, folded);
        self.store.put(key, codes.clone());
        codes
    }

    /// Scores `input` against `candidate`. Never fails; the result is
    /// clamped to [0, 1].
    pub fn score(
        &self,
        input: &str,
        candidate: &str,
        strategy: Strategy,
        locale: BaseLocale,
    ) -> TokenScore {
        let norm_input = fold(input);
        let norm_candidate = fold(candidate);
        let make = |score: f64, via: TokenVia| TokenScore {
            token: norm_input.clone(),
            candidate: candidate.to_string(),
            score: score.clamp(0.0, 1.0),
            via,
            span: None,
        };

        if norm_input == norm_candidate {
            return make(1.0, TokenVia::Exact);
        }
        if norm_input.is_empty() || norm_candidate.is_empty() {
            return make(0.0, TokenVia::Edit);
        }

        let a: Vec<char> = norm_input.chars().collect();
        let b: Vec<char> = norm_candidate.chars().collect();
        let edit = similarity_chars(&a, &b);

        let in_codes = self.phonetic_codes(locale, &norm_input);
        let cand_codes = self.phonetic_codes(locale, &norm_candidate);
        let soundex_bonus = if !in_codes.soundex.is_empty() && in_codes.soundex == cand_codes.soundex {
            SOUNDEX_BONUS
        } else {
            0.0
        };
        let metaphone_bonus = metaphone_bonus(&in_codes, &cand_codes);

        match strategy {
            Strategy::EditOnly => make(edit, TokenVia::Edit),
            Strategy::SoundexWeighted => {
                let score = soundex_bonus.max(edit * 0.8);
                make(score, if soundex_bonus > edit { TokenVia::Phonetic } else { TokenVia::Edit })
            }
            Strategy::MetaphoneWeighted => {
                let score = metaphone_bonus.max(edit * 0.7);
                make(score, if metaphone_bonus >= edit { TokenVia::Phonetic } else { TokenVia::Edit })
            }
            Strategy::Hybrid => {
                let phonetic = soundex_bonus.max(metaphone_bonus);
                let prefix = if a[0] == b[0] { PREFIX_BONUS } else { 0.0 };
                let score = (edit.max(phonetic) + prefix).min(1.0);
                make(score, if phonetic >= edit { TokenVia::Phonetic } else { TokenVia::Edit })
            }
        }
    }

    /// Best candidate for the whole input, or `None` below `min_confidence`.
    /// The first candidate wins ties.
    pub fn match_fuzzy(&self, input: &str, candidates: &[&str], opts: FuzzyOptions) -> Option<FuzzyMatch> {
        if input.trim().is_empty() || candidates.is_empty() {
            return None;
        }
        let mut best: Option<TokenScore> = None;
        for candidate in candidates {
            let scored = self.score(input, candidate, opts.strategy, opts.locale);
            if best.as_ref().map_or(true, |b| scored.score > b.score) {
                best = Some(scored);
            }
        }
        let best = best?;
        if best.score < opts.min_confidence {
            return None;
        }
        Some(FuzzyMatch {
            value: best.candidate.clone(),
            score: best.score,
            strategy: opts.strategy,
            matched_tokens: vec![best],
        })
    }

    /// Scores every whitespace token of `input` against every candidate and
    /// keeps the top `max_candidates` per token at or above `min_confidence`.
    pub fn tokenize_and_score(&self, input: &str, candidates: &[&str], opts: FuzzyOptions) -> Vec<TokenScore> {
        let mut results = Vec::new();
        for (index, token) in input.split_whitespace().enumerate() {
            let mut per_token: Vec<TokenScore> = candidates
                .iter()
                .map(|candidate| {
                    let mut scored = self.score(token, candidate, opts.strategy, opts.locale);
                    scored.token = token.to_string();
                    scored.span = Some((index, index));
                    scored
                })
                .filter(|s| s.score > 0.0 && s.score >= opts.min_confidence)
                .collect();
            per_token.sort_by(|a, b| b.score.total_cmp(&a.score));
            per_token.truncate(opts.max_candidates);
            results.extend(per_token);
        }
        results
    }

    /// Compares windows of one to three consecutive tokens against the
    /// canonical wake phrase and its aliases. Higher score wins, then the
    /// earlier window, then the shorter one.
    pub fn compare_wake_word(
        &self,
        input: &str,
        canonical: &str,
        aliases: &[String],
        opts: FuzzyOptions,
    ) -> Option<FuzzyMatch> {
        let tokens = tokenize_with_offsets(input);
        if tokens.is_empty() {
            return None;
        }
        let candidates: Vec<&str> = std::iter::once(canonical)
            .chain(aliases.iter().map(String::as_str))
            .filter(|c| !c.trim().is_empty())
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let mut best: Option<TokenScore> = None;
        for start in 0..tokens.len() {
            for len in 1..=WAKE_WINDOW {
                let end = start + len - 1;
                if end >= tokens.len() {
                    break;
                }
                let window = &input[tokens[start].start..tokens[end].end];
                for candidate in &candidates {
                    let mut scored = self.score(window, candidate, opts.strategy, opts.locale);
                    if scored.score <= 0.0 {
                        continue;
                    }
                    scored.token = window.to_string();
                    scored.span = Some((start, end));
                    if best.as_ref().map_or(true, |b| scored.score > b.score) {
                        best = Some(scored);
                    }
                }
            }
        }

        let best = best?;
        if best.score < opts.min_confidence {
            return None;
        }
        Some(FuzzyMatch {
            value: best.candidate.clone(),
            score: best.score,
            strategy: opts.strategy,
            matched_tokens: vec![best],
        })
    }
}

/// 0.90 when primaries collide, 0.86 for any primary/secondary cross hit.
/// Symmetric in its arguments.
fn metaphone_bonus(a: &PhoneticCodes, b: &PhoneticCodes) -> f64 {
    if a.primary.is_empty() || b.primary.is_empty() {
        return 0.0;
    }
    if a.primary == b.primary {
        return PRIMARY_BONUS;
    }
    if a.primary == b.secondary || a.secondary == b.primary || a.secondary == b.secondary {
        return SECONDARY_BONUS;
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SimilarityEngine {
        SimilarityEngine::new()
    }

    #[test]
    fn similarity_identity_and_bounds() {
        for s in ["", "orden", "Menú Órdenes", "abc def", "12345"] {
            assert_eq!(similarity(s, s), 1.0);
        }
        assert_eq!(similarity("", "algo"), 0.0);
        assert_eq!(similarity("orden", "orden"), 1.0);
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [("orden", "orend"), ("pedidos", "pedids"), ("abre", "cierra"), ("nura", "")];
        for (a, b) in pairs {
            let ab = similarity(a, b);
            assert_eq!(ab, similarity(b, a));
            assert!((0.0..=1.0).contains(&ab));
        }
    }

    #[test]
    fn transposition_costs_less_than_rewrite() {
        let sim = similarity("orden", "orend");
        assert!(sim >= 0.5 && sim < 1.0);
        let ab: Vec<char> = "ab".chars().collect();
        let ba: Vec<char> = "ba".chars().collect();
        assert_eq!(damerau_levenshtein(&ab, &ba), 1);
    }

    #[test]
    fn hybrid_score_is_symmetric() {
        let e = engine();
        for (a, b) in [("nora", "nura"), ("gente", "jente"), ("calle", "caye"), ("abrir", "cerrar")] {
            let ab = e.score(a, b, Strategy::Hybrid, BaseLocale::Es).score;
            let ba = e.score(b, a, Strategy::Hybrid, BaseLocale::Es).score;
            assert_eq!(ab, ba);
        }
    }

    #[test]
    fn match_fuzzy_accent_variations() {
        let m = engine()
            .match_fuzzy("menú órdenes", &["menu ordenes"], FuzzyOptions::for_locale(BaseLocale::Es))
            .unwrap();
        assert_eq!(m.value, "menu ordenes");
        assert!(m.score > 0.8);
    }

    #[test]
    fn match_fuzzy_exact_and_case_insensitive() {
        let e = engine();
        let m = e
            .match_fuzzy("open orders", &["open orders", "close orders"], FuzzyOptions::for_locale(BaseLocale::En))
            .unwrap();
        assert_eq!(m.value, "open orders");
        assert_eq!(m.score, 1.0);

        let m = e
            .match_fuzzy("OPEN PANEL", &["open panel"], FuzzyOptions::for_locale(BaseLocale::En))
            .unwrap();
        assert_eq!(m.value, "open panel");
    }

    #[test]
    fn match_fuzzy_tolerates_single_edit() {
        let m = engine()
            .match_fuzzy("pedids", &["pedidos"], FuzzyOptions::for_locale(BaseLocale::Es))
            .unwrap();
        assert_eq!(m.value, "pedidos");
        assert!(m.score > 0.6);
    }

    #[test]
    fn match_fuzzy_empty_candidates_is_none() {
        let e = engine();
        for input in ["hola", "", "menu"] {
            assert!(e.match_fuzzy(input, &[], FuzzyOptions::default()).is_none());
        }
    }

    #[test]
    fn match_fuzzy_threshold_is_monotonic() {
        let e = engine();
        let opts = FuzzyOptions::for_locale(BaseLocale::Es).with_min_confidence(0.0);
        let achieved = e.match_fuzzy("pedids", &["pedidos"], opts).unwrap().score;
        let above = (achieved + 0.001).min(1.0);
        if above > achieved {
            assert!(e.match_fuzzy("pedids", &["pedidos"], opts.with_min_confidence(above)).is_none());
        }
        assert!(e.match_fuzzy("hola", &["adios"], opts.with_min_confidence(0.95)).is_none());
        assert!(e
            .match_fuzzy("abrir", &["cerrar"], FuzzyOptions::for_locale(BaseLocale::Es).with_min_confidence(0.8))
            .is_none());
    }

    #[test]
    fn match_fuzzy_prefers_canonical() {
        let m = engine()
            .match_fuzzy("configuracion", &["configuración", "cerrar panel"], FuzzyOptions::for_locale(BaseLocale::Es))
            .unwrap();
        assert_eq!(m.value, "configuración");
    }

    #[test]
    fn strategies_are_selectable() {
        let e = engine();
        let edit = e.score("nora", "nura", Strategy::EditOnly, BaseLocale::Es);
        assert_eq!(edit.via, TokenVia::Edit);
        assert!((edit.score - 0.75).abs() < 1e-9);

        let sx = e.score("nora", "nura", Strategy::SoundexWeighted, BaseLocale::Es);
        assert!((sx.score - SOUNDEX_BONUS).abs() < 1e-9);

        let mp = e.score("nora", "nura", Strategy::MetaphoneWeighted, BaseLocale::Es);
        assert!((mp.score - PRIMARY_BONUS).abs() < 1e-9);

        let hy = e.score("nora", "nura", Strategy::Hybrid, BaseLocale::Es);
        assert!((hy.score - (PRIMARY_BONUS + PREFIX_BONUS)).abs() < 1e-9);
        assert_eq!(hy.via, TokenVia::Phonetic);
    }

    #[test]
    fn tokenize_and_score_indexes_and_limits() {
        let e = engine();
        let scores = e.tokenize_and_score(
            "abre menu pedidos",
            &["abre", "menú", "ordenes"],
            FuzzyOptions::for_locale(BaseLocale::Es).with_min_confidence(0.0),
        );
        let mut indexes: Vec<usize> = scores.iter().filter_map(|s| s.span.map(|(i, _)| i)).collect();
        indexes.dedup();
        assert_eq!(indexes, vec![0, 1, 2]);

        let limited = e.tokenize_and_score(
            "abre menu",
            &["abre", "menú", "ordenes", "salir"],
            FuzzyOptions::for_locale(BaseLocale::Es).with_min_confidence(0.0).with_max_candidates(1),
        );
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn tokenize_and_score_filters_and_marks_via() {
        let e = engine();
        let none = e.tokenize_and_score(
            "diagnostics",
            &["open", "close"],
            FuzzyOptions::for_locale(BaseLocale::En).with_min_confidence(0.6),
        );
        assert!(none.is_empty());

        let opts = FuzzyOptions::for_locale(BaseLocale::Es).with_min_confidence(0.0);
        let phonetic = e.tokenize_and_score("nora", &["nura"], opts);
        assert!(phonetic.iter().any(|s| s.via == TokenVia::Phonetic && s.candidate == "nura"));

        let exact = e.tokenize_and_score("Open menu", &["open", "menu"], FuzzyOptions::for_locale(BaseLocale::En));
        assert_eq!(exact.iter().filter(|s| s.score == 1.0).count(), 2);
    }

    #[test]
    fn wake_word_alias_inside_phrase() {
        let e = engine();
        let m = e
            .compare_wake_word(
                "ok nora abre el menu",
                "nura",
                &["nora".to_string()],
                FuzzyOptions::for_locale(BaseLocale::Es).with_min_confidence(WAKE_MIN_CONFIDENCE),
            )
            .unwrap();
        assert_eq!(m.value, "nora");
        assert!(m.score >= 0.78);
        assert_eq!(m.matched_tokens[0].span, Some((1, 1)));
    }

    #[test]
    fn wake_word_rejects_unrelated_text() {
        let m = engine().compare_wake_word(
            "hola mundo",
            "nura",
            &["nora".to_string()],
            FuzzyOptions::for_locale(BaseLocale::Es).with_min_confidence(WAKE_MIN_CONFIDENCE),
        );
        assert!(m.is_none());
    }

    #[test]
    fn wake_word_close_alias_and_punctuation() {
        let e = engine();
        let m = e
            .compare_wake_word("hola nira", "nura", &[], FuzzyOptions::default().with_min_confidence(0.9))
            .unwrap();
        assert_eq!(m.value, "nura");
        assert!(m.score >= 0.9);

        let m = e
            .compare_wake_word(
                "hey nura!",
                "nura",
                &[],
                FuzzyOptions::for_locale(BaseLocale::En).with_min_confidence(WAKE_MIN_CONFIDENCE),
            )
            .unwrap();
        assert_eq!(m.value, "nura");
        assert_eq!(m.score, 1.0);
    }

    #[test]
    fn wake_word_chooses_strongest_alias() {
        let m = engine()
            .compare_wake_word(
                "oye lura por favor",
                "nura",
                &["nora".to_string(), "lura".to_string()],
                FuzzyOptions::for_locale(BaseLocale::Es).with_min_confidence(WAKE_MIN_CONFIDENCE),
            )
            .unwrap();
        assert_eq!(m.value, "lura");
    }

    #[test]
    fn phonetic_codes_are_cached() {
        let store = Arc::new(MemoryPhoneticStore::new());
        let e = SimilarityEngine::with_store(store.clone());
        e.score("nora", "nura", Strategy::Hybrid, BaseLocale::Es);
        e.score("nora", "nura", Strategy::Hybrid, BaseLocale::Es);
        assert_eq!(store.len(), 2);
    }
}
