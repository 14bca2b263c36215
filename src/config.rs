// File: src/config.rs
use crate::core::types::Locale;
use crate::error::Result;
use crate::fuzzy::similarity::Strategy;
use crate::wake::WakeWordInput;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Weights of the four sub-scores; they sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub wake: f64,
    pub tokens: f64,
    pub entities: f64,
    pub global: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            wake: 0.2,
            tokens: 0.4,
            entities: 0.2,
            global: 0.2,
        }
    }
}

/// Cut-offs used to label how a candidate was reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViaThresholds {
    pub exact: f64,
    pub phonetic_tokens: f64,
    pub phonetic_entities: f64,
}

impl Default for ViaThresholds {
    fn default() -> Self {
        Self {
            exact: 0.95,
            phonetic_tokens: 0.78,
            phonetic_entities: 0.75,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Global acceptance bar for intents that declare none.
    pub threshold: f64,
    pub weights: ScoreWeights,
    pub via: ViaThresholds,
    pub token_min_confidence: f64,
    pub debug_top_k: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.82,
            weights: ScoreWeights::default(),
            via: ViaThresholds::default(),
            token_min_confidence: 0.4,
            debug_top_k: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub locale: Locale,
    pub fallback_locales: Vec<Locale>,
    pub wake_words: Vec<WakeWordInput>,
    pub require_wake: bool,
    pub auto_detect_locale: bool,
    pub strategy: Strategy,
    pub debug: bool,
    /// Recent actions kept for confirmation follow-ups.
    pub history_size: usize,
    pub matching: MatchConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locale: Locale::new("es"),
            fallback_locales: vec![Locale::new("es"), Locale::new("en")],
            wake_words: Vec::new(),
            require_wake: true,
            auto_detect_locale: true,
            strategy: Strategy::Hybrid,
            debug: false,
            history_size: 5,
            matching: MatchConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.matching.threshold, 0.82);
        assert_eq!(config.matching.weights.tokens, 0.4);
        assert_eq!(config.matching.via.phonetic_tokens, 0.78);
        assert!(config.require_wake);
        assert_eq!(config.strategy, Strategy::Hybrid);
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config = EngineConfig::from_json(
            r#"{
                "locale": "en-US",
                "wake_words": ["hey nura", {"canonical": "asistente", "aliases": ["asis"]}],
                "strategy": "metaphone-weighted",
                "matching": { "threshold": 0.7, "via": { "exact": 0.9 } }
            }"#,
        )
        .unwrap();
        assert_eq!(config.locale, Locale::new("en-US"));
        assert_eq!(config.wake_words.len(), 2);
        assert_eq!(config.strategy, Strategy::MetaphoneWeighted);
        assert_eq!(config.matching.threshold, 0.7);
        assert_eq!(config.matching.via.exact, 0.9);
        assert_eq!(config.matching.via.phonetic_entities, 0.75);
        assert_eq!(config.matching.weights.global, 0.2);
        assert_eq!(config.fallback_locales.len(), 2);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(EngineConfig::from_json("{ locale: es }").is_err());
    }
}
