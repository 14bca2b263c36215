// src/entities/mod.rs
pub mod numerals;
pub mod parsers;

use crate::core::types::{BaseLocale, EntityValue};
use crate::fuzzy::similarity::{FuzzyOptions, SimilarityEngine};
use serde::{Deserialize, Serialize};

pub use numerals::to_number_loose;
pub use parsers::{parse_boolean, parse_date, parse_date_with_today, parse_enum, parse_number, parse_range_number};

/// Confidence given to a number read from words rather than digits.
pub const LOOSE_NUMBER_CONFIDENCE: f64 = 0.85;
/// Confidence for an enum slot with nothing to compare against.
pub const OPEN_ENUM_CONFIDENCE: f64 = 0.4;
pub const STRING_CONFIDENCE: f64 = 0.5;
pub const ENUM_SCORE_MIN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[default]
    String,
    Number,
    Enum,
    Boolean,
    Date,
    RangeNumber,
}

/// A slot value together with how sure the parser was about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredValue {
    pub value: Option<EntityValue>,
    pub confidence: f64,
}

impl ScoredValue {
    fn miss() -> Self {
        Self { value: None, confidence: 0.0 }
    }

    fn hit(value: EntityValue, confidence: f64) -> Self {
        Self { value: Some(value), confidence }
    }
}

/// Typed extraction for one captured slot. `variants` are the enum options
/// merged with any declared entity aliases.
pub fn parse_value(
    engine: &SimilarityEngine,
    kind: EntityType,
    raw: &str,
    variants: &[String],
    locale: BaseLocale,
) -> Option<EntityValue> {
    match kind {
        EntityType::String => Some(EntityValue::Text(raw.trim().to_string())),
        EntityType::Number => parse_number(raw)
            .or_else(|| to_number_loose(raw, locale))
            .map(EntityValue::Number),
        EntityType::Enum => {
            if variants.is_empty() {
                return Some(EntityValue::Text(raw.trim().to_lowercase()));
            }
            parse_enum(engine, raw, variants, locale).map(EntityValue::Text)
        }
        EntityType::Boolean => parse_boolean(raw, locale).map(EntityValue::Bool),
        EntityType::Date => parse_date(raw, locale).map(EntityValue::Date),
        EntityType::RangeNumber => parse_range_number(raw, locale).map(EntityValue::Range),
    }
}

/// Confidence of a slot for ranking. Digits and closed vocabularies score 1,
/// number words 0.85, enums their best fuzzy score and free text 0.5.
pub fn score_value(
    engine: &SimilarityEngine,
    kind: EntityType,
    raw: &str,
    variants: &[String],
    locale: BaseLocale,
) -> ScoredValue {
    let trimmed = raw.trim();
    match kind {
        EntityType::Boolean => parse_boolean(trimmed, locale)
            .map_or_else(ScoredValue::miss, |b| ScoredValue::hit(EntityValue::Bool(b), 1.0)),
        EntityType::Number => {
            if let Some(n) = parse_number(trimmed) {
                return ScoredValue::hit(EntityValue::Number(n), 1.0);
            }
            to_number_loose(trimmed, locale).map_or_else(ScoredValue::miss, |n| {
                ScoredValue::hit(EntityValue::Number(n), LOOSE_NUMBER_CONFIDENCE)
            })
        }
        EntityType::Enum => {
            if variants.is_empty() {
                return ScoredValue::hit(EntityValue::Text(trimmed.to_string()), OPEN_ENUM_CONFIDENCE);
            }
            let options: Vec<&str> = variants.iter().map(String::as_str).collect();
            let best = engine
                .tokenize_and_score(
                    trimmed,
                    &options,
                    FuzzyOptions::for_locale(locale)
                        .with_min_confidence(ENUM_SCORE_MIN_CONFIDENCE)
                        .with_max_candidates(1),
                )
                .into_iter()
                .next();
            match best {
                Some(hit) => ScoredValue::hit(EntityValue::Text(hit.candidate), hit.score),
                None => ScoredValue::miss(),
            }
        }
        EntityType::Date => parse_date(trimmed, locale)
            .map_or_else(ScoredValue::miss, |d| ScoredValue::hit(EntityValue::Date(d), 1.0)),
        EntityType::RangeNumber => parse_range_number(trimmed, locale)
            .map_or_else(ScoredValue::miss, |r| ScoredValue::hit(EntityValue::Range(r), 1.0)),
        EntityType::String => ScoredValue::hit(EntityValue::Text(trimmed.to_string()), STRING_CONFIDENCE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NumberRange;

    #[test]
    fn entity_type_uses_catalog_names() {
        let kind: EntityType = serde_json::from_str("\"range_number\"").unwrap();
        assert_eq!(kind, EntityType::RangeNumber);
        assert_eq!(serde_json::to_string(&EntityType::Enum).unwrap(), "\"enum\"");
    }

    #[test]
    fn parse_value_dispatches_by_type() {
        let engine = SimilarityEngine::new();
        let es = BaseLocale::Es;
        assert_eq!(parse_value(&engine, EntityType::Number, "quince", &[], es), Some(EntityValue::Number(15.0)));
        assert_eq!(parse_value(&engine, EntityType::Boolean, "sí", &[], es), Some(EntityValue::Bool(true)));
        assert_eq!(
            parse_value(&engine, EntityType::RangeNumber, "entre 5 y 10", &[], es),
            Some(EntityValue::Range(NumberRange::between(5.0, 10.0)))
        );
        assert_eq!(parse_value(&engine, EntityType::Enum, " Rojo ", &[], es), Some(EntityValue::Text("rojo".into())));
        assert_eq!(parse_value(&engine, EntityType::Boolean, "tal vez", &[], es), None);
    }

    #[test]
    fn scores_reflect_parse_quality() {
        let engine = SimilarityEngine::new();
        let es = BaseLocale::Es;
        assert_eq!(score_value(&engine, EntityType::Number, "15", &[], es).confidence, 1.0);
        assert_eq!(score_value(&engine, EntityType::Number, "quince", &[], es).confidence, LOOSE_NUMBER_CONFIDENCE);
        assert_eq!(score_value(&engine, EntityType::Number, "perro", &[], es).confidence, 0.0);
        assert_eq!(score_value(&engine, EntityType::String, "lo que sea", &[], es).confidence, STRING_CONFIDENCE);
        assert_eq!(score_value(&engine, EntityType::Enum, "x", &[], es).confidence, OPEN_ENUM_CONFIDENCE);

        let colors = vec!["rojo".to_string(), "azul".to_string()];
        let scored = score_value(&engine, EntityType::Enum, "rojo", &colors, es);
        assert_eq!(scored.value, Some(EntityValue::Text("rojo".into())));
        assert_eq!(scored.confidence, 1.0);
    }
}
