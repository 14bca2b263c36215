// File: src/entities/parsers.rs
use crate::core::text::strip_diacritics;
use crate::core::types::{BaseLocale, NumberRange};
use crate::entities::numerals::{to_number_loose, word_value, DIGITS};
use crate::fuzzy::similarity::{FuzzyOptions, SimilarityEngine};
use chrono::{Duration, Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Enum sets larger than this only accept exact matches.
pub const ENUM_FUZZY_MAX_OPTIONS: usize = 12;
pub const ENUM_FUZZY_MIN_CONFIDENCE: f64 = 0.7;

const ES_TRUE: &[&str] = &[
    "sí", "si", "verdadero", "cierto", "on", "encendido", "activo", "habilitar", "habilitado", "true", "1",
];
const ES_FALSE: &[&str] = &["no", "falso", "false", "off", "apagado", "deshabilitar", "deshabilitado", "0"];
const EN_TRUE: &[&str] = &["yes", "true", "on", "enable", "enabled", "sure", "affirmative", "1"];
const EN_FALSE: &[&str] = &["no", "false", "off", "disable", "disabled", "0"];

static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("static date pattern"));
static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/-](\d{1,2})[/-](\d{2,4})$").expect("static date pattern"));

static DIGIT_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)?)\s*(?:a|hasta|to|until)\s*(\d+(?:[.,]\d+)?)").expect("static range pattern")
});
static CONNECTOR_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(entre|between|desde|de|from)\s+)?(\S+)\s+(a|hasta|y|to|until|and|through)\s+(\S+)$")
        .expect("static range pattern")
});
static COMPARISON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(>=|<=|>|<)\s*(\d+(?:[.,]\d+)?)").expect("static comparison pattern"));
static ES_UPPER_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:menos de|menor que|como maximo)\s+(.*)$").expect("static range pattern"));
static ES_LOWER_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:mas de|mayor que|al menos)\s+(.*)$").expect("static range pattern"));
static EN_UPPER_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:less than|fewer than|at most)\s+(.*)$").expect("static range pattern"));
static EN_LOWER_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:more than|greater than|at least)\s+(.*)$").expect("static range pattern"));

fn decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Strict numeric parse: whitespace dropped, comma read as decimal point,
/// everything except digits, `.` and `-` discarded.
pub fn parse_number(raw: &str) -> Option<f64> {
    let kept: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if !kept.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    decimal(&kept)
}

pub fn parse_boolean(raw: &str, locale: BaseLocale) -> Option<bool> {
    let t = raw.trim().to_lowercase();
    if t.is_empty() {
        return None;
    }
    let (truthy, falsy) = match locale {
        BaseLocale::Es => (ES_TRUE, ES_FALSE),
        BaseLocale::En => (EN_TRUE, EN_FALSE),
    };
    if truthy.contains(&t.as_str()) {
        Some(true)
    } else if falsy.contains(&t.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Case-insensitive exact match first; small option sets then get a fuzzy pass.
pub fn parse_enum(
    engine: &SimilarityEngine,
    raw: &str,
    allowed: &[String],
    locale: BaseLocale,
) -> Option<String> {
    if allowed.is_empty() {
        return None;
    }
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    if let Some(direct) = allowed.iter().find(|c| c.to_lowercase() == normalized) {
        return Some(direct.clone());
    }
    if allowed.len() > ENUM_FUZZY_MAX_OPTIONS {
        return None;
    }
    let options: Vec<&str> = allowed.iter().map(String::as_str).collect();
    engine
        .match_fuzzy(
            &normalized,
            &options,
            FuzzyOptions::for_locale(locale).with_min_confidence(ENUM_FUZZY_MIN_CONFIDENCE),
        )
        .map(|m| m.value)
}

pub fn parse_date(raw: &str, locale: BaseLocale) -> Option<NaiveDate> {
    parse_date_with_today(raw, locale, Local::now().date_naive())
}

/// Same as [`parse_date`] with an explicit reference day for relative words.
pub fn parse_date_with_today(raw: &str, locale: BaseLocale, today: NaiveDate) -> Option<NaiveDate> {
    let t = raw.trim().to_lowercase();
    if t.is_empty() {
        return None;
    }

    if let Some(caps) = ISO_DATE.captures(&t) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = NUMERIC_DATE.captures(&t) {
        let (a, b) = (&caps[1], &caps[2]);
        let (day, month) = match locale {
            BaseLocale::Es => (a, b),
            BaseLocale::En => (b, a),
        };
        let year = if caps[3].len() == 2 { format!("20{}", &caps[3]) } else { caps[3].to_string() };
        return NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?);
    }

    let offset = match (locale, t.as_str()) {
        (BaseLocale::Es, "hoy") | (BaseLocale::En, "today") => 0,
        (BaseLocale::Es, "mañana" | "manana") | (BaseLocale::En, "tomorrow") => 1,
        (BaseLocale::Es, "ayer") | (BaseLocale::En, "yesterday") => -1,
        _ => return None,
    };
    today.checked_add_signed(Duration::days(offset))
}

/// One side of a connector range: a plain number or a single number word.
fn range_side(raw: &str, locale: BaseLocale) -> Option<f64> {
    match DIGITS.find(raw) {
        Some(m) if m.start() == 0 && m.end() == raw.len() => decimal(m.as_str()),
        _ => word_value(raw, locale),
    }
}

/// A tens value followed by a unit, as in "treinta y dos".
fn is_compound(tens: f64, unit: f64) -> bool {
    (20.0..=90.0).contains(&tens) && tens % 10.0 == 0.0 && (1.0..=9.0).contains(&unit) && unit.fract() == 0.0
}

fn ordered(a: f64, b: f64) -> NumberRange {
    NumberRange::between(a.min(b), a.max(b))
}

/// Branches in priority order: explicit `X a Y` range, comparison prefix,
/// "more/less than" phrases, then a bare number read as `{min = max}`.
pub fn parse_range_number(raw: &str, locale: BaseLocale) -> Option<NumberRange> {
    let text = strip_diacritics(&raw.trim().to_lowercase());
    if text.is_empty() {
        return None;
    }

    if let Some(caps) = DIGIT_RANGE.captures(&text) {
        if let (Some(a), Some(b)) = (decimal(&caps[1]), decimal(&caps[2])) {
            return Some(ordered(a, b));
        }
    }

    if let Some(caps) = CONNECTOR_RANGE.captures(&text) {
        if let (Some(a), Some(b)) = (range_side(&caps[2], locale), range_side(&caps[4], locale)) {
            let additive = matches!(&caps[3], "y" | "and");
            // "treinta y dos" is one number, not a range.
            if additive && caps.get(1).is_none() && is_compound(a, b) {
                return Some(NumberRange::between(a + b, a + b));
            }
            return Some(ordered(a, b));
        }
    }

    if let Some(caps) = COMPARISON.captures(&text) {
        let value = decimal(&caps[2])?;
        return Some(match &caps[1] {
            ">=" | ">" => NumberRange::at_least(value),
            _ => NumberRange::at_most(value),
        });
    }

    let (upper, lower) = match locale {
        BaseLocale::Es => (&*ES_UPPER_BOUND, &*ES_LOWER_BOUND),
        BaseLocale::En => (&*EN_UPPER_BOUND, &*EN_LOWER_BOUND),
    };
    if let Some(caps) = upper.captures(&text) {
        if let Some(value) = to_number_loose(&caps[1], locale) {
            return Some(NumberRange::at_most(value));
        }
    }
    if let Some(caps) = lower.captures(&text) {
        if let Some(value) = to_number_loose(&caps[1], locale) {
            return Some(NumberRange::at_least(value));
        }
    }

    to_number_loose(&text, locale).map(|v| NumberRange::between(v, v))
}
