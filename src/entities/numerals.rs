// File: src/entities/numerals.rs
use crate::core::text::strip_diacritics;
use crate::core::types::BaseLocale;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

// Keys are stored without diacritics; lookups fold the input the same way.
const ES_NUMBERS: &[(&str, f64)] = &[
    ("cero", 0.0),
    ("uno", 1.0),
    ("una", 1.0),
    ("dos", 2.0),
    ("tres", 3.0),
    ("cuatro", 4.0),
    ("cinco", 5.0),
    ("seis", 6.0),
    ("siete", 7.0),
    ("ocho", 8.0),
    ("nueve", 9.0),
    ("diez", 10.0),
    ("once", 11.0),
    ("doce", 12.0),
    ("trece", 13.0),
    ("catorce", 14.0),
    ("quince", 15.0),
    ("dieciseis", 16.0),
    ("diecisiete", 17.0),
    ("dieciocho", 18.0),
    ("diecinueve", 19.0),
    ("veinte", 20.0),
    ("veintiuno", 21.0),
    ("veintidos", 22.0),
    ("veintitres", 23.0),
    ("veinticuatro", 24.0),
    ("veinticinco", 25.0),
    ("veintiseis", 26.0),
    ("veintisiete", 27.0),
    ("veintiocho", 28.0),
    ("veintinueve", 29.0),
    ("treinta", 30.0),
    ("cuarenta", 40.0),
    ("cincuenta", 50.0),
    ("sesenta", 60.0),
    ("setenta", 70.0),
    ("ochenta", 80.0),
    ("noventa", 90.0),
    ("cien", 100.0),
];

const EN_NUMBERS: &[(&str, f64)] = &[
    ("zero", 0.0),
    ("one", 1.0),
    ("two", 2.0),
    ("three", 3.0),
    ("four", 4.0),
    ("five", 5.0),
    ("six", 6.0),
    ("seven", 7.0),
    ("eight", 8.0),
    ("nine", 9.0),
    ("ten", 10.0),
    ("eleven", 11.0),
    ("twelve", 12.0),
    ("thirteen", 13.0),
    ("fourteen", 14.0),
    ("fifteen", 15.0),
    ("sixteen", 16.0),
    ("seventeen", 17.0),
    ("eighteen", 18.0),
    ("nineteen", 19.0),
    ("twenty", 20.0),
    ("thirty", 30.0),
    ("forty", 40.0),
    ("fifty", 50.0),
    ("sixty", 60.0),
    ("seventy", 70.0),
    ("eighty", 80.0),
    ("ninety", 90.0),
];

static ES_INDEX: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| ES_NUMBERS.iter().copied().collect());
static EN_INDEX: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| EN_NUMBERS.iter().copied().collect());

pub(crate) static DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:[.,]\d+)?").expect("static digit pattern"));

fn table(locale: BaseLocale) -> (&'static [(&'static str, f64)], &'static HashMap<&'static str, f64>) {
    match locale {
        BaseLocale::Es => (ES_NUMBERS, &ES_INDEX),
        BaseLocale::En => (EN_NUMBERS, &EN_INDEX),
    }
}

/// Value of a single number word, if the locale table knows it.
pub fn word_value(word: &str, locale: BaseLocale) -> Option<f64> {
    let (_, index) = table(locale);
    index.get(strip_diacritics(&word.trim().to_lowercase()).as_str()).copied()
}

/// Lenient number reading, tried in order: the first digit run, the whole
/// text as one number word, the sum of every recognised number word
/// (unknown words are skipped, so "quince perro" reads as 15), and finally
/// the first table word found anywhere inside the text.
pub fn to_number_loose(text: &str, locale: BaseLocale) -> Option<f64> {
    let cleaned = strip_diacritics(&text.to_lowercase()).trim().to_string();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(m) = DIGITS.find(&cleaned) {
        if let Ok(value) = m.as_str().replace(',', ".").parse::<f64>() {
            if value.is_finite() {
                return Some(value);
            }
        }
    }

    let (words, index) = table(locale);
    if let Some(value) = index.get(cleaned.as_str()) {
        return Some(*value);
    }

    let mut accum: Option<f64> = None;
    for token in cleaned.split(|c: char| c.is_whitespace() || c == '-').filter(|t| !t.is_empty()) {
        if let Some(value) = index.get(token) {
            accum = Some(accum.unwrap_or(0.0) + value);
        }
    }
    if accum.is_some() {
        return accum;
    }

    words
        .iter()
        .find(|(word, _)| cleaned.contains(word))
        .map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_win_over_words() {
        assert_eq!(to_number_loose("pedido 42", BaseLocale::Es), Some(42.0));
        assert_eq!(to_number_loose("3,5", BaseLocale::Es), Some(3.5));
        assert_eq!(to_number_loose("-7", BaseLocale::En), Some(-7.0));
    }

    #[test]
    fn single_words_per_locale() {
        assert_eq!(to_number_loose("quince", BaseLocale::Es), Some(15.0));
        assert_eq!(to_number_loose("Dieciséis", BaseLocale::Es), Some(16.0));
        assert_eq!(to_number_loose("fifteen", BaseLocale::En), Some(15.0));
        assert_eq!(to_number_loose("fifteen", BaseLocale::Es), None);
    }

    #[test]
    fn compound_words_are_summed() {
        assert_eq!(to_number_loose("treinta y dos", BaseLocale::Es), Some(32.0));
        assert_eq!(to_number_loose("twenty-one", BaseLocale::En), Some(21.0));
    }

    #[test]
    fn unknown_words_are_ignored_in_sums() {
        // Lenient on purpose: stray words next to a number word do not block the read.
        assert_eq!(to_number_loose("quince perro", BaseLocale::Es), Some(15.0));
    }

    #[test]
    fn substring_fallback_and_miss() {
        assert_eq!(to_number_loose("cincoveces", BaseLocale::Es), Some(5.0));
        assert_eq!(to_number_loose("perro", BaseLocale::Es), None);
        assert_eq!(to_number_loose("   ", BaseLocale::En), None);
    }
}
