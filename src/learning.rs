// File: src/learning.rs
use crate::core::lexicon::Lexicon;
use crate::core::types::Locale;
use tracing::debug;

pub struct LearningEngine {
    weight_increment: u64,
}

/// A user telling the engine that `heard` means `canonical`.
#[derive(Debug, Clone, PartialEq)]
pub struct TermConfirmation {
    pub heard: String,
    pub canonical: String,
    pub locale: Locale,
}

impl Default for LearningEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LearningEngine {
    pub fn new() -> Self {
        Self { weight_increment: 1 }
    }

    pub fn with_increment(weight_increment: u64) -> Self {
        Self { weight_increment }
    }

    /// Reinforces the term in the locale table and files it in the phonetic
    /// bank so near misses of it resolve too. Returns the term's new weight.
    pub fn learn(&self, lexicon: &mut Lexicon, confirmation: &TermConfirmation) -> u64 {
        let heard = confirmation.heard.trim();
        let canonical = confirmation.canonical.trim();
        if heard.is_empty() || canonical.is_empty() {
            return 0;
        }

        let weight = lexicon.reinforce(&confirmation.locale, heard, canonical, self.weight_increment);
        lexicon.register_phonetic(confirmation.locale.base(), heard, canonical);

        debug!(locale = %confirmation.locale, heard, canonical, weight, "term learned");
        weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BaseLocale;

    fn confirm(heard: &str, canonical: &str) -> TermConfirmation {
        TermConfirmation {
            heard: heard.to_string(),
            canonical: canonical.to_string(),
            locale: Locale::new("es-CR"),
        }
    }

    #[test]
    fn repeated_confirmations_raise_weight() {
        let learning = LearningEngine::new();
        let mut lexicon = Lexicon::new();
        assert_eq!(learning.learn(&mut lexicon, &confirm("pedidoz", "pedidos")), 1);
        assert_eq!(learning.learn(&mut lexicon, &confirm("Pedidoz", "pedidos")), 2);

        let locale = Locale::new("es-CR");
        assert_eq!(lexicon.normalize(&locale, "pedidoz").as_deref(), Some("pedidos"));
        assert_eq!(lexicon.lookup_phonetic(BaseLocale::Es, "pedidoz"), Some("pedidos"));
    }

    #[test]
    fn new_meaning_restarts_weight() {
        let learning = LearningEngine::with_increment(3);
        let mut lexicon = Lexicon::new();
        assert_eq!(learning.learn(&mut lexicon, &confirm("carro", "cart")), 3);
        assert_eq!(learning.learn(&mut lexicon, &confirm("carro", "car")), 3);
        assert_eq!(lexicon.sense(&Locale::new("es-CR"), "carro").map(|s| s.canonical.as_str()), Some("car"));
    }

    #[test]
    fn blank_confirmation_is_ignored() {
        let learning = LearningEngine::new();
        let mut lexicon = Lexicon::new();
        assert_eq!(learning.learn(&mut lexicon, &confirm("  ", "pedidos")), 0);
        assert_eq!(lexicon.term_count(), 0);
        assert_eq!(lexicon.phonetic_count(), 0);
    }
}
