// File: src/core/context.rs
use crate::core::text::fold;
use crate::core::types::{Action, BaseLocale, Locale};
use std::collections::VecDeque;

const ES_HINTS: &[&str] = &[
    "el", "la", "los", "las", "de", "del", "que", "por", "para", "con", "un", "una", "y", "abre", "abrir",
    "cierra", "cerrar", "elimina", "eliminar", "borra", "borrar", "muestra", "mostrar", "crea", "crear",
    "orden", "ordenes", "pedido", "pedidos", "hola", "oye", "hoy", "ayer", "manana", "favor", "si",
];

const EN_HINTS: &[&str] = &[
    "the", "of", "to", "for", "with", "and", "my", "open", "close", "delete", "remove", "show", "create",
    "order", "orders", "please", "hey", "today", "yesterday", "tomorrow", "yes",
];

/// Characters that only show up in Spanish text.
const ES_MARKS: &[char] = &['á', 'é', 'í', 'ó', 'ú', 'ñ', 'ü', '¿', '¡'];
const ES_MARK_WEIGHT: u32 = 2;

/// Guesses the language family of `text` and returns the first candidate of
/// that family. With no evidence either way the first candidate wins.
pub fn detect_locale(text: &str, candidates: &[Locale]) -> Locale {
    let first = candidates.first().cloned().unwrap_or_default();

    let mut es_score = 0u32;
    let mut en_score = 0u32;
    for token in fold(text).split(' ') {
        if ES_HINTS.contains(&token) {
            es_score += 1;
        }
        if EN_HINTS.contains(&token) {
            en_score += 1;
        }
    }
    if text.to_lowercase().chars().any(|c| ES_MARKS.contains(&c)) {
        es_score += ES_MARK_WEIGHT;
    }

    let family = match es_score.cmp(&en_score) {
        std::cmp::Ordering::Greater => BaseLocale::Es,
        std::cmp::Ordering::Less => BaseLocale::En,
        std::cmp::Ordering::Equal => return first,
    };
    candidates
        .iter()
        .find(|c| c.base() == family)
        .cloned()
        .unwrap_or(first)
}

/// Active locale plus the ordered fallbacks used when a catalog has no
/// phrases for it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleContext {
    active: Locale,
    fallbacks: Vec<Locale>,
}

impl LocaleContext {
    pub fn new(active: Locale, fallbacks: Vec<Locale>) -> Self {
        Self { active, fallbacks }
    }

    pub fn active(&self) -> &Locale {
        &self.active
    }

    pub fn set_active(&mut self, locale: Locale) -> bool {
        if locale == self.active {
            return false;
        }
        self.active = locale;
        true
    }

    pub fn fallbacks(&self) -> &[Locale] {
        &self.fallbacks
    }

    /// Active locale, its short tag, then the fallbacks; no duplicates.
    pub fn detection_candidates(&self) -> Vec<Locale> {
        let mut out: Vec<Locale> = Vec::with_capacity(self.fallbacks.len() + 2);
        let short = Locale::new(self.active.short());
        for locale in std::iter::once(&self.active).chain(std::iter::once(&short)).chain(&self.fallbacks) {
            if !out.contains(locale) {
                out.push(locale.clone());
            }
        }
        out
    }
}

impl Default for LocaleContext {
    fn default() -> Self {
        Self::new(Locale::new("es"), vec![Locale::new("es"), Locale::new("en")])
    }
}

const SINGLE_WORD_CONFIRMATIONS: &[&str] = &[
    "si", "ok", "okay", "dale", "confirma", "confirmo", "yes", "yeah", "please", "eliminala", "eliminarla",
];
const MULTI_WORD_CONFIRMATIONS: &[&str] = &["do it", "delete it", "remove it"];

/// Recently dispatched actions and at most one action waiting for the user
/// to confirm it.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    window_size: usize,
    history: VecDeque<Action>,
    pending: Option<Action>,
}

impl ConversationContext {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            history: VecDeque::with_capacity(window_size),
            pending: None,
        }
    }

    /// Remembers a dispatched action, dropping the oldest past the window.
    pub fn record(&mut self, action: Action) {
        if self.window_size == 0 {
            return;
        }
        if self.history.len() == self.window_size {
            self.history.pop_front();
        }
        self.history.push_back(action);
    }

    pub fn last(&self) -> Option<&Action> {
        self.history.back()
    }

    /// Parks an action until a confirmation phrase arrives. Replaces any
    /// earlier pending action.
    pub fn hold(&mut self, action: Action) {
        self.pending = Some(action);
    }

    pub fn pending(&self) -> Option<&Action> {
        self.pending.as_ref()
    }

    /// Releases the pending action if `utterance` confirms it.
    pub fn maybe_confirm(&mut self, utterance: &str) -> Option<Action> {
        self.pending.as_ref()?;
        let normalized = fold(utterance);
        if normalized.is_empty() {
            return None;
        }
        let single = normalized.split(' ').any(|t| SINGLE_WORD_CONFIRMATIONS.contains(&t));
        let multi = MULTI_WORD_CONFIRMATIONS.iter().any(|p| normalized.contains(p));
        if !single && !multi {
            return None;
        }
        self.pending.take()
    }
}
