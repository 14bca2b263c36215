// File: src/core/engine.rs
use crate::catalog::{ActionSpec, Catalog};
use crate::config::EngineConfig;
use crate::core::context::{detect_locale, ConversationContext, LocaleContext};
use crate::core::lexicon::Lexicon;
use crate::core::text::fold;
use crate::core::types::{Action, Locale};
use crate::error::{Error, Result};
use crate::fuzzy::similarity::SimilarityEngine;
use crate::intents::{derive_intents, ExactIntent, Intent};
use crate::learning::{LearningEngine, TermConfirmation};
use crate::matcher::{MatchOptions, MatchOutcome, RejectReason, UtteranceMatcher};
use crate::persistence::{load_lexicon, save_lexicon};
use crate::telemetry::{
    Telemetry, EVENT_CONFIRM_REQUESTED, EVENT_INPUT, EVENT_INTENTS_DERIVED, EVENT_INTENT_REJECTED,
    EVENT_INTENT_SELECTED, EVENT_LEXICON_LEARNED, EVENT_LOCALE_DETECTED, EVENT_WAKE,
};
use crate::wake::{detect_wake, normalize_wake_words, strip_wake, with_default_wake, WakeEntry, DEFAULT_WAKE_WORD};
use serde_json::json;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What became of one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineOutcome {
    Dispatched(Action),
    /// The action needs a confirmation phrase before it is dispatched.
    AwaitingConfirmation(Action),
    Rejected(RejectReason),
}

impl EngineOutcome {
    pub fn action(&self) -> Option<&Action> {
        match self {
            EngineOutcome::Dispatched(action) | EngineOutcome::AwaitingConfirmation(action) => Some(action),
            EngineOutcome::Rejected(_) => None,
        }
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self, EngineOutcome::Dispatched(_))
    }
}

struct IntentCache {
    locale: Locale,
    revision: u64,
    lexicon_revision: u64,
    intents: Vec<Intent>,
}

/// Owns the catalog, the lexicon and the per-session context, and runs each
/// utterance from wake detection to a dispatched action.
pub struct IntentEngine {
    config: EngineConfig,
    catalog: Catalog,
    lexicon: Lexicon,
    similarity: SimilarityEngine,
    telemetry: Telemetry,
    locales: LocaleContext,
    conversation: ConversationContext,
    learning_engine: LearningEngine,
    custom_intents: Vec<ExactIntent>,
    cache: Option<IntentCache>,
    lexicon_path: Option<PathBuf>,
}

impl IntentEngine {
    pub fn new(config: EngineConfig) -> Self {
        let locales = LocaleContext::new(config.locale.clone(), config.fallback_locales.clone());
        let conversation = ConversationContext::new(config.history_size);
        Self {
            config,
            catalog: Catalog::new(),
            lexicon: Lexicon::new(),
            similarity: SimilarityEngine::new(),
            telemetry: Telemetry::new(),
            locales,
            conversation,
            learning_engine: LearningEngine::new(),
            custom_intents: Vec::new(),
            cache: None,
            lexicon_path: None,
        }
    }

    /// Loads the lexicon saved at `path`, starting empty when there is none
    /// yet. Later saves go to the same path.
    pub fn from_file_or_new(config: EngineConfig, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let lexicon = match load_lexicon(path) {
            Ok(lexicon) => lexicon,
            Err(Error::Io(err)) if err.kind() == ErrorKind::NotFound => Lexicon::new(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not load lexicon, starting empty");
                Lexicon::new()
            }
        };
        let mut engine = Self::new(config);
        engine.lexicon = lexicon;
        engine.lexicon_path = Some(path.to_path_buf());
        engine
    }

    /// Replaces the similarity engine, e.g. to share a phonetic store
    /// between engines.
    pub fn with_similarity(mut self, similarity: SimilarityEngine) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.set_catalog(catalog);
        self
    }

    pub fn set_catalog(&mut self, catalog: Catalog) {
        debug!(specs = catalog.len(), "catalog replaced");
        self.catalog = catalog;
        self.cache = None;
    }

    pub fn register_spec(&mut self, spec: ActionSpec) {
        self.catalog.register(spec);
    }

    /// Callback intents are tried before anything derived from the catalog,
    /// in registration order.
    pub fn register_intent(&mut self, intent: ExactIntent) {
        self.custom_intents.push(intent);
        self.cache = None;
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn conversation(&self) -> &ConversationContext {
        &self.conversation
    }

    pub fn locale(&self) -> &Locale {
        self.locales.active()
    }

    pub fn set_locale(&mut self, locale: Locale) -> bool {
        let changed = self.locales.set_active(locale);
        if changed {
            info!(locale = %self.locales.active(), "active locale changed");
        }
        changed
    }

    fn wake_entries(&self) -> Vec<WakeEntry> {
        if !self.config.require_wake {
            return Vec::new();
        }
        let mut entries = with_default_wake(normalize_wake_words(&self.config.wake_words));
        let extra: Vec<String> = self.catalog.wake_aliases().map(str::to_string).collect();
        if extra.is_empty() {
            return entries;
        }
        let default = entries.iter_mut().find(|e| {
            fold(&e.canonical) == DEFAULT_WAKE_WORD || e.aliases.iter().any(|a| fold(a) == DEFAULT_WAKE_WORD)
        });
        if let Some(entry) = default {
            for alias in extra {
                if !entry.aliases.contains(&alias) {
                    entry.aliases.push(alias);
                }
            }
        }
        entries
    }

    /// Rebuilds the intent list when the locale, the catalog or the lexicon
    /// changed. Returns whether a rebuild happened.
    fn refresh_intents(&mut self, locale: &Locale) -> bool {
        let revision = self.catalog.revision();
        if let Some(cache) = &self.cache {
            if cache.locale == *locale
                && cache.revision == revision
                && cache.lexicon_revision == self.lexicon.revision()
            {
                return false;
            }
        }
        let mut intents: Vec<Intent> = self.custom_intents.iter().cloned().map(Intent::Exact).collect();
        intents.extend(derive_intents(
            self.catalog.specs(),
            &mut self.lexicon,
            locale,
            self.locales.fallbacks(),
        ));
        // Derivation itself files aliases in the lexicon.
        self.cache = Some(IntentCache {
            locale: locale.clone(),
            revision,
            lexicon_revision: self.lexicon.revision(),
            intents,
        });
        true
    }

    fn reject(&self, input: &str, reason: RejectReason) -> EngineOutcome {
        debug!(input, reason = %reason, "utterance rejected");
        self.telemetry.emit(
            EVENT_INTENT_REJECTED,
            json!({
                "input": input,
                "reason": reason.code(),
                "detail": reason.to_string(),
            }),
        );
        EngineOutcome::Rejected(reason)
    }

    pub fn handle_utterance(&mut self, text: &str) -> EngineOutcome {
        let text = text.trim();
        self.telemetry.emit(
            EVENT_INPUT,
            json!({ "text": text, "locale": self.locales.active().as_str() }),
        );
        if text.is_empty() {
            return self.reject(text, RejectReason::EmptyInput);
        }

        if let Some(action) = self.conversation.maybe_confirm(text) {
            info!(target_name = ?action.target, "pending action confirmed");
            self.telemetry.emit(
                EVENT_INTENT_SELECTED,
                json!({ "input": text, "action": action, "confirmed": true }),
            );
            self.conversation.record(action.clone());
            return EngineOutcome::Dispatched(action);
        }

        let entries = self.wake_entries();
        let detection = detect_wake(&self.similarity, text, &entries, self.locales.active().base());
        self.telemetry.emit(
            EVENT_WAKE,
            json!({
                "input": text,
                "matched": detection.matched,
                "confidence": detection.confidence(),
                "via": detection.via(),
                "wake": detection.entry.as_ref().map(|e| e.canonical.as_str()),
                "heard": detection.result.as_ref().map(|r| r.value.as_str()),
            }),
        );
        if !detection.matched {
            return self.reject(text, RejectReason::WakeNotDetected);
        }

        let command = strip_wake(text, detection.result.as_ref());
        if command.is_empty() {
            return self.reject(text, RejectReason::EmptyInput);
        }

        if self.config.auto_detect_locale {
            let detected = detect_locale(&command, &self.locales.detection_candidates());
            let changed = self.locales.set_active(detected);
            self.telemetry.emit(
                EVENT_LOCALE_DETECTED,
                json!({ "locale": self.locales.active().as_str(), "changed": changed }),
            );
        }

        let locale = self.locales.active().clone();
        let rebuilt = self.refresh_intents(&locale);
        let intents = self.cache.as_ref().map_or(&[][..], |c| c.intents.as_slice());
        self.telemetry.emit(
            EVENT_INTENTS_DERIVED,
            json!({ "locale": locale.as_str(), "count": intents.len(), "cached": !rebuilt }),
        );

        let opts = MatchOptions {
            wake_confidence: detection.confidence(),
            wake_via: detection.via(),
            debug: self.config.debug,
            ..MatchOptions::default()
        };
        let outcome = UtteranceMatcher::new(&self.similarity, &self.lexicon, &self.config.matching)
            .with_strategy(self.config.strategy)
            .with_telemetry(&self.telemetry)
            .match_utterance(&command, intents, &locale, &opts);

        match outcome {
            MatchOutcome::Matched(action) if action.meta.require_confirm => {
                info!(input = %command, "action held for confirmation");
                self.telemetry.emit(EVENT_CONFIRM_REQUESTED, json!({ "input": command, "action": action }));
                self.conversation.hold(action.clone());
                EngineOutcome::AwaitingConfirmation(action)
            }
            MatchOutcome::Matched(action) => {
                info!(input = %command, confidence = ?action.meta.confidence, "intent selected");
                self.telemetry.emit(
                    EVENT_INTENT_SELECTED,
                    json!({ "input": command, "action": action, "confirmed": false }),
                );
                self.conversation.record(action.clone());
                EngineOutcome::Dispatched(action)
            }
            MatchOutcome::Rejected(reason) => self.reject(&command, reason),
        }
    }

    /// Teaches the engine that `heard` means `canonical` in the active
    /// locale. Returns the term's weight after the update.
    pub fn user_confirms(&mut self, heard: &str, canonical: &str) -> u64 {
        let confirmation = TermConfirmation {
            heard: heard.to_string(),
            canonical: canonical.to_string(),
            locale: self.locales.active().clone(),
        };
        let weight = self.learning_engine.learn(&mut self.lexicon, &confirmation);
        if weight > 0 {
            self.telemetry.emit(
                EVENT_LEXICON_LEARNED,
                json!({
                    "heard": confirmation.heard.trim(),
                    "canonical": confirmation.canonical.trim(),
                    "locale": confirmation.locale.as_str(),
                    "weight": weight,
                }),
            );
        }
        weight
    }

    pub fn save_lexicon(&self) -> Result<()> {
        match &self.lexicon_path {
            Some(path) => save_lexicon(&self.lexicon, path),
            None => Ok(()),
        }
    }
}
