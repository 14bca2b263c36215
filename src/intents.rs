// File: src/intents.rs
use crate::catalog::{ActionSpec, EntityDef, PayloadValidator};
use crate::core::lexicon::Lexicon;
use crate::core::text::{normalize_utterance, strip_diacritics};
use crate::core::types::{Action, ActionMeta, ActionType, EntityValue, Locale, Payload};
use crate::entities::{parse_value, score_value, EntityType};
use crate::error::{Error, Result};
use crate::fuzzy::similarity::{similarity, SimilarityEngine};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]+)\}").expect("static placeholder pattern"));

/// Callback matcher for intents registered in code. Returns the action when
/// the text is recognised.
pub type ExactMatcher = Arc<dyn Fn(&str) -> Option<Action> + Send + Sync>;

#[derive(Clone)]
pub struct ExactIntent {
    pub name: String,
    matcher: ExactMatcher,
}

impl ExactIntent {
    pub fn new<F>(name: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&str) -> Option<Action> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            matcher: Arc::new(matcher),
        }
    }

    pub fn try_match(&self, text: &str) -> Option<Action> {
        (self.matcher)(text)
    }
}

impl fmt::Debug for ExactIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExactIntent").field("name", &self.name).finish()
    }
}

/// One placeholder in a phrase, bound to its capture group.
#[derive(Debug, Clone)]
pub struct Slot {
    pub group: String,
    pub entity: EntityDef,
}

/// What the action builder copies from the spec.
#[derive(Debug, Clone)]
struct ActionTemplate {
    action_type: ActionType,
    target: Option<String>,
    scope: Option<String>,
    require_confirm: bool,
    validator: Option<PayloadValidator>,
}

/// A concrete phrase variant of one action spec in one locale.
#[derive(Debug, Clone)]
pub struct TemplatedIntent {
    pub name: String,
    pub phrase: String,
    pub pattern: Regex,
    pub normalized_phrase: String,
    pub tokens: Vec<String>,
    pub slots: Vec<Slot>,
    pub entity_synonyms: BTreeMap<String, Vec<String>>,
    pub confidence_threshold: Option<f64>,
    pub locale: Locale,
    template: ActionTemplate,
}

/// Entities read from a pattern hit, with their averaged confidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityScore {
    pub score: f64,
    pub parsed: BTreeMap<String, EntityValue>,
}

impl TemplatedIntent {
    fn variants(&self, entity: &EntityDef) -> &[String] {
        self.entity_synonyms
            .get(&entity.name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Average confidence over the slots that produced a usable value. A
    /// pattern hit on a phrase without slots has nothing left to extract and
    /// scores 1.
    pub fn score_entities(&self, caps: &Captures<'_>, engine: &SimilarityEngine) -> EntityScore {
        if self.slots.is_empty() {
            return EntityScore { score: 1.0, parsed: BTreeMap::new() };
        }
        let mut total = 0.0;
        let mut counted = 0usize;
        let mut parsed = BTreeMap::new();
        for slot in &self.slots {
            let Some(raw) = caps.name(&slot.group) else {
                continue;
            };
            let scored = score_value(
                engine,
                slot.entity.kind,
                raw.as_str(),
                self.variants(&slot.entity),
                self.locale.base(),
            );
            if scored.confidence > 0.0 {
                total += scored.confidence;
                counted += 1;
            }
            if let Some(value) = scored.value {
                parsed.insert(slot.entity.name.clone(), value);
            }
        }
        EntityScore {
            score: if counted > 0 { total / counted as f64 } else { 0.0 },
            parsed,
        }
    }

    /// Builds the action for a pattern hit. `None` when the spec's validator
    /// rejects the payload.
    pub fn build_action(&self, caps: &Captures<'_>, engine: &SimilarityEngine) -> Option<Action> {
        let mut payload = Payload::new();
        for slot in &self.slots {
            let Some(raw) = caps.name(&slot.group) else {
                continue;
            };
            let value = parse_value(
                engine,
                slot.entity.kind,
                raw.as_str(),
                self.variants(&slot.entity),
                self.locale.base(),
            );
            if let Some(value) = value {
                payload.insert(slot.entity.name.clone(), value);
            }
        }
        let payload = (!payload.is_empty()).then_some(payload);

        if let Some(validator) = &self.template.validator {
            if !validator.accepts(payload.as_ref()) {
                debug!(intent = %self.name, "payload rejected by validator");
                return None;
            }
        }

        Some(Action {
            action_type: self.template.action_type,
            target: self.template.target.clone(),
            scope: self.template.scope.clone(),
            payload,
            meta: ActionMeta {
                desc: Some(self.phrase.clone()),
                confidence_threshold: self.confidence_threshold,
                require_confirm: self.template.require_confirm,
                ..ActionMeta::default()
            },
        })
    }
}

#[derive(Debug, Clone)]
pub enum Intent {
    Exact(ExactIntent),
    Templated(TemplatedIntent),
}

impl Intent {
    pub fn name(&self) -> &str {
        match self {
            Intent::Exact(intent) => &intent.name,
            Intent::Templated(intent) => &intent.name,
        }
    }
}

fn slot_class(kind: EntityType) -> &'static str {
    match kind {
        EntityType::Number => r"\d+(?:[.,]\d+)?|[a-zA-Záéíóúñ]+",
        EntityType::Boolean => r"[a-zA-Záéíóúñ]+",
        EntityType::Enum => r"[a-zA-Z0-9_\-áéíóúñ]+",
        EntityType::Date => r"[\wáéíóúñ\-/]+",
        EntityType::RangeNumber => r"[\w\s\-–—<>=.,]+",
        EntityType::String => r".+?",
    }
}

/// Compiles a phrase template into an anchored, case-insensitive pattern.
/// Literal text is matched without diacritics; each `{name}` becomes a named
/// group using the entity's own pattern or its type's default class.
/// Placeholders with no declared entity capture free text.
pub fn phrase_to_regex(phrase: &str, entities: &[EntityDef]) -> Result<(Regex, Vec<Slot>)> {
    let trimmed = phrase.trim();
    let mut pattern = String::from("(?i)^");
    let mut slots = Vec::new();
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(trimmed) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        pattern.push_str(&regex::escape(&strip_diacritics(&trimmed[last..whole.start()])));
        let name = name.as_str().trim();
        let entity = entities
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .unwrap_or_else(|| EntityDef::new(name, EntityType::String));
        let class = match &entity.pattern {
            Some(custom) => {
                Regex::new(custom).map_err(|source| Error::Pattern {
                    entity: entity.name.clone(),
                    source,
                })?;
                format!("(?:{custom})")
            }
            None => slot_class(entity.kind).to_string(),
        };
        let group = format!("e{}", slots.len());
        pattern.push_str(&format!("(?P<{group}>{class})"));
        slots.push(Slot { group, entity });
        last = whole.end();
    }
    pattern.push_str(&regex::escape(&strip_diacritics(&trimmed[last..])));
    pattern.push('$');

    let compiled = Regex::new(&pattern).map_err(|source| Error::Pattern {
        entity: phrase.to_string(),
        source,
    })?;
    Ok((compiled, slots))
}

fn locale_candidates(locale: &Locale) -> Vec<String> {
    let mut list = vec![locale.as_str().to_string()];
    let short = locale.short();
    if !list.contains(&short) {
        list.push(short);
    }
    list
}

/// Option closest to `alias`; ties keep the earlier option.
fn closest_option<'a>(alias: &str, options: &'a [String]) -> Option<&'a String> {
    let mut best: Option<(&String, f64)> = None;
    for option in options {
        let score = similarity(alias, option);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((option, score));
        }
    }
    best.map(|(option, _)| option)
}

/// Expands every spec into concrete intents for `locale`. Specs with no
/// phrases for the locale or its short tag are retried with each fallback in
/// order. Entity aliases and spec wake aliases are registered in the
/// lexicon's phonetic bank along the way.
pub fn derive_intents(specs: &[ActionSpec], lexicon: &mut Lexicon, locale: &Locale, fallbacks: &[Locale]) -> Vec<Intent> {
    let mut intents = Vec::new();
    for spec in specs {
        let mut phrase_locale = locale.clone();
        let mut phrases = spec.command_variants(&locale_candidates(locale));
        if phrases.is_empty() {
            for fallback in fallbacks {
                phrases = spec.command_variants(&locale_candidates(fallback));
                if !phrases.is_empty() {
                    phrase_locale = fallback.clone();
                    break;
                }
            }
        }
        if phrases.is_empty() {
            continue;
        }
        let base = phrase_locale.base();

        let mut entity_synonyms = BTreeMap::new();
        for entity in &spec.entities {
            let variants = spec.entity_variants(entity);
            for alias in &variants {
                if let Some(option) = closest_option(alias, &entity.options) {
                    lexicon.register_phonetic(base, alias, option);
                }
            }
            entity_synonyms.insert(entity.name.clone(), variants);
        }
        for alias in &spec.aliases.wake {
            lexicon.register_phonetic(base, alias, alias);
        }

        let template = ActionTemplate {
            action_type: spec.action_type,
            target: spec.target.clone(),
            scope: spec.scope.clone(),
            require_confirm: spec.meta.require_confirm,
            validator: spec.validator.clone(),
        };

        for phrase in phrases {
            let (pattern, slots) = match phrase_to_regex(&phrase, &spec.entities) {
                Ok(compiled) => compiled,
                Err(err) => {
                    warn!(spec = %spec.name, phrase = %phrase, error = %err, "skipping phrase variant");
                    continue;
                }
            };
            let normalized = normalize_utterance(lexicon, &phrase_locale, &phrase);
            let stripped = PLACEHOLDER.replace_all(&normalized, " ");
            let stripped = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
            let normalized_phrase = if stripped.is_empty() { normalized } else { stripped };
            let tokens = normalized_phrase.split_whitespace().map(str::to_string).collect();

            intents.push(Intent::Templated(TemplatedIntent {
                name: format!("{}:{}", spec.name, phrase),
                phrase,
                pattern,
                normalized_phrase,
                tokens,
                slots,
                entity_synonyms: entity_synonyms.clone(),
                confidence_threshold: spec.meta.confidence_threshold,
                locale: phrase_locale.clone(),
                template: template.clone(),
            }));
        }
    }
    debug!(locale = %locale, count = intents.len(), "derived intents");
    intents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BaseLocale;

    fn orders_spec() -> ActionSpec {
        ActionSpec::new("open::menu:orders", ActionType::Open)
            .with_target("menu:orders")
            .with_phrases("es", &["abre menú órdenes {orderId}"], &["abre menu pedidos {orderId}"])
            .with_command_alias("es", &["abre el menu de pedidos {orderId}"])
            .with_entity(EntityDef::new("orderId", EntityType::Number))
            .with_entity_aliases("orderId", &["pedido"])
            .with_threshold(0.75)
    }

    fn templated(intent: &Intent) -> &TemplatedIntent {
        match intent {
            Intent::Templated(t) => t,
            Intent::Exact(_) => panic!("expected templated intent"),
        }
    }

    #[test]
    fn pattern_captures_number_slot() {
        let (rx, slots) = phrase_to_regex("abre menú órdenes {orderId}", &orders_spec().entities).unwrap();
        assert_eq!(slots.len(), 1);
        let caps = rx.captures("ABRE menu ordenes 15").unwrap();
        assert_eq!(&caps["e0"], "15");
        assert!(rx.captures("abre menu ordenes").is_none());
        assert!(rx.captures("abre menu ordenes 15 ya").is_none());
    }

    #[test]
    fn literal_text_is_escaped() {
        let (rx, slots) = phrase_to_regex("¿qué pasa? (v2)", &[]).unwrap();
        assert!(slots.is_empty());
        assert!(rx.is_match("¿que pasa? (v2)"));
        assert!(!rx.is_match("que pasa v2"));
    }

    #[test]
    fn slots_follow_placeholder_order() {
        let entities = vec![
            EntityDef::new("color", EntityType::Enum).with_options(["rojo", "azul"]),
            EntityDef::new("size", EntityType::Number),
        ];
        let (rx, slots) = phrase_to_regex("pinta {size} cajas de {color}", &entities).unwrap();
        assert_eq!(slots[0].entity.name, "size");
        assert_eq!(slots[1].entity.name, "color");
        let caps = rx.captures("pinta 3 cajas de azul").unwrap();
        assert_eq!(&caps["e0"], "3");
        assert_eq!(&caps["e1"], "azul");
    }

    #[test]
    fn custom_patterns_are_validated() {
        let mut ent = EntityDef::new("code", EntityType::String);
        ent.pattern = Some("[A-Z]{3}-\\d+".into());
        let (rx, _) = phrase_to_regex("busca {code}", &[ent.clone()]).unwrap();
        assert!(rx.is_match("busca abc-12"));

        ent.pattern = Some("([".into());
        assert!(matches!(phrase_to_regex("busca {code}", &[ent]), Err(Error::Pattern { .. })));
    }

    #[test]
    fn derives_one_intent_per_phrase_variant() {
        let mut lexicon = Lexicon::new();
        let intents = derive_intents(&[orders_spec()], &mut lexicon, &Locale::new("es-CR"), &[]);
        assert_eq!(intents.len(), 3);
        let first = templated(&intents[0]);
        assert_eq!(first.name, "open::menu:orders:abre menú órdenes {orderId}");
        assert_eq!(first.normalized_phrase, "abre menu ordenes");
        assert_eq!(first.tokens, vec!["abre", "menu", "ordenes"]);
        assert_eq!(first.confidence_threshold, Some(0.75));
    }

    #[test]
    fn falls_back_when_locale_has_no_phrases() {
        let spec = ActionSpec::new("close::panel", ActionType::Close).with_phrases("en", &["close panel"], &[]);
        let mut lexicon = Lexicon::new();
        assert!(derive_intents(&[spec.clone()], &mut lexicon, &Locale::new("es"), &[]).is_empty());
        let intents = derive_intents(&[spec], &mut lexicon, &Locale::new("es"), &[Locale::new("en")]);
        assert_eq!(intents.len(), 1);
        assert_eq!(templated(&intents[0]).locale, Locale::new("en"));
    }

    #[test]
    fn entity_aliases_map_to_closest_option() {
        let spec = ActionSpec::new("filter::orders", ActionType::Filter)
            .with_phrases("es", &["filtra pedidos {status}"], &[])
            .with_entity(EntityDef::new("status", EntityType::Enum).with_options(["pendiente", "enviado"]))
            .with_entity_aliases("status", &["enviados", "pendientes"])
            .with_wake_aliases(&["nora"]);
        let mut lexicon = Lexicon::new();
        derive_intents(&[spec], &mut lexicon, &Locale::new("es"), &[]);
        assert_eq!(lexicon.lookup_phonetic(BaseLocale::Es, "enviados"), Some("enviado"));
        assert_eq!(lexicon.lookup_phonetic(BaseLocale::Es, "pendientes"), Some("pendiente"));
        assert_eq!(lexicon.lookup_phonetic(BaseLocale::Es, "nora"), Some("nora"));
    }

    #[test]
    fn builder_parses_payload_and_copies_meta() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let spec = orders_spec().requiring_confirmation();
        let intents = derive_intents(&[spec], &mut lexicon, &Locale::new("es"), &[]);
        let intent = templated(&intents[2]);
        let caps = intent.pattern.captures("abre el menu de pedidos quince").unwrap();
        let action = intent.build_action(&caps, &engine).unwrap();
        assert_eq!(action.action_type, ActionType::Open);
        assert_eq!(action.target.as_deref(), Some("menu:orders"));
        assert_eq!(action.payload_value("orderId"), Some(&EntityValue::Number(15.0)));
        assert_eq!(action.meta.desc.as_deref(), Some("abre el menu de pedidos {orderId}"));
        assert!(action.meta.require_confirm);

        let scored = intent.score_entities(&caps, &engine);
        assert_eq!(scored.score, 0.85);
    }

    #[test]
    fn validator_rejection_drops_action() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let spec = orders_spec().with_validator(PayloadValidator::new(|payload| {
            payload
                .and_then(|p| p.get("orderId"))
                .and_then(EntityValue::as_number)
                .map_or(false, |n| n < 10.0)
        }));
        let intents = derive_intents(&[spec], &mut lexicon, &Locale::new("es"), &[]);
        let intent = templated(&intents[1]);
        let caps = intent.pattern.captures("abre menu pedidos 15").unwrap();
        assert!(intent.build_action(&caps, &engine).is_none());
        let caps = intent.pattern.captures("abre menu pedidos 5").unwrap();
        assert!(intent.build_action(&caps, &engine).is_some());
    }
}
