// File: src/matcher.rs
use crate::config::MatchConfig;
use crate::core::lexicon::Lexicon;
use crate::core::text::normalize_utterance;
use crate::core::types::{Action, Annotation, EntityValue, Locale, TokenVia, Via, WakeVia};
use crate::fuzzy::similarity::{similarity, FuzzyOptions, SimilarityEngine, Strategy, TokenScore};
use crate::intents::{EntityScore, Intent, TemplatedIntent};
use crate::telemetry::{Telemetry, EVENT_RANK_DEBUG};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// Per-call knobs supplied by the caller of [`UtteranceMatcher::match_utterance`].
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions {
    /// When false, candidates without a pattern hit are not ranked at all.
    pub fuzzy: bool,
    /// Overrides the configured global threshold.
    pub threshold: Option<f64>,
    pub wake_confidence: f64,
    pub wake_via: WakeVia,
    pub debug: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            fuzzy: true,
            threshold: None,
            wake_confidence: 1.0,
            wake_via: WakeVia::Exact,
            debug: false,
        }
    }
}

/// Best candidate token for one utterance token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenComparison {
    pub token: String,
    pub best: String,
    pub score: f64,
    pub via: TokenVia,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub intent: String,
    pub score: f64,
    pub via: Via,
    pub tokens_compared: Vec<TokenComparison>,
    pub entities_parsed: BTreeMap<String, EntityValue>,
    pub threshold: Option<f64>,
    pub require_confirm: bool,
    /// `None` for soft candidates: no pattern hit, or the payload was
    /// rejected. They are ranked for diagnostics but never returned.
    pub action: Option<Action>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    EmptyInput,
    WakeNotDetected,
    NoCandidates,
    NoActionableCandidate,
    BelowThreshold { score: f64, threshold: f64 },
}

impl RejectReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::EmptyInput => "empty_input",
            RejectReason::WakeNotDetected => "wake_not_detected",
            RejectReason::NoCandidates => "no_candidates",
            RejectReason::NoActionableCandidate => "no_actionable_candidate",
            RejectReason::BelowThreshold { .. } => "below_threshold",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::BelowThreshold { score, threshold } => {
                write!(f, "best score {score:.3} is below threshold {threshold:.3}")
            }
            other => f.write_str(other.code()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(Action),
    Rejected(RejectReason),
}

impl MatchOutcome {
    pub fn action(self) -> Option<Action> {
        match self {
            MatchOutcome::Matched(action) => Some(action),
            MatchOutcome::Rejected(_) => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

/// Every scored candidate, best first. `exact` is set when a callback
/// intent recognised the text, in which case nothing else was scored.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    pub normalized: String,
    pub candidates: Vec<Candidate>,
    pub exact: Option<Action>,
}

/// Scores a cleaned utterance against derived intents and picks the winner.
pub struct UtteranceMatcher<'a> {
    engine: &'a SimilarityEngine,
    lexicon: &'a Lexicon,
    config: &'a MatchConfig,
    strategy: Strategy,
    telemetry: Option<&'a Telemetry>,
}

impl<'a> UtteranceMatcher<'a> {
    pub fn new(engine: &'a SimilarityEngine, lexicon: &'a Lexicon, config: &'a MatchConfig) -> Self {
        Self {
            engine,
            lexicon,
            config,
            strategy: Strategy::Hybrid,
            telemetry: None,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_telemetry(mut self, telemetry: &'a Telemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    fn compare_tokens(&self, input: &str, candidates: &[String], locale: &Locale) -> Vec<TokenComparison> {
        if candidates.is_empty() {
            return Vec::new();
        }
        let options: Vec<&str> = candidates.iter().map(String::as_str).collect();
        let scores = self.engine.tokenize_and_score(
            input,
            &options,
            FuzzyOptions::for_locale(locale.base())
                .with_strategy(self.strategy)
                .with_min_confidence(self.config.token_min_confidence)
                .with_max_candidates(1),
        );
        let mut grouped: BTreeMap<usize, TokenScore> = BTreeMap::new();
        for score in scores {
            let Some((index, _)) = score.span else {
                continue;
            };
            match grouped.get(&index) {
                Some(prev) if prev.score >= score.score => {}
                _ => {
                    grouped.insert(index, score);
                }
            }
        }
        grouped
            .into_values()
            .map(|s| TokenComparison {
                token: s.token,
                best: s.candidate,
                score: s.score,
                via: s.via,
            })
            .collect()
    }

    fn resolve_via(&self, matched: bool, token_avg: f64, entity_score: f64, global: f64, tokens: &[TokenComparison]) -> Via {
        let t = &self.config.via;
        if matched && global >= t.exact && token_avg >= t.exact {
            return Via::Exact;
        }
        let phonetic_hit = tokens.iter().any(|c| c.via == TokenVia::Phonetic);
        if phonetic_hit || token_avg >= t.phonetic_tokens || entity_score >= t.phonetic_entities {
            return Via::Phonetic;
        }
        Via::Global
    }

    fn score_templated(
        &self,
        intent: &TemplatedIntent,
        original: &str,
        normalized: &str,
        locale: &Locale,
        opts: &MatchOptions,
    ) -> Option<Candidate> {
        let tokens_compared = self.compare_tokens(normalized, &intent.tokens, locale);
        let token_avg = if tokens_compared.is_empty() {
            0.0
        } else {
            tokens_compared.iter().map(|c| c.score).sum::<f64>() / tokens_compared.len() as f64
        };

        let caps = intent
            .pattern
            .captures(normalized)
            .or_else(|| intent.pattern.captures(original));
        let EntityScore { score: entity_score, parsed } = match &caps {
            Some(caps) => intent.score_entities(caps, self.engine),
            None => EntityScore::default(),
        };

        let global = similarity(normalized, &intent.normalized_phrase);
        let w = &self.config.weights;
        let score = (w.wake * opts.wake_confidence.clamp(0.0, 1.0)
            + w.tokens * token_avg
            + w.entities * entity_score
            + w.global * global)
            .clamp(0.0, 1.0);
        let via = self.resolve_via(caps.is_some(), token_avg, entity_score, global, &tokens_compared);

        if !opts.fuzzy && caps.is_none() {
            return None;
        }
        let action = caps.as_ref().and_then(|caps| intent.build_action(caps, self.engine));
        if action.is_none() && score <= 0.0 {
            return None;
        }
        let require_confirm = action.as_ref().map_or(false, |a| a.meta.require_confirm);
        Some(Candidate {
            intent: intent.name.clone(),
            score,
            via,
            tokens_compared,
            entities_parsed: parsed,
            threshold: intent.confidence_threshold,
            require_confirm,
            action,
        })
    }

    /// Scores every intent. A callback intent that recognises the
    /// normalized or raw text short-circuits the ranking.
    pub fn rank(&self, text: &str, intents: &[Intent], locale: &Locale, opts: &MatchOptions) -> Ranking {
        let original = text.trim();
        let normalized = normalize_utterance(self.lexicon, locale, original);
        let mut candidates = Vec::new();

        for intent in intents {
            match intent {
                Intent::Exact(exact) => {
                    let hit = exact.try_match(&normalized).or_else(|| {
                        if normalized != original {
                            exact.try_match(original)
                        } else {
                            None
                        }
                    });
                    if let Some(action) = hit {
                        return Ranking {
                            normalized,
                            candidates: Vec::new(),
                            exact: Some(action),
                        };
                    }
                }
                Intent::Templated(templated) => {
                    if let Some(candidate) = self.score_templated(templated, original, &normalized, locale, opts) {
                        candidates.push(candidate);
                    }
                }
            }
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ranking {
            normalized,
            candidates,
            exact: None,
        }
    }

    /// Picks the best actionable candidate and applies its threshold (its
    /// own when declared, the global one otherwise). The threshold that was
    /// applied is recorded on the returned action.
    pub fn match_utterance(&self, text: &str, intents: &[Intent], locale: &Locale, opts: &MatchOptions) -> MatchOutcome {
        let original = text.trim();
        if original.is_empty() {
            return MatchOutcome::Rejected(RejectReason::EmptyInput);
        }

        let ranking = self.rank(original, intents, locale, opts);
        let global_threshold = opts.threshold.unwrap_or(self.config.threshold);
        let winner = ranking.candidates.iter().find(|c| c.action.is_some());
        let mut applied = None;

        let outcome = if let Some(action) = &ranking.exact {
            MatchOutcome::Matched(action.clone().annotated(Annotation {
                confidence: 1.0,
                via: Via::Exact,
                wake_via: opts.wake_via,
                threshold: None,
            }))
        } else if ranking.candidates.is_empty() {
            MatchOutcome::Rejected(RejectReason::NoCandidates)
        } else {
            match winner {
                None => MatchOutcome::Rejected(RejectReason::NoActionableCandidate),
                Some(best) => {
                    let threshold = best.threshold.unwrap_or(global_threshold);
                    applied = Some(threshold);
                    match &best.action {
                        Some(action) if best.score >= threshold => {
                            MatchOutcome::Matched(action.clone().annotated(Annotation {
                                confidence: best.score,
                                via: best.via,
                                wake_via: opts.wake_via,
                                threshold: Some(threshold),
                            }))
                        }
                        _ => MatchOutcome::Rejected(RejectReason::BelowThreshold {
                            score: best.score,
                            threshold,
                        }),
                    }
                }
            }
        };

        if opts.debug {
            self.emit_debug(original, &ranking, winner, applied, &outcome);
        }
        outcome
    }

    fn emit_debug(
        &self,
        input: &str,
        ranking: &Ranking,
        winner: Option<&Candidate>,
        threshold: Option<f64>,
        outcome: &MatchOutcome,
    ) {
        let Some(telemetry) = self.telemetry else {
            return;
        };
        let top_k: Vec<_> = ranking
            .candidates
            .iter()
            .take(self.config.debug_top_k)
            .map(|c| {
                json!({
                    "intent": c.intent,
                    "score": c.score,
                    "via": c.via,
                    "actionable": c.action.is_some(),
                })
            })
            .collect();
        let best = winner.or(ranking.candidates.first());
        telemetry.emit(
            EVENT_RANK_DEBUG,
            json!({
                "input": input,
                "normalized": ranking.normalized,
                "topK": top_k,
                "tokensCompared": best.map(|c| &c.tokens_compared),
                "entitiesParsed": best.map(|c| &c.entities_parsed),
                "threshold": threshold,
                "requireConfirm": best.map_or(false, |c| c.require_confirm),
                "exact": ranking.exact.is_some(),
                "selected": outcome.is_match(),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ActionSpec, EntityDef};
    use crate::core::types::ActionType;
    use crate::entities::EntityType;
    use crate::intents::{derive_intents, ExactIntent};
    use std::sync::{Arc, Mutex};

    fn orders_spec() -> ActionSpec {
        ActionSpec::new("open::menu:orders", ActionType::Open)
            .with_target("menu:orders")
            .with_phrases("es", &["abre menú órdenes {orderId}"], &["abre menu pedidos {orderId}"])
            .with_command_alias("es", &["abre el menu pedidos {orderId}", "abre el menu de pedidos {orderId}"])
            .with_entity(EntityDef::new("orderId", EntityType::Number))
            .with_entity_aliases("orderId", &["pedido"])
            .with_threshold(0.75)
    }

    fn derive(specs: &[ActionSpec], lexicon: &mut Lexicon, locale: &str) -> Vec<Intent> {
        derive_intents(specs, lexicon, &Locale::new(locale), &[])
    }

    #[test]
    fn empty_input_is_rejected() {
        let engine = SimilarityEngine::new();
        let lexicon = Lexicon::new();
        let config = MatchConfig::default();
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config);
        let outcome = matcher.match_utterance("   ", &[], &Locale::new("es"), &MatchOptions::default());
        assert_eq!(outcome, MatchOutcome::Rejected(RejectReason::EmptyInput));
    }

    #[test]
    fn selects_alias_phrase_with_number_word() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let intents = derive(&[orders_spec()], &mut lexicon, "es");
        let config = MatchConfig::default();
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config);
        let opts = MatchOptions {
            threshold: Some(0.7),
            wake_confidence: 0.9,
            wake_via: WakeVia::Phonetic,
            ..MatchOptions::default()
        };

        let action = matcher
            .match_utterance("abre el menu de pedidos quince", &intents, &Locale::new("es"), &opts)
            .action()
            .unwrap();
        assert_eq!(action.payload_value("orderId"), Some(&EntityValue::Number(15.0)));
        assert_eq!(action.meta.via, Some(Via::Phonetic));
        assert_eq!(action.meta.wake_via, Some(WakeVia::Phonetic));
        assert_eq!(action.meta.confidence_threshold, Some(0.75));
        assert!(action.meta.confidence.unwrap() > 0.85);
    }

    #[test]
    fn global_threshold_is_recorded_when_intent_has_none() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let spec = ActionSpec::new("delete::order", ActionType::Delete)
            .with_target("order")
            .with_phrases("en", &["delete order {id}"], &[])
            .with_entity(EntityDef::new("id", EntityType::Number));
        let intents = derive(&[spec], &mut lexicon, "en");
        let config = MatchConfig::default();
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config);
        let opts = MatchOptions { threshold: Some(0.7), ..MatchOptions::default() };

        let action = matcher
            .match_utterance("delete order 5", &intents, &Locale::new("en"), &opts)
            .action()
            .unwrap();
        assert_eq!(action.meta.confidence_threshold, Some(0.7));

        let action = matcher
            .match_utterance("delete order 5", &intents, &Locale::new("en"), &MatchOptions::default())
            .action()
            .unwrap();
        assert_eq!(action.meta.confidence_threshold, Some(config.threshold));
    }

    #[test]
    fn intent_threshold_overrides_global() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let spec = ActionSpec::new("delete::order", ActionType::Delete)
            .with_target("order")
            .with_phrases("en", &["delete order {id}"], &[])
            .with_entity(EntityDef::new("id", EntityType::Number))
            .with_threshold(0.9);
        let intents = derive(&[spec], &mut lexicon, "en");
        let config = MatchConfig::default();
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config);
        let opts = MatchOptions {
            threshold: Some(0.7),
            wake_confidence: 0.5,
            ..MatchOptions::default()
        };

        let outcome = matcher.match_utterance("delete order five", &intents, &Locale::new("en"), &opts);
        match outcome {
            MatchOutcome::Rejected(RejectReason::BelowThreshold { score, threshold }) => {
                assert!(score >= 0.7 && score < 0.9);
                assert_eq!(threshold, 0.9);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn unrelated_text_is_not_matched() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let intents = derive(&[orders_spec()], &mut lexicon, "es");
        let config = MatchConfig::default();
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config);
        let outcome = matcher.match_utterance("pon musica tranquila", &intents, &Locale::new("es"), &MatchOptions::default());
        assert!(!outcome.is_match());
    }

    #[test]
    fn soft_candidates_are_ranked_but_never_returned() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let intents = derive(&[orders_spec()], &mut lexicon, "es");
        let config = MatchConfig::default();
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config);
        let opts = MatchOptions { threshold: Some(0.0), ..MatchOptions::default() };

        let ranking = matcher.rank("abre menu pedidos", &intents, &Locale::new("es"), &opts);
        assert!(!ranking.candidates.is_empty());
        assert!(ranking.candidates.iter().all(|c| c.action.is_none()));
        assert_eq!(
            matcher.match_utterance("abre menu pedidos", &intents, &Locale::new("es"), &opts),
            MatchOutcome::Rejected(RejectReason::NoActionableCandidate)
        );

        let strict = MatchOptions { fuzzy: false, ..opts };
        assert!(matcher.rank("abre menu pedidos", &intents, &Locale::new("es"), &strict).candidates.is_empty());
    }

    #[test]
    fn ties_keep_registration_order() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let first = ActionSpec::new("first", ActionType::Open).with_phrases("en", &["open panel"], &[]);
        let second = ActionSpec::new("second", ActionType::Toggle).with_phrases("en", &["open panel"], &[]);
        let intents = derive(&[first, second], &mut lexicon, "en");
        let config = MatchConfig::default();
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config);

        let action = matcher
            .match_utterance("open panel", &intents, &Locale::new("en"), &MatchOptions::default())
            .action()
            .unwrap();
        assert_eq!(action.action_type, ActionType::Open);
        assert_eq!(action.meta.via, Some(Via::Exact));
        assert!((action.meta.confidence.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn exact_callback_intents_short_circuit() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let mut intents = vec![Intent::Exact(ExactIntent::new("help", |text| {
            (text == "ayuda").then(|| Action::new(ActionType::Speak).with_target("help"))
        }))];
        intents.extend(derive(&[orders_spec()], &mut lexicon, "es"));
        let config = MatchConfig::default();
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config);

        let action = matcher
            .match_utterance("Ayuda", &intents, &Locale::new("es"), &MatchOptions::default())
            .action()
            .unwrap();
        assert_eq!(action.action_type, ActionType::Speak);
        assert_eq!(action.meta.confidence, Some(1.0));
        assert_eq!(action.meta.via, Some(Via::Exact));
    }

    #[test]
    fn debug_mode_emits_ranking() {
        let engine = SimilarityEngine::new();
        let mut lexicon = Lexicon::new();
        let intents = derive(&[orders_spec()], &mut lexicon, "es");
        let config = MatchConfig::default();
        let telemetry = Telemetry::new();
        let dumps = Arc::new(Mutex::new(Vec::new()));
        let sink = dumps.clone();
        telemetry.on(EVENT_RANK_DEBUG, move |_, payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        });
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config).with_telemetry(&telemetry);
        let opts = MatchOptions { debug: true, ..MatchOptions::default() };

        matcher.match_utterance("abre menu pedidos 7", &intents, &Locale::new("es"), &opts);
        let dumps = dumps.lock().unwrap();
        assert_eq!(dumps.len(), 1);
        let top = dumps[0]["topK"].as_array().unwrap();
        assert!(!top.is_empty() && top.len() <= 5);
        assert_eq!(dumps[0]["entitiesParsed"]["orderId"], 7.0);
        assert_eq!(dumps[0]["threshold"], 0.75);
        assert_eq!(dumps[0]["selected"], true);
    }

    #[test]
    fn debug_mode_reports_early_outcomes() {
        let engine = SimilarityEngine::new();
        let lexicon = Lexicon::new();
        let config = MatchConfig::default();
        let telemetry = Telemetry::new();
        let dumps = Arc::new(Mutex::new(Vec::new()));
        let sink = dumps.clone();
        telemetry.on(EVENT_RANK_DEBUG, move |_, payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        });
        let matcher = UtteranceMatcher::new(&engine, &lexicon, &config).with_telemetry(&telemetry);
        let opts = MatchOptions { debug: true, ..MatchOptions::default() };
        let help = vec![Intent::Exact(ExactIntent::new("help", |text| {
            (text == "ayuda").then(|| Action::new(ActionType::Speak))
        }))];

        assert!(matcher.match_utterance("ayuda", &help, &Locale::new("es"), &opts).is_match());
        assert_eq!(
            matcher.match_utterance("ayuda", &[], &Locale::new("es"), &opts),
            MatchOutcome::Rejected(RejectReason::NoCandidates)
        );

        let dumps = dumps.lock().unwrap();
        assert_eq!(dumps.len(), 2);
        assert_eq!(dumps[0]["exact"], true);
        assert_eq!(dumps[0]["selected"], true);
        assert!(dumps[0]["topK"].as_array().unwrap().is_empty());
        assert_eq!(dumps[1]["exact"], false);
        assert_eq!(dumps[1]["selected"], false);
        assert!(dumps[1]["threshold"].is_null());
    }
}
