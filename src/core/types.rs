// src/core/types.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A locale tag as supplied by the caller (e.g. "es-CR", "en_US", "en").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locale(String);

impl Locale {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The primary subtag, lowercased ("es-CR" -> "es").
    pub fn short(&self) -> String {
        self.0
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase()
    }

    /// Every locale resolves to exactly one family; anything that is not
    /// English is treated as Spanish.
    pub fn base(&self) -> BaseLocale {
        BaseLocale::from_tag(&self.0)
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::new("es")
    }
}

impl From<&str> for Locale {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two algorithm families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseLocale {
    #[default]
    Es,
    En,
}

impl BaseLocale {
    pub fn from_tag(tag: &str) -> Self {
        let short = tag.trim().split(['-', '_']).next().unwrap_or_default();
        if short.eq_ignore_ascii_case("en") {
            BaseLocale::En
        } else {
            BaseLocale::Es
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            BaseLocale::Es => "es",
            BaseLocale::En => "en",
        }
    }
}

impl From<BaseLocale> for Locale {
    fn from(base: BaseLocale) -> Self {
        Locale::new(base.code())
    }
}

/// How an intent candidate was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Via {
    Exact,
    Phonetic,
    Global,
}

/// How a single token (or the wake phrase) was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenVia {
    Exact,
    Phonetic,
    Edit,
}

/// Wake provenance attached to returned actions; `None` when no wake phrase
/// was involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WakeVia {
    Exact,
    Phonetic,
    Edit,
    #[default]
    None,
}

impl From<TokenVia> for WakeVia {
    fn from(via: TokenVia) -> Self {
        match via {
            TokenVia::Exact => WakeVia::Exact,
            TokenVia::Phonetic => WakeVia::Phonetic,
            TokenVia::Edit => WakeVia::Edit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Open,
    Close,
    Toggle,
    Create,
    Update,
    Delete,
    Filter,
    Set,
    Navigate,
    Focus,
    View,
    Hover,
    Speak,
    Custom,
    Click,
    Reset,
    Increment,
}

/// An inclusive numeric range; either bound may be open.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NumberRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self { min: Some(min), max: Some(max) }
    }

    pub fn at_least(min: f64) -> Self {
        Self { min: Some(min), max: None }
    }

    pub fn at_most(max: f64) -> Self {
        Self { min: None, max: Some(max) }
    }
}

/// A typed value extracted from an entity slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityValue {
    Bool(bool),
    Number(f64),
    Date(NaiveDate),
    Range(NumberRange),
    Text(String),
}

impl EntityValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EntityValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            EntityValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EntityValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

pub type Payload = BTreeMap<String, EntityValue>;

/// Well-known metadata plus an open extension bag.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<Via>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_via: Option<WakeVia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default)]
    pub require_confirm: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An opaque command descriptor handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
    #[serde(default)]
    pub meta: ActionMeta,
}

/// Match provenance merged into an action's metadata on the way out.
#[derive(Debug, Clone, Copy)]
pub struct Annotation {
    pub confidence: f64,
    pub via: Via,
    pub wake_via: WakeVia,
    pub threshold: Option<f64>,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            target: None,
            scope: None,
            payload: None,
            meta: ActionMeta::default(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Shallow metadata merge; fields not covered by the annotation survive,
    /// and an existing threshold is kept when the annotation carries none.
    pub fn annotated(self, info: Annotation) -> Self {
        let meta = ActionMeta {
            confidence: Some(info.confidence),
            via: Some(info.via),
            wake_via: Some(info.wake_via),
            confidence_threshold: info.threshold.or(self.meta.confidence_threshold),
            ..self.meta
        };
        Self { meta, ..self }
    }

    pub fn payload_value(&self, name: &str) -> Option<&EntityValue> {
        self.payload.as_ref().and_then(|p| p.get(name))
    }
}
