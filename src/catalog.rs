// File: src/catalog.rs
use crate::core::types::{ActionType, Payload};
use crate::entities::EntityType;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhrasePack {
    #[serde(default)]
    pub canonical: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    /// Display labels; never matched against.
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAlias {
    pub locale: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecAliases {
    #[serde(default)]
    pub wake: Vec<String>,
    #[serde(default)]
    pub commands: Vec<CommandAlias>,
    #[serde(default)]
    pub entities: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecMeta {
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default)]
    pub require_confirm: bool,
    #[serde(default)]
    pub desc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: EntityType,
    #[serde(default)]
    pub options: Vec<String>,
    /// Custom slot pattern, used in place of the type's default.
    #[serde(default)]
    pub pattern: Option<String>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, kind: EntityType) -> Self {
        Self {
            name: name.into(),
            kind,
            options: Vec::new(),
            pattern: None,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Semantic check run on the extracted payload; `false` drops the candidate.
#[derive(Clone)]
pub struct PayloadValidator(Arc<dyn Fn(Option<&Payload>) -> bool + Send + Sync>);

impl PayloadValidator {
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(Option<&Payload>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(check))
    }

    pub fn accepts(&self, payload: Option<&Payload>) -> bool {
        (self.0)(payload)
    }
}

impl fmt::Debug for PayloadValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PayloadValidator(..)")
    }
}

/// Declarative description of one application action and the phrases that
/// trigger it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    /// Keyed by locale tag ("es", "es-CR", "en").
    #[serde(default)]
    pub phrases: BTreeMap<String, PhrasePack>,
    #[serde(default)]
    pub entities: Vec<EntityDef>,
    #[serde(default)]
    pub aliases: SpecAliases,
    #[serde(default)]
    pub meta: SpecMeta,
    #[serde(skip)]
    pub validator: Option<PayloadValidator>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, action_type: ActionType) -> Self {
        Self {
            name: name.into(),
            action_type,
            target: None,
            scope: None,
            phrases: BTreeMap::new(),
            entities: Vec::new(),
            aliases: SpecAliases::default(),
            meta: SpecMeta::default(),
            validator: None,
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_phrases(mut self, locale: &str, canonical: &[&str], synonyms: &[&str]) -> Self {
        let pack = self.phrases.entry(locale.to_string()).or_default();
        pack.canonical.extend(canonical.iter().map(|s| s.to_string()));
        pack.synonyms.extend(synonyms.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_command_alias(mut self, locale: &str, variants: &[&str]) -> Self {
        self.aliases.commands.push(CommandAlias {
            locale: locale.to_string(),
            variants: variants.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_entity_aliases(mut self, entity: &str, aliases: &[&str]) -> Self {
        self.aliases
            .entities
            .entry(entity.to_string())
            .or_default()
            .extend(aliases.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_wake_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases.wake.extend(aliases.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.meta.confidence_threshold = Some(threshold);
        self
    }

    pub fn requiring_confirmation(mut self) -> Self {
        self.meta.require_confirm = true;
        self
    }

    pub fn with_validator(mut self, validator: PayloadValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Canonical phrases, synonyms and command aliases for the given locale
    /// tags, in that order and without duplicates.
    pub fn command_variants(&self, locales: &[String]) -> Vec<String> {
        let mut phrases: Vec<String> = Vec::new();
        let mut push = |phrase: &String| {
            if !phrase.trim().is_empty() && !phrases.contains(phrase) {
                phrases.push(phrase.clone());
            }
        };
        for locale in locales {
            if let Some(pack) = self.phrases.get(locale) {
                pack.canonical.iter().chain(&pack.synonyms).for_each(&mut push);
            }
        }
        for alias in &self.aliases.commands {
            if locales.contains(&alias.locale) {
                alias.variants.iter().for_each(&mut push);
            }
        }
        phrases
    }

    /// Enum options followed by the declared aliases of one entity.
    pub fn entity_variants(&self, entity: &EntityDef) -> Vec<String> {
        let mut all = entity.options.clone();
        if let Some(aliases) = self.aliases.entities.get(&entity.name) {
            for alias in aliases {
                if !all.contains(alias) {
                    all.push(alias.clone());
                }
            }
        }
        all
    }
}

/// Registered action specs in registration order. Every change bumps the
/// revision so derived intents can be rebuilt lazily.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    specs: Vec<ActionSpec>,
    revision: u64,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of action specs.
    pub fn from_json(json: &str) -> Result<Self> {
        let specs: Vec<ActionSpec> = serde_json::from_str(json)?;
        let mut catalog = Self::new();
        for spec in specs {
            catalog.register(spec);
        }
        Ok(catalog)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Adds a spec, replacing one with the same name in place.
    pub fn register(&mut self, spec: ActionSpec) {
        match self.specs.iter_mut().find(|s| s.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
        self.revision += 1;
    }

    pub fn set_validator(&mut self, name: &str, validator: PayloadValidator) -> Result<()> {
        let spec = self
            .specs
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::UnknownSpec(name.to_string()))?;
        spec.validator = Some(validator);
        self.revision += 1;
        Ok(())
    }

    pub fn specs(&self) -> &[ActionSpec] {
        &self.specs
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Wake aliases declared by any spec.
    pub fn wake_aliases(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().flat_map(|s| s.aliases.wake.iter().map(String::as_str))
    }
}
