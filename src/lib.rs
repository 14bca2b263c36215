// src/lib.rs

pub mod catalog;
pub mod config;
pub mod core;
pub mod entities;
pub mod error;
pub mod fuzzy;
pub mod intents;
pub mod learning;
pub mod matcher;
pub mod persistence;
pub mod telemetry;
pub mod wake;

pub use crate::catalog::{ActionSpec, Catalog, EntityDef, PayloadValidator};
pub use crate::config::EngineConfig;
pub use crate::core::engine::{EngineOutcome, IntentEngine};
pub use crate::core::types::{Action, ActionType, EntityValue, Locale, NumberRange, Via, WakeVia};
pub use crate::entities::EntityType;
pub use crate::error::{Error, Result};
pub use crate::intents::ExactIntent;
pub use crate::matcher::{MatchOptions, MatchOutcome, RejectReason, UtteranceMatcher};
