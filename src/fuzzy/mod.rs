// src/fuzzy/mod.rs
pub mod phonetic;
pub mod similarity;

pub use phonetic::{MemoryPhoneticStore, PhoneticCodes, PhoneticKey, PhoneticStore};
pub use similarity::{
    damerau_levenshtein, similarity, FuzzyMatch, FuzzyOptions, SimilarityEngine, Strategy, TokenScore,
};
