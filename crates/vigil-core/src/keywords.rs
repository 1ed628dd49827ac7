//! Sensitive keyword store and content matcher.
//!
//! The store holds the globally shared set of sensitive words, loaded from a
//! persistent backend at start-up and mutated only through [`KeywordStore::add`]
//! and [`KeywordStore::remove`]. Readers take a cheap point-in-time
//! [`KeywordSnapshot`]; mutations swap in a fresh copy, so a matching pass
//! never observes a half-applied change.
//!
//! Matching is substring matching, not tokenized matching: a keyword counts
//! if it occurs anywhere in the text, including inside other words. The
//! matcher compiles the snapshot into an Aho-Corasick automaton, one scan of
//! the text regardless of keyword count.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// A consistent point-in-time view of the keyword set.
pub type KeywordSnapshot = Arc<BTreeSet<String>>;

/// Persistent backend for the keyword collection.
///
/// Implemented by the storage layer; the in-memory store is authoritative
/// between reloads.
pub trait KeywordBackend: Send + Sync {
    /// Loads the full persisted keyword set.
    fn load_all(&self) -> Result<BTreeSet<String>>;

    /// Persists a newly added keyword.
    fn persist_add(&self, word: &str) -> Result<()>;

    /// Removes a keyword from persistence.
    fn persist_remove(&self, word: &str) -> Result<()>;
}

/// Mutable set of sensitive words shared across the process.
pub struct KeywordStore {
    backend: Arc<dyn KeywordBackend>,
    words: RwLock<KeywordSnapshot>,
}

impl KeywordStore {
    /// Creates a store by loading the persisted set from the backend.
    pub fn load(backend: Arc<dyn KeywordBackend>) -> Result<Self> {
        let words = backend.load_all()?;
        debug!(count = words.len(), "loaded sensitive keywords");
        Ok(Self {
            backend,
            words: RwLock::new(Arc::new(words)),
        })
    }

    /// Adds a keyword. Returns `Ok(true)` if it was newly added,
    /// `Ok(false)` if it was already present.
    ///
    /// The in-memory set is updated before persistence; if the backend
    /// fails, the word stays in memory and the failure is surfaced as
    /// [`EngineError::Persistence`] for the caller to retry.
    pub fn add(&self, word: &str) -> Result<bool> {
        {
            let mut guard = self.words.write().unwrap();
            if guard.contains(word) {
                return Ok(false);
            }
            let mut next = BTreeSet::clone(&guard);
            next.insert(word.to_string());
            *guard = Arc::new(next);
        }

        if let Err(e) = self.backend.persist_add(word) {
            warn!(word, error = %e, "failed to persist keyword add");
            return Err(e);
        }
        Ok(true)
    }

    /// Removes a keyword. Returns `Ok(true)` if it existed, `Ok(false)` if
    /// it was absent (and the set is left unchanged).
    pub fn remove(&self, word: &str) -> Result<bool> {
        {
            let mut guard = self.words.write().unwrap();
            if !guard.contains(word) {
                return Ok(false);
            }
            let mut next = BTreeSet::clone(&guard);
            next.remove(word);
            *guard = Arc::new(next);
        }

        if let Err(e) = self.backend.persist_remove(word) {
            warn!(word, error = %e, "failed to persist keyword removal");
            return Err(e);
        }
        Ok(true)
    }

    /// Returns a consistent snapshot of the current keyword set.
    pub fn snapshot(&self) -> KeywordSnapshot {
        Arc::clone(&self.words.read().unwrap())
    }

    /// Number of keywords currently in the set.
    pub fn len(&self) -> usize {
        self.words.read().unwrap().len()
    }

    /// Returns true if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Case handling policy for sensitive-content matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Match keywords exactly as stored.
    #[default]
    CaseSensitive,
    /// Lowercase both keywords and text before matching.
    CaseInsensitive,
}

/// Multi-pattern substring matcher over a keyword snapshot.
///
/// Built once per snapshot and reused across messages; the engine rebuilds
/// it when the keyword set changes.
pub struct SensitiveMatcher {
    automaton: Option<AhoCorasick>,
    keywords: Vec<String>,
    policy: MatchPolicy,
}

impl SensitiveMatcher {
    /// Compiles a matcher from a keyword snapshot.
    pub fn build(snapshot: &KeywordSnapshot, policy: MatchPolicy) -> Result<Self> {
        let keywords: Vec<String> = snapshot.iter().cloned().collect();
        if keywords.is_empty() {
            return Ok(Self {
                automaton: None,
                keywords,
                policy,
            });
        }

        let patterns: Vec<String> = match policy {
            MatchPolicy::CaseSensitive => keywords.clone(),
            MatchPolicy::CaseInsensitive => keywords.iter().map(|k| k.to_lowercase()).collect(),
        };

        let automaton = AhoCorasick::new(&patterns)
            .map_err(|e| EngineError::MatcherBuild(e.to_string()))?;

        Ok(Self {
            automaton: Some(automaton),
            keywords,
            policy,
        })
    }

    /// Returns the keywords present in `text` as substrings, deduplicated
    /// and in the snapshot's lexicographic order.
    ///
    /// Empty text or an empty keyword set yields an empty result.
    pub fn find(&self, text: &str) -> Vec<String> {
        let Some(automaton) = &self.automaton else {
            return Vec::new();
        };
        if text.is_empty() {
            return Vec::new();
        }

        let haystack = match self.policy {
            MatchPolicy::CaseSensitive => text.to_string(),
            MatchPolicy::CaseInsensitive => text.to_lowercase(),
        };

        let mut hits: BTreeSet<usize> = BTreeSet::new();
        for m in automaton.find_overlapping_iter(&haystack) {
            hits.insert(m.pattern().as_usize());
        }

        hits.into_iter()
            .map(|i| self.keywords[i].clone())
            .collect()
    }

    /// Returns true if `text` contains at least one keyword.
    pub fn is_sensitive(&self, text: &str) -> bool {
        !self.find(text).is_empty()
    }

    /// Number of keywords this matcher was built from.
    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }
}
