//! Keyword frequency analysis over a message corpus.
//!
//! Offline/batch path: tokenize a group's recent text messages and report
//! the most frequent terms. Tokenization is a pluggable collaborator so a
//! dictionary-based segmenter (for scripts without whitespace word
//! boundaries) can stand in for the default splitter without touching the
//! counting logic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Splits text into word tokens.
pub trait Tokenizer: Send + Sync {
    /// Returns the word tokens of `text`, in order of appearance.
    fn tokenize(&self, text: &str) -> Vec<String>;
}

/// Default tokenizer: splits on anything that is not alphanumeric.
///
/// Adequate for whitespace-delimited languages; unsegmented scripts come
/// out as run-length tokens and want a real segmenter behind the
/// [`Tokenizer`] trait instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleTokenizer;

impl Tokenizer for SimpleTokenizer {
    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_string())
            .collect()
    }
}

/// One token with its frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCount {
    /// The token.
    pub token: String,
    /// How many times it appeared.
    pub count: u64,
}

/// Frequency report over a corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordReport {
    /// Total tokens counted (after the single-character filter).
    pub total_tokens: u64,
    /// Distinct tokens counted.
    pub unique_tokens: u64,
    /// The most frequent tokens, descending by count; ties keep
    /// first-seen order.
    pub top: Vec<TokenCount>,
}

/// How many top tokens a report carries by default.
pub const DEFAULT_TOP_N: usize = 20;

/// Counts token frequencies across a corpus of message texts.
///
/// Single-character tokens are discarded. Returns `None` when the corpus
/// produces no tokens at all, not an empty report.
pub fn analyze_corpus<'a, I>(texts: I, tokenizer: &dyn Tokenizer, top_n: usize) -> Option<KeywordReport>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, (u64, usize)> = HashMap::new();
    let mut total: u64 = 0;
    let mut next_seen = 0usize;

    for text in texts {
        for token in tokenizer.tokenize(text) {
            if token.chars().count() <= 1 {
                continue;
            }
            total += 1;
            let entry = counts.entry(token).or_insert_with(|| {
                let seen = next_seen;
                next_seen += 1;
                (0, seen)
            });
            entry.0 += 1;
        }
    }

    if total == 0 {
        return None;
    }

    let unique_tokens = counts.len() as u64;
    let mut ranked: Vec<(String, u64, usize)> = counts
        .into_iter()
        .map(|(token, (count, seen))| (token, count, seen))
        .collect();
    // Descending count, first-seen order breaking ties (stable contract).
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    Some(KeywordReport {
        total_tokens: total,
        unique_tokens,
        top: ranked
            .into_iter()
            .take(top_n)
            .map(|(token, count, _)| TokenCount { token, count })
            .collect(),
    })
}
