//! Decoding paths to human-readable labels.
//!
//! Labels are only ever used for diagnostics; a failed lookup never changes
//! what the tree does. [`describe_path`] falls back to the raw path text.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::repr::PathValue;

/// A failed label lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No label is known for the path.
    #[error("no label for path {0}")]
    NotFound(PathValue),
    /// The lookup service itself failed.
    #[error("decode service failed: {0}")]
    Backend(String),
}

/// Maps a path to a human-readable label.
pub trait Decoder {
    fn decode(&self, path: &PathValue) -> Result<String, DecodeError>;
}

/// Decoder that knows no labels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDecoder;

impl Decoder for NoDecoder {
    fn decode(&self, path: &PathValue) -> Result<String, DecodeError> {
        Err(DecodeError::NotFound(path.clone()))
    }
}

/// In-memory decoder built from observed `(path, word)` pairs.
///
/// A path seen with several words decodes to the most frequent one; ties go
/// to the alphabetically first word.
#[derive(Debug, Clone, Default)]
pub struct MapDecoder {
    counts: HashMap<PathValue, BTreeMap<String, usize>>,
}

impl MapDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `word` for `path`.
    pub fn insert(&mut self, path: PathValue, word: impl Into<String>) {
        *self
            .counts
            .entry(path)
            .or_default()
            .entry(word.into())
            .or_insert(0) += 1;
    }

    /// Number of distinct paths with at least one label.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

impl Decoder for MapDecoder {
    fn decode(&self, path: &PathValue) -> Result<String, DecodeError> {
        self.counts
            .get(path)
            .and_then(|words| {
                // max_by_key keeps the last maximum; iterate in reverse so the
                // alphabetically first word wins ties.
                words
                    .iter()
                    .rev()
                    .max_by_key(|(_, &count)| count)
                    .map(|(word, _)| word.clone())
            })
            .ok_or_else(|| DecodeError::NotFound(path.clone()))
    }
}

impl<D: Decoder + ?Sized> Decoder for &D {
    fn decode(&self, path: &PathValue) -> Result<String, DecodeError> {
        (**self).decode(path)
    }
}

/// `"1.2 (dog)"` when a label is known, otherwise `"1.2"`.
pub fn describe_path(decoder: &dyn Decoder, path: &PathValue) -> String {
    match decoder.decode(path) {
        Ok(label) => format!("{path} ({label})"),
        Err(_) => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathValue {
        s.parse().unwrap()
    }

    #[test]
    fn most_frequent_word_wins() {
        let mut decoder = MapDecoder::new();
        decoder.insert(p("1.2"), "hound");
        decoder.insert(p("1.2"), "dog");
        decoder.insert(p("1.2"), "dog");
        assert_eq!(decoder.decode(&p("1.2")).unwrap(), "dog");
        assert_eq!(decoder.len(), 1);
    }

    #[test]
    fn ties_break_alphabetically() {
        let mut decoder = MapDecoder::new();
        decoder.insert(p("4"), "zebra");
        decoder.insert(p("4"), "aardvark");
        assert_eq!(decoder.decode(&p("4")).unwrap(), "aardvark");
    }

    #[test]
    fn describe_falls_back_to_raw_path() {
        let mut decoder = MapDecoder::new();
        decoder.insert(p("1"), "entity");
        assert_eq!(describe_path(&decoder, &p("1")), "1 (entity)");
        assert_eq!(describe_path(&decoder, &p("1.5")), "1.5");
        assert_eq!(describe_path(&NoDecoder, &p("2")), "2");
        assert_eq!(
            NoDecoder.decode(&p("2")),
            Err(DecodeError::NotFound(p("2")))
        );
    }
}
