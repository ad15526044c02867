//! Keyword/value extraction by token adjacency.
//!
//! A token that exactly equals a configured keyword is paired with the token
//! immediately after it. Matching is case-sensitive and nothing is trimmed or
//! normalized, so `"Total CHF"` only matches a single token with that text.

use std::collections::{HashMap, HashSet};

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, trace};

use crate::error::ExtractionError;
use crate::models::config::{DEFAULT_KEYWORDS, ExtractionConfig};

/// Behavior when a keyword is the last token and has no successor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailPolicy {
    /// Leave the keyword out of the result.
    #[default]
    Skip,
    /// Record the keyword with an empty value.
    EmptyValue,
    /// Fail with [`ExtractionError::MissingSuccessor`].
    Error,
}

/// Set of exact-match labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: HashSet<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from configuration; an empty list is rejected.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        if config.keywords.is_empty() {
            return Err(ExtractionError::NoKeywords);
        }
        Ok(Self::new(config.keywords.iter().cloned()))
    }

    pub fn contains(&self, token: &str) -> bool {
        self.keywords.contains(token)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}

/// Keyword to value mapping.
///
/// Keys are unique. Re-inserting a key replaces its value but keeps the
/// position of its first insertion, which is the row order used for tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.index.get(key).map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ExtractionResult {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut result = Self::new();
        for (key, value) in iter {
            result.insert(key, value);
        }
        result
    }
}

impl IntoIterator for ExtractionResult {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Scans token sequences for keywords.
#[derive(Debug, Clone, Default)]
pub struct KeywordExtractor {
    keywords: KeywordSet,
    tail_policy: TailPolicy,
}

impl KeywordExtractor {
    pub fn new(keywords: KeywordSet) -> Self {
        Self {
            keywords,
            tail_policy: TailPolicy::default(),
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        Ok(Self::new(KeywordSet::from_config(config)?).with_tail_policy(config.tail_policy))
    }

    pub fn with_tail_policy(mut self, tail_policy: TailPolicy) -> Self {
        self.tail_policy = tail_policy;
        self
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    /// Pair every keyword occurrence with its successor in a single pass.
    pub fn extract<T: AsRef<str>>(
        &self,
        tokens: &[T],
    ) -> Result<ExtractionResult, ExtractionError> {
        let mut result = ExtractionResult::new();

        for (i, token) in tokens.iter().enumerate() {
            let token = token.as_ref();
            if !self.keywords.contains(token) {
                continue;
            }

            match tokens.get(i + 1) {
                Some(next) => {
                    trace!("{:?} -> {:?} at {}", token, next.as_ref(), i);
                    if let Some(old) = result.insert(token, next.as_ref()) {
                        debug!("{:?} seen again, replacing {:?}", token, old);
                    }
                }
                None => match self.tail_policy {
                    TailPolicy::Skip => debug!("{:?} is the last token, skipping", token),
                    TailPolicy::EmptyValue => {
                        result.insert(token, "");
                    }
                    TailPolicy::Error => {
                        return Err(ExtractionError::MissingSuccessor {
                            keyword: token.to_string(),
                            index: i,
                        });
                    }
                },
            }
        }

        debug!("Extracted {} of {} keywords", result.len(), self.keywords.len());
        Ok(result)
    }
}

/// Extract with the default tail policy, which never fails.
pub fn extract<T: AsRef<str>>(tokens: &[T], keywords: &KeywordSet) -> ExtractionResult {
    let mut result = ExtractionResult::new();
    for pair in tokens.windows(2) {
        let (token, next) = (pair[0].as_ref(), pair[1].as_ref());
        if keywords.contains(token) {
            result.insert(token, next);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn keywords(words: &[&str]) -> KeywordSet {
        KeywordSet::new(words.iter().copied())
    }

    fn pairs(result: &ExtractionResult) -> Vec<(&str, &str)> {
        result.iter().collect()
    }

    #[test]
    fn test_multi_word_label_needs_single_token() {
        let tokens = ["Invoice", "no.", "Invoice no.", "4521", "Total CHF", "120.50"];
        let result = extract(&tokens, &keywords(&["Invoice no.", "Total CHF"]));

        assert_eq!(
            pairs(&result),
            vec![("Invoice no.", "4521"), ("Total CHF", "120.50")]
        );
    }

    #[test]
    fn test_overlapping_labels_match_exactly() {
        let tokens = ["Discount", "5%", "SPECIAL DISCOUNT", "10%"];
        let result = extract(&tokens, &keywords(&["Discount", "SPECIAL DISCOUNT"]));

        assert_eq!(
            pairs(&result),
            vec![("Discount", "5%"), ("SPECIAL DISCOUNT", "10%")]
        );
    }

    #[test]
    fn test_tail_keyword_skipped_by_default() {
        let tokens = ["Total CHF", "120.50", "Discount"];
        let extractor = KeywordExtractor::new(keywords(&["Total CHF", "Discount"]));

        let result = extractor.extract(&tokens).unwrap();
        assert_eq!(pairs(&result), vec![("Total CHF", "120.50")]);
        assert_eq!(extract(&tokens, extractor.keywords()), result);
    }

    #[test]
    fn test_tail_keyword_empty_value() {
        let extractor = KeywordExtractor::new(keywords(&["Discount"]))
            .with_tail_policy(TailPolicy::EmptyValue);
        let result = extractor.extract(&["Discount"]).unwrap();
        assert_eq!(pairs(&result), vec![("Discount", "")]);
    }

    #[test]
    fn test_tail_keyword_error() {
        let extractor =
            KeywordExtractor::new(keywords(&["Discount"])).with_tail_policy(TailPolicy::Error);
        let err = extractor.extract(&["a", "Discount"]).unwrap_err();

        match err {
            ExtractionError::MissingSuccessor { keyword, index } => {
                assert_eq!(keyword, "Discount");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_tokens_yield_empty_result() {
        let tokens: [&str; 0] = [];
        let extractor = KeywordExtractor::default();
        assert!(extractor.extract(&tokens).unwrap().is_empty());
        assert!(extract(&tokens, &KeywordSet::default()).is_empty());
    }

    #[test]
    fn test_last_match_wins_first_position_kept() {
        let tokens = ["Total CHF", "10", "Discount", "2", "Total CHF", "99"];
        let result = extract(&tokens, &keywords(&["Total CHF", "Discount"]));

        assert_eq!(pairs(&result), vec![("Total CHF", "99"), ("Discount", "2")]);
    }

    #[test]
    fn test_no_normalization() {
        let tokens = ["total chf", "1", " Total CHF", "2", "Total CHF ", "3"];
        assert!(extract(&tokens, &keywords(&["Total CHF"])).is_empty());
    }

    #[test]
    fn test_successor_may_be_keyword_or_empty() {
        let tokens = ["Discount", "Total CHF", "7", "Invoice no.", ""];
        let result = extract(&tokens, &KeywordSet::default());

        assert_eq!(result.get("Discount"), Some("Total CHF"));
        assert_eq!(result.get("Total CHF"), Some("7"));
        assert_eq!(result.get("Invoice no."), Some(""));
    }

    #[test]
    fn test_every_value_is_adjacent_to_its_key() {
        let tokens = [
            "", "Invoice no.", "4521", "x", "Payment date:", "2024-01-31", "Discount", "Discount",
            "3%", "Total CHF",
        ];
        let result = extract(&tokens, &KeywordSet::default());

        for (key, value) in result.iter() {
            let adjacent = tokens
                .windows(2)
                .rev()
                .find(|w| w[0] == key)
                .map(|w| w[1]);
            assert_eq!(adjacent, Some(value), "key {key:?}");
        }
        assert_eq!(result.get("Discount"), Some("3%"));
        assert!(!result.contains_key("Total CHF"));
    }

    #[test]
    fn test_works_on_tokens() {
        use crate::ocr::Token;
        let tokens: Vec<Token> = ["Payment date:", "2024-03-01"].map(Token::new).into();
        let result = KeywordExtractor::default().extract(&tokens).unwrap();
        assert_eq!(result.get("Payment date:"), Some("2024-03-01"));
    }

    #[test]
    fn test_empty_keyword_config_rejected() {
        let config = ExtractionConfig {
            keywords: vec![],
            ..ExtractionConfig::default()
        };
        assert!(matches!(
            KeywordExtractor::from_config(&config),
            Err(ExtractionError::NoKeywords)
        ));
    }

    #[test]
    fn test_result_serializes_in_order() {
        let result: ExtractionResult = [("b", "1"), ("a", "2")].into_iter().collect();
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"b":"1","a":"2"}"#);
    }
}
