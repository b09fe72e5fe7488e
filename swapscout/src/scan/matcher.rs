use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::errors::ScanError;

/// Compiled case-insensitive patterns, keyed by (pattern, is_regex)
static PATTERN_CACHE: Lazy<DashMap<(String, bool), Arc<Regex>>> = Lazy::new(DashMap::new);

/// Case-insensitive matcher used by the scan phase and for occurrence counting.
///
/// Literal patterns are escaped before compilation, so `a.b` only matches the
/// three characters `a.b`.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Arc<Regex>,
}

impl PatternMatcher {
    /// Creates a matcher for a regex or literal pattern
    pub fn new(pattern: &str, is_regex: bool) -> Result<Self, ScanError> {
        if pattern.is_empty() {
            return Err(ScanError::invalid_pattern("Pattern cannot be empty"));
        }

        let key = (pattern.to_string(), is_regex);
        if let Some(entry) = PATTERN_CACHE.get(&key) {
            return Ok(Self {
                regex: entry.clone(),
            });
        }

        let source = if is_regex {
            pattern.to_string()
        } else {
            regex::escape(pattern)
        };
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| ScanError::invalid_pattern(e.to_string()))?;
        let regex = Arc::new(regex);

        PATTERN_CACHE.insert(key, regex.clone());
        Ok(Self { regex })
    }

    /// Creates a matcher for the escaped form of a literal string
    pub fn literal(pattern: &str) -> Result<Self, ScanError> {
        Self::new(pattern, false)
    }

    /// Returns true if the pattern occurs anywhere in `text`
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Counts non-overlapping occurrences in `text`
    pub fn count(&self, text: &str) -> usize {
        self.regex.find_iter(text).count()
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}
