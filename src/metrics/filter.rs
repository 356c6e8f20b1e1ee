use std::collections::HashSet;

use regex::Regex;

use crate::error::{ListenerError, Result};

/// Separator between labels in exact-match mode.
const SEPARATOR: char = ';';

/// Decides which samples are written out. Immutable once built, so worker
/// threads share it without locking.
#[derive(Debug, Clone)]
pub enum SampleFilter {
    /// Label must be matched in full by the pattern.
    Regex(Regex),
    /// Label must be one of the listed names.
    Exact(HashSet<String>),
}

impl SampleFilter {
    /// Build from the `samplersList` parameter. With `use_regex` the list is
    /// a single pattern, otherwise a `;`-separated set of labels.
    pub fn parse(list: &str, use_regex: bool) -> Result<Self> {
        if use_regex {
            Self::regex(list)
        } else {
            Ok(Self::exact(list.split(SEPARATOR)))
        }
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        // Anchor so the pattern has to cover the whole label
        let anchored = format!("^(?:{pattern})$");
        Regex::new(&anchored)
            .map(Self::Regex)
            .map_err(|source| ListenerError::InvalidFilter {
                pattern: pattern.to_owned(),
                source,
            })
    }

    pub fn exact<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exact(labels.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, label: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(label),
            Self::Exact(set) => set.contains(label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_requires_full_match() {
        let f = SampleFilter::parse("GET .*", true).unwrap();
        assert!(f.matches("GET /users"));
        assert!(!f.matches("xGET /users"));

        let f = SampleFilter::parse("login", true).unwrap();
        assert!(f.matches("login"));
        assert!(!f.matches("login page"));
        assert!(!f.matches("user login"));
    }

    #[test]
    fn regex_alternation_is_anchored_as_a_whole() {
        let f = SampleFilter::parse("a|b", true).unwrap();
        assert!(f.matches("a"));
        assert!(f.matches("b"));
        assert!(!f.matches("ab"));
        assert!(!f.matches("xb"));
    }

    #[test]
    fn regex_is_case_sensitive() {
        let f = SampleFilter::parse("Login", true).unwrap();
        assert!(!f.matches("login"));
    }

    #[test]
    fn exact_mode_uses_set_membership() {
        let f = SampleFilter::parse("home;login;checkout", false).unwrap();
        assert!(f.matches("login"));
        assert!(!f.matches("Login"));
        assert!(!f.matches("log"));
        // Metacharacters are literal in exact mode
        let f = SampleFilter::parse(".*", false).unwrap();
        assert!(f.matches(".*"));
        assert!(!f.matches("anything"));
    }

    #[test]
    fn invalid_regex_is_a_configuration_error() {
        let err = SampleFilter::parse("([", true).unwrap_err();
        assert!(matches!(err, ListenerError::InvalidFilter { .. }));
    }

    #[test]
    fn match_all_pattern_accepts_every_label() {
        let f = SampleFilter::parse(".*", true).unwrap();
        assert!(f.matches(""));
        assert!(f.matches("any label at all"));
    }
}
