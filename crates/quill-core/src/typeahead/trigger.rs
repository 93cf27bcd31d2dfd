use regex::Regex;

use crate::config::TypeaheadConfig;

/// A trigger found at the end of the text before the caret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerMatch {
    /// Character offset where the trigger starts
    pub lead_offset: usize,
    /// Trigger plus the typed query, e.g. `[[Proj`
    pub matching_string: String,
    /// Typed text after the trigger, e.g. `Proj`
    pub query: String,
}

impl TriggerMatch {
    /// Length of the matched span in characters
    pub fn len(&self) -> usize {
        self.matching_string.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.matching_string.is_empty()
    }
}

/// Detects a link-opening token directly before the caret.
///
/// The trigger must start the text or follow whitespace or `(`, and may be
/// followed by up to `max_query_length` characters other than brackets.
#[derive(Debug, Clone)]
pub struct TriggerMatcher {
    pattern: Regex,
}

impl TriggerMatcher {
    pub fn new(trigger: &str, max_query_length: usize) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"(?:^|\s|\()({}([^\[\]]{{0,{}}}))$",
            regex::escape(trigger),
            max_query_length
        ))?;
        Ok(Self { pattern })
    }

    pub fn from_config(config: &TypeaheadConfig) -> Result<Self, regex::Error> {
        Self::new(&config.trigger, config.max_query_length)
    }

    pub fn find(&self, text_before_caret: &str) -> Option<TriggerMatch> {
        let captures = self.pattern.captures(text_before_caret)?;
        let span = captures.get(1)?;
        let query = captures.get(2)?;
        Some(TriggerMatch {
            lead_offset: text_before_caret[..span.start()].chars().count(),
            matching_string: span.as_str().to_string(),
            query: query.as_str().to_string(),
        })
    }
}
