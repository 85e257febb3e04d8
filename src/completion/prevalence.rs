/*!
 * Usage prevalence
 *
 * Counts how often keywords and names occur in the user's query history.
 * Counts break ties between equally good matches.
 */

use super::lexer::{tokenize, TokenKind};
use super::literals::Literals;
use super::matcher::unescape_name;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct PrevalenceTracker {
    literals: Arc<Literals>,
    keyword_patterns: Vec<(String, Regex)>,
    keyword_counts: HashMap<String, u64>,
    name_counts: HashMap<String, u64>,
}

impl PrevalenceTracker {
    pub fn new(literals: Arc<Literals>) -> Self {
        let keyword_patterns = literals
            .keywords()
            .iter()
            .filter_map(|kw| {
                let pattern = format!(r"(?i)\b{}\b", regex::escape(kw).replace(' ', r"\s+"));
                Regex::new(&pattern).ok().map(|re| (kw.clone(), re))
            })
            .collect();
        Self {
            literals,
            keyword_patterns,
            keyword_counts: HashMap::new(),
            name_counts: HashMap::new(),
        }
    }

    /// Seed keyword counts from the `max_recent` most recent history
    /// entries; `history` is oldest first
    pub fn init_from_history<S: AsRef<str>>(&mut self, history: &[S], max_recent: usize) {
        let skip = history.len().saturating_sub(max_recent);
        for entry in &history[skip..] {
            self.update_keywords(entry.as_ref());
        }
        debug!(
            entries = history.len() - skip,
            keywords = self.keyword_counts.len(),
            "seeded keyword prevalence"
        );
    }

    /// Record an accepted statement
    pub fn update(&mut self, text: &str) {
        self.update_keywords(text);
        self.update_names(text);
    }

    pub fn update_keywords(&mut self, text: &str) {
        for (keyword, re) in &self.keyword_patterns {
            let hits = re.find_iter(text).count() as u64;
            if hits > 0 {
                *self.keyword_counts.entry(keyword.clone()).or_default() += hits;
            }
        }
    }

    pub fn update_names(&mut self, text: &str) {
        let Ok(tokens) = tokenize(text, &self.literals) else {
            return;
        };
        for token in tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::Name | TokenKind::QuotedName))
        {
            *self.name_counts.entry(name_key(&token.value)).or_default() += 1;
        }
    }

    pub fn keyword_count(&self, keyword: &str) -> u64 {
        self.keyword_counts
            .get(&keyword.to_uppercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn name_count(&self, name: &str) -> u64 {
        self.name_counts.get(&name_key(name)).copied().unwrap_or(0)
    }
}

fn name_key(name: &str) -> String {
    unescape_name(name).to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> PrevalenceTracker {
        PrevalenceTracker::new(Arc::new(Literals::builtin().unwrap()))
    }

    #[test]
    fn test_keyword_counts_are_word_bounded() {
        let mut t = tracker();
        t.update_keywords("select * from selections where x in (select 1)");
        assert_eq!(t.keyword_count("SELECT"), 2);
        assert_eq!(t.keyword_count("where"), 1);
        assert_eq!(t.keyword_count("JOIN"), 0);
    }

    #[test]
    fn test_names_are_counted_case_insensitively() {
        let mut t = tracker();
        t.update("SELECT id FROM orders; SELECT \"ORDERS\".id FROM ORDERS");
        assert_eq!(t.name_count("orders"), 3);
        assert_eq!(t.name_count("ID"), 2);
        assert_eq!(t.keyword_count("from"), 2);
    }

    #[test]
    fn test_history_seed_only_counts_keywords() {
        let mut t = tracker();
        let history = vec!["SELECT a FROM t", "DELETE FROM t", "SELECT b FROM u"];
        t.init_from_history(&history, 2);
        assert_eq!(t.keyword_count("SELECT"), 1);
        assert_eq!(t.keyword_count("DELETE"), 1);
        assert_eq!(t.name_count("t"), 0);
    }
}
