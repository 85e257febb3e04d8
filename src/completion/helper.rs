/*!
 * Line editor integration
 *
 * Implements the rustyline traits on top of [`SqlCompleter`]: ranked
 * completions on Tab, inline hints, keyword highlighting and bracket
 * validation for multi-line input.
 */

use super::engine::{word_before_cursor, SqlCompleter};
use regex::Regex;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{Highlighter, MatchingBracketHighlighter};
use rustyline::hint::{Hinter, HistoryHinter};
use rustyline::validate::{self, MatchingBracketValidator, Validator};
use rustyline::Context;
use std::borrow::Cow;

/// Most candidates listed in one completion menu
const MAX_LISTED: usize = 30;

/// SQL Helper (integrating all functionality)
pub struct SqlHelper {
    completer: SqlCompleter,
    keyword_re: Option<Regex>,
    highlighter: MatchingBracketHighlighter,
    validator: MatchingBracketValidator,
    hinter: HistoryHinter,
}

impl SqlHelper {
    pub fn new(completer: SqlCompleter) -> Self {
        let alternatives: Vec<String> = completer
            .literals()
            .keywords()
            .iter()
            .map(|k| regex::escape(k))
            .collect();
        let keyword_re = Regex::new(&format!(r"\b({})\b", alternatives.join("|"))).ok();
        Self {
            completer,
            keyword_re,
            highlighter: MatchingBracketHighlighter::new(),
            validator: MatchingBracketValidator::new(),
            hinter: HistoryHinter::new(),
        }
    }

    pub fn completer(&self) -> &SqlCompleter {
        &self.completer
    }

    pub fn completer_mut(&mut self) -> &mut SqlCompleter {
        &mut self.completer
    }
}

impl Completer for SqlHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Result<(usize, Vec<Pair>), ReadlineError> {
        let start = pos - word_before_cursor(&line[..pos]).len();
        let pairs = self
            .completer
            .complete(line, pos)
            .into_iter()
            .take(MAX_LISTED)
            .map(|candidate| Pair {
                display: candidate.format_display(),
                replacement: candidate.text,
            })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for SqlHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, ctx: &Context<'_>) -> Option<String> {
        // First try history hints
        if let Some(history_hint) = self.hinter.hint(line, pos, ctx) {
            return Some(history_hint);
        }
        if pos < line.len() {
            return None;
        }

        // Show the rest of the top candidate when it extends the typed word
        let word = word_before_cursor(line);
        if word.is_empty() {
            return None;
        }
        let top = self.completer.complete(line, pos).into_iter().next()?;
        let prefix = top.text.get(..word.len())?;
        if !prefix.eq_ignore_ascii_case(word) {
            return None;
        }
        let completion = &top.text[word.len()..];
        (!completion.is_empty()).then(|| completion.to_string())
    }
}

impl Highlighter for SqlHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        // Bold upper-case keywords
        match &self.keyword_re {
            Some(re) => re.replace_all(line, "\x1b[1m$1\x1b[0m"),
            None => Cow::Borrowed(line),
        }
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(
        &'s self,
        prompt: &'p str,
        _default: bool,
    ) -> Cow<'b, str> {
        Cow::Borrowed(prompt)
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{}\x1b[0m", hint))
    }

    fn highlight_char(&self, line: &str, pos: usize, forced: bool) -> bool {
        self.highlighter.highlight_char(line, pos, forced)
    }
}

impl Validator for SqlHelper {
    fn validate(
        &self,
        ctx: &mut validate::ValidationContext,
    ) -> Result<validate::ValidationResult, ReadlineError> {
        self.validator.validate(ctx)
    }

    fn validate_while_typing(&self) -> bool {
        self.validator.validate_while_typing()
    }
}

impl rustyline::Helper for SqlHelper {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompleterSettings;
    use rustyline::history::DefaultHistory;

    fn helper() -> SqlHelper {
        let mut completer = SqlCompleter::new(CompleterSettings::default()).unwrap();
        completer
            .metadata_mut()
            .update_tables(vec![("ORDERS".to_string(), vec!["ID".to_string()])]);
        SqlHelper::new(completer)
    }

    #[test]
    fn test_completion_replaces_typed_word() {
        let helper = helper();
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);
        let line = "SELECT * FROM ord";
        let (start, pairs) = helper.complete(line, line.len(), &ctx).unwrap();
        assert_eq!(start, "SELECT * FROM ".len());
        assert_eq!(pairs[0].replacement, "ORDERS");
        assert!(pairs[0].display.contains("table"));
    }

    #[test]
    fn test_keywords_are_highlighted() {
        let helper = helper();
        let out = helper.highlight("SELECT id FROM orders", 0);
        assert!(out.contains("\x1b[1mSELECT\x1b[0m"));
        assert!(out.contains("\x1b[1mFROM\x1b[0m"));
        assert!(!out.contains("\x1b[1morders"));
    }
}
