/*!
 * Tokenizer adapter
 *
 * Wraps the `sqlparser` tokenizer and turns its output into a flat stream of
 * source-anchored tokens. Keyword classification follows the literals table,
 * and multi-word join keywords (`LEFT OUTER JOIN`, ...) and `CREATE OR REPLACE`
 * are merged into single tokens.
 */

use super::literals::Literals;
use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, Tokenizer, TokenizerError, Whitespace};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Name,
    QuotedName,
    Literal,
    Punctuation,
    Comparison,
    Operator,
    Whitespace,
    Comment,
}

/// One token together with its position in the tokenized text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlToken {
    pub kind: TokenKind,
    /// Exact source text of the token
    pub value: String,
    /// Byte offset of the token in the tokenized text
    pub start: usize,
}

impl SqlToken {
    pub fn end(&self) -> usize {
        self.start + self.value.len()
    }

    /// Whitespace and comments carry no syntax
    pub fn is_trivia(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == TokenKind::Keyword
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.value == punct
    }

    /// Upper-cased value with interior whitespace collapsed, for keywords
    /// such as `LEFT  OUTER\nJOIN`
    pub fn normalized(&self) -> String {
        match self.kind {
            TokenKind::Keyword => self
                .value
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase(),
            _ => self.value.clone(),
        }
    }

    pub fn lower(&self) -> String {
        match self.kind {
            TokenKind::Keyword => self.normalized().to_lowercase(),
            _ => self.value.to_lowercase(),
        }
    }
}

/// Tokenize `sql` into source-anchored tokens
pub fn tokenize(sql: &str, literals: &Literals) -> Result<Vec<SqlToken>, TokenizerError> {
    let dialect = GenericDialect {};
    let located = Tokenizer::new(&dialect, sql).tokenize_with_location()?;

    let line_starts = line_starts(sql);
    let starts: Vec<usize> = located
        .iter()
        .map(|t| offset_of(sql, &line_starts, t.location.line, t.location.column))
        .collect();

    let mut tokens: Vec<SqlToken> = Vec::with_capacity(located.len());
    for (i, located_token) in located.iter().enumerate() {
        let start = starts[i];
        let end = starts.get(i + 1).copied().unwrap_or(sql.len());
        let value = match sql.get(start..end) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => continue,
        };
        let kind = classify(&located_token.token, literals);

        // Coalesce runs of whitespace into a single token
        if kind == TokenKind::Whitespace {
            if let Some(prev) = tokens.last_mut() {
                if prev.kind == TokenKind::Whitespace && prev.end() == start {
                    prev.value.push_str(&value);
                    continue;
                }
            }
        }
        tokens.push(SqlToken { kind, value, start });
    }

    Ok(merge_keyword_phrases(sql, tokens))
}

fn classify(token: &Token, literals: &Literals) -> TokenKind {
    match token {
        Token::Word(word) if word.quote_style.is_some() => TokenKind::QuotedName,
        Token::Word(word) if literals.is_keyword(&word.value) => TokenKind::Keyword,
        Token::Word(_) => TokenKind::Name,
        Token::Whitespace(Whitespace::SingleLineComment { .. })
        | Token::Whitespace(Whitespace::MultiLineComment(_)) => TokenKind::Comment,
        Token::Whitespace(_) => TokenKind::Whitespace,
        Token::Eq
        | Token::DoubleEq
        | Token::Neq
        | Token::Lt
        | Token::Gt
        | Token::LtEq
        | Token::GtEq
        | Token::Spaceship => TokenKind::Comparison,
        Token::Comma
        | Token::Period
        | Token::LParen
        | Token::RParen
        | Token::SemiColon
        | Token::LBracket
        | Token::RBracket
        | Token::Colon
        | Token::DoubleColon => TokenKind::Punctuation,
        Token::Number(..)
        | Token::Char(_)
        | Token::SingleQuotedString(_)
        | Token::DoubleQuotedString(_)
        | Token::DollarQuotedString(_)
        | Token::NationalStringLiteral(_)
        | Token::EscapedStringLiteral(_)
        | Token::HexStringLiteral(_)
        | Token::Placeholder(_) => TokenKind::Literal,
        _ => TokenKind::Operator,
    }
}

fn line_starts(sql: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(sql.match_indices('\n').map(|(i, _)| i + 1));
    starts
}

/// Convert a 1-based (line, column) tokenizer location into a byte offset
fn offset_of(sql: &str, line_starts: &[usize], line: u64, column: u64) -> usize {
    let Some(&base) = line_starts.get((line.max(1) - 1) as usize) else {
        return sql.len();
    };
    sql[base..]
        .char_indices()
        .nth((column.max(1) - 1) as usize)
        .map(|(i, _)| base + i)
        .unwrap_or(sql.len())
}

const JOIN_MODIFIERS: &[&str] = &["NATURAL", "CROSS", "INNER", "LEFT", "RIGHT", "FULL"];

/// Merge keyword phrases that act as a single keyword
fn merge_keyword_phrases(sql: &str, tokens: Vec<SqlToken>) -> Vec<SqlToken> {
    let mut merged = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if let Some(last) = phrase_end(&tokens, i) {
            let start = tokens[i].start;
            let end = tokens[last].end();
            merged.push(SqlToken {
                kind: TokenKind::Keyword,
                value: sql[start..end].to_string(),
                start,
            });
            i = last + 1;
        } else {
            merged.push(tokens[i].clone());
            i += 1;
        }
    }
    merged
}

/// Index of the last token of a keyword phrase starting at `i`, if one does
fn phrase_end(tokens: &[SqlToken], i: usize) -> Option<usize> {
    let first = &tokens[i];
    if !first.is_keyword() {
        return None;
    }
    let words: Vec<(usize, String)> = tokens[i..]
        .iter()
        .enumerate()
        .filter(|(_, t)| !t.is_trivia())
        .take(3)
        .map(|(offset, t)| {
            let word = if t.is_keyword() {
                t.value.to_uppercase()
            } else {
                String::new()
            };
            (i + offset, word)
        })
        .collect();
    let word = |n: usize| words.get(n).map(|(_, w)| w.as_str()).unwrap_or("");
    let index = |n: usize| words.get(n).map(|(idx, _)| *idx);

    match word(0) {
        w if JOIN_MODIFIERS.contains(&w) => match (word(1), word(2)) {
            ("JOIN", _) => index(1),
            ("OUTER", "JOIN") => index(2),
            _ => None,
        },
        "OUTER" if word(1) == "JOIN" => index(1),
        "CREATE" if word(1) == "OR" && word(2) == "REPLACE" => index(2),
        _ => None,
    }
}

/// Which characters count as part of the trailing word
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordScope {
    /// Alphanumerics and underscores only
    AlphanumUnderscore,
    /// Everything except whitespace, parentheses, colon and comma
    ManyPunctuations,
    /// Like `ManyPunctuations`, but also stops at a period
    MostPunctuations,
    /// Everything except whitespace
    AllPunctuations,
}

impl WordScope {
    fn accepts(self, c: char) -> bool {
        match self {
            WordScope::AlphanumUnderscore => c.is_alphanumeric() || c == '_',
            WordScope::ManyPunctuations => !c.is_whitespace() && !"():,".contains(c),
            WordScope::MostPunctuations => !c.is_whitespace() && !".():,".contains(c),
            WordScope::AllPunctuations => !c.is_whitespace(),
        }
    }
}

/// The trailing word of `text`, or an empty string when `text` ends in
/// whitespace or a character outside `scope`
pub fn last_word(text: &str, scope: WordScope) -> &str {
    let start = text
        .char_indices()
        .rev()
        .take_while(|&(_, c)| scope.accepts(c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    &text[start..]
}
