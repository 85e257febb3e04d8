/*!
 * Statement context
 *
 * Everything the analyzer knows about the statement under the cursor: the
 * narrowed full text and text before the cursor, the partially typed word
 * and the grouped statement. Multi-statement buffers, CTE prefixes and
 * `$$`-quoted function bodies are narrowed away here.
 */

use super::cte::{isolate_query_ctes, LocalTable};
use super::lexer::{last_word, tokenize, SqlToken, WordScope};
use super::literals::Literals;
use super::parse::{split_statements, Node, Statement};
use super::tables::{extract_tables, unquote, TableReference};
use regex::Regex;
use sqlparser::tokenizer::TokenizerError;
use std::sync::OnceLock;

/// Which part of the statement table references are collected from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableScope {
    /// The whole statement, including text after the cursor
    Full,
    /// Only the text before the cursor
    Before,
    /// Only the insert target
    Insert,
}

/// Keywords that do not end a search for the previous keyword
const LOGICAL_OPERATORS: &[&str] = &["AND", "OR", "NOT", "BETWEEN"];

/// A dotted identifier that may still be incomplete, such as `a.` or `"x`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialIdentifier {
    parts: Vec<String>,
}

impl PartialIdentifier {
    /// Parse a word as a possibly incomplete dotted identifier
    pub fn parse(word: &str) -> Option<Self> {
        let mut parts = vec![String::new()];
        let mut in_quotes = false;
        for c in word.chars() {
            match c {
                '"' => {
                    in_quotes = !in_quotes;
                    parts.last_mut()?.push(c);
                }
                '.' if !in_quotes => parts.push(String::new()),
                c if in_quotes || c.is_alphanumeric() || "_$@#".contains(c) => {
                    parts.last_mut()?.push(c)
                }
                _ => return None,
            }
        }
        let head = parts.first()?;
        if head.is_empty() || head.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        Some(Self { parts })
    }

    /// Qualifier before the last dot, e.g. `a` for `a.b`
    pub fn parent_name(&self) -> Option<&str> {
        let n = self.parts.len();
        (n >= 2).then(|| unquote(&self.parts[n - 2]))
    }
}

/// The statement under the cursor
#[derive(Debug)]
pub struct SqlStatement<'a> {
    literals: &'a Literals,
    pub full_text: String,
    pub text_before_cursor: String,
    pub word_before_cursor: String,
    pub identifier: Option<PartialIdentifier>,
    pub local_tables: Vec<LocalTable>,
    pub parsed: Option<Statement>,
    pub last_token: Option<Node>,
}

impl<'a> SqlStatement<'a> {
    pub fn new(
        full_text: &str,
        text_before_cursor: &str,
        literals: &'a Literals,
    ) -> Result<Self, TokenizerError> {
        let word_before_cursor = last_word(text_before_cursor, WordScope::ManyPunctuations).to_string();

        let (mut full_text, mut text_before_cursor, local_tables) =
            isolate_query_ctes(full_text, text_before_cursor, literals);
        if let Some((body_full, body_before)) = isolate_function_body(&full_text, &text_before_cursor) {
            full_text = body_full;
            text_before_cursor = body_before;
        }

        let mut identifier = None;
        if !word_before_cursor.is_empty() {
            let keep = text_before_cursor
                .len()
                .saturating_sub(word_before_cursor.len());
            text_before_cursor.truncate(keep);
            identifier = PartialIdentifier::parse(&word_before_cursor);
        }

        let tokens = tokenize(&text_before_cursor, literals)?;
        let statements = split_statements(tokens);

        let mut current = statements.last().cloned().unwrap_or_default();
        if statements.len() > 1 {
            let current_position = text_before_cursor.len();
            let mut stmt_start = 0;
            for mut statement in statements {
                let len: usize = statement.iter().map(|t| t.value.len()).sum();
                if stmt_start + len >= current_position {
                    statement.iter_mut().for_each(|t| t.start -= stmt_start);
                    full_text = full_text.get(stmt_start..).unwrap_or_default().to_string();
                    text_before_cursor = text_before_cursor[stmt_start..].to_string();
                    current = statement;
                    break;
                }
                stmt_start += len;
            }
        }

        let parsed = (!current.is_empty()).then(|| Statement::from_tokens(current));
        let last_token = parsed.as_ref().and_then(Statement::last_token).cloned();

        Ok(Self {
            literals,
            full_text,
            text_before_cursor,
            word_before_cursor,
            identifier,
            local_tables,
            parsed,
            last_token,
        })
    }

    /// INSERT and UPSERT statements
    pub fn is_insert(&self) -> bool {
        matches!(
            self.parsed.as_ref().and_then(Statement::first_keyword).as_deref(),
            Some("insert") | Some("upsert")
        )
    }

    /// Table references of the statement within `scope`. The insert target
    /// is excluded from every scope but [`TableScope::Insert`].
    pub fn get_tables(&self, scope: TableScope) -> Vec<TableReference> {
        let text = match scope {
            TableScope::Full => &self.full_text,
            TableScope::Before | TableScope::Insert => &self.text_before_cursor,
        };
        let mut tables = extract_tables(text, self.literals);
        if scope == TableScope::Insert {
            tables.truncate(1);
        } else if self.is_insert() && !tables.is_empty() {
            tables.remove(0);
        }
        tables
    }

    /// Qualifier typed before the cursor, e.g. `c` in `... ON c.`
    pub fn parent_name(&self) -> Option<&str> {
        self.identifier.as_ref().and_then(PartialIdentifier::parent_name)
    }

    /// The significant token immediately before `token` in the statement
    pub fn get_previous_token(&self, token: &SqlToken) -> Option<SqlToken> {
        let flat = self.parsed.as_ref()?.flatten();
        let idx = flat.iter().position(|t| t.start == token.start)?;
        flat[..idx].iter().rev().find(|t| !t.is_trivia()).map(|t| (*t).clone())
    }

    /// Move the end of `text_before_cursor` back to the previous keyword
    /// (skipping the last `n_skip` tokens) and return that keyword
    pub fn reduce_to_prev_keyword(&mut self, n_skip: usize) -> Option<SqlToken> {
        let (token, text) = find_prev_keyword(&self.text_before_cursor, n_skip, self.literals);
        self.text_before_cursor = text;
        token
    }
}

/// Find the last keyword (or open parenthesis) in `sql`, ignoring the final
/// `n_skip` tokens and logical operators. Returns it together with `sql`
/// truncated just after it.
pub fn find_prev_keyword(sql: &str, n_skip: usize, literals: &Literals) -> (Option<SqlToken>, String) {
    if sql.trim().is_empty() {
        return (None, String::new());
    }
    let Ok(tokens) = tokenize(sql, literals) else {
        return (None, String::new());
    };
    let Some(mut flat) = split_statements(tokens).into_iter().next() else {
        return (None, String::new());
    };
    flat.truncate(flat.len().saturating_sub(n_skip));

    let found = flat.into_iter().rev().find(|t| {
        t.is_punct("(")
            || (t.is_keyword() && !LOGICAL_OPERATORS.contains(&t.normalized().as_str()))
    });
    match found {
        Some(token) => {
            let text = sql[..token.end()].to_string();
            (Some(token), text)
        }
        None => (None, String::new()),
    }
}

fn create_function_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)\bCREATE\s+(?:OR\s+REPLACE\s+)?FUNCTION\b[^;]*$").ok())
        .as_ref()
}

/// When the cursor is inside the `$tag$ ... $tag$` body of a CREATE
/// FUNCTION statement, narrow both texts to the body
fn isolate_function_body(full_text: &str, text_before_cursor: &str) -> Option<(String, String)> {
    let cursor = text_before_cursor.len();
    let mut search_from = 0;

    while let Some((open_start, tag)) = find_dollar_tag(full_text, search_from) {
        let body_start = open_start + tag.len();
        let close = full_text[body_start..].find(tag).map(|i| body_start + i);
        let body_end = close.unwrap_or(full_text.len());

        if body_start <= cursor && cursor <= body_end {
            let prefix = &full_text[..open_start];
            if !create_function_re()?.is_match(prefix) {
                return None;
            }
            let before = text_before_cursor.get(body_start..)?;
            return Some((full_text[body_start..body_end].to_string(), before.to_string()));
        }
        match close {
            Some(c) => search_from = c + tag.len(),
            None => return None,
        }
    }
    None
}

/// Locate the next `$tag$` (or `$$`) opener at or after `from`
fn find_dollar_tag(text: &str, from: usize) -> Option<(usize, &str)> {
    let mut offset = from;
    while let Some(rel) = text.get(offset..)?.find('$') {
        let start = offset + rel;
        let rest = &text[start + 1..];
        let tag_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if rest[tag_len..].starts_with('$') {
            let preceded_by_word = text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
            if !preceded_by_word {
                return Some((start, &text[start..start + tag_len + 2]));
            }
        }
        offset = start + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn literals() -> Literals {
        Literals::builtin().unwrap()
    }

    #[test]
    fn test_partial_identifier() {
        let id = PartialIdentifier::parse("a.").unwrap();
        assert_eq!(id.parent_name(), Some("a"));
        let id = PartialIdentifier::parse("\"My T\".col").unwrap();
        assert_eq!(id.parent_name(), Some("My T"));
        assert_eq!(PartialIdentifier::parse("foo").unwrap().parent_name(), None);
        assert!(PartialIdentifier::parse("x=").is_none());
        assert!(PartialIdentifier::parse("1.5").is_none());
    }

    #[test]
    fn test_word_is_stripped() {
        let lits = literals();
        let stmt = SqlStatement::new("SELECT * FROM ord", "SELECT * FROM ord", &lits).unwrap();
        assert_eq!(stmt.word_before_cursor, "ord");
        assert_eq!(stmt.text_before_cursor, "SELECT * FROM ");
        assert_eq!(stmt.last_token.unwrap().lower(), "from");
    }

    #[test]
    fn test_current_statement_is_isolated() {
        let lits = literals();
        let sql = "SELECT * FROM a; SELECT * FROM b WHERE ";
        let stmt = SqlStatement::new(sql, sql, &lits).unwrap();
        assert_eq!(stmt.text_before_cursor, "SELECT * FROM b WHERE ");
        assert_eq!(stmt.full_text, "SELECT * FROM b WHERE ");
        assert_eq!(stmt.get_tables(TableScope::Full), vec![TableReference::new("b")]);
    }

    #[test]
    fn test_cursor_in_first_statement() {
        let lits = literals();
        let full = "SELECT * FROM a WHERE ; SELECT * FROM b";
        let before = "SELECT * FROM a WHERE ";
        let stmt = SqlStatement::new(full, before, &lits).unwrap();
        assert_eq!(stmt.get_tables(TableScope::Before), vec![TableReference::new("a")]);
    }

    #[test]
    fn test_insert_scopes() {
        let lits = literals();
        let sql = "INSERT INTO orders (id) SELECT id FROM customers WHERE ";
        let stmt = SqlStatement::new(sql, sql, &lits).unwrap();
        assert!(stmt.is_insert());
        assert_eq!(stmt.get_tables(TableScope::Insert), vec![TableReference::new("orders")]);
        assert_eq!(stmt.get_tables(TableScope::Full), vec![TableReference::new("customers")]);
    }

    #[test]
    fn test_find_prev_keyword() {
        let lits = literals();
        let (token, text) = find_prev_keyword("SELECT * FROM a WHERE x = 1 AND ", 0, &lits);
        assert_eq!(token.unwrap().lower(), "where");
        assert_eq!(text, "SELECT * FROM a WHERE");

        let (token, text) = find_prev_keyword("SELECT count(", 0, &lits);
        assert_eq!(token.unwrap().value, "(");
        assert_eq!(text, "SELECT count(");

        let (token, _) = find_prev_keyword("SELECT * FROM ", 1, &lits);
        assert_eq!(token.unwrap().lower(), "from");
        assert_eq!(find_prev_keyword("   ", 0, &lits).0, None);
    }

    #[test]
    fn test_function_body_is_isolated() {
        let full = "CREATE FUNCTION f() RETURNS int AS $body$ SELECT * FROM t WHERE  $body$";
        let cursor = full.find("WHERE ").unwrap() + "WHERE ".len();
        let (body, before) = isolate_function_body(full, &full[..cursor]).unwrap();
        assert_eq!(body, " SELECT * FROM t WHERE  ");
        assert_eq!(before, " SELECT * FROM t WHERE ");

        let not_function = "SELECT $$ abc $$";
        assert!(isolate_function_body(not_function, &not_function[..10]).is_none());
    }
}
