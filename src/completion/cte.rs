/*!
 * Common table expressions
 *
 * Splits a leading `WITH name [(cols)] AS (...) [, ...]` prefix off a
 * statement. When the cursor sits inside one CTE body, only that body is
 * analyzed; otherwise the query after the last CTE is, and the CTEs become
 * local tables with their projected column names.
 */

use super::lexer::{tokenize, SqlToken, TokenKind};
use super::literals::Literals;
use super::tables::unquote;

/// A relation defined by the statement itself
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalTable {
    pub name: String,
    pub columns: Vec<String>,
}

/// One CTE with the byte span of its parenthesized body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableExpression {
    pub name: String,
    pub columns: Vec<String>,
    /// Offset of the opening parenthesis
    pub start: usize,
    /// Offset just past the closing parenthesis, or the end of the text when
    /// the body is still open
    pub stop: usize,
    pub closed: bool,
}

impl TableExpression {
    fn contains(&self, pos: usize) -> bool {
        self.start < pos && (pos < self.stop || (!self.closed && pos <= self.stop))
    }
}

/// Narrow `full_text` / `text_before_cursor` to the part of a CTE query
/// being edited.
///
/// Returns the narrowed texts and the local tables visible from there.
pub fn isolate_query_ctes(
    full_text: &str,
    text_before_cursor: &str,
    literals: &Literals,
) -> (String, String, Vec<LocalTable>) {
    let unchanged = || (full_text.to_string(), text_before_cursor.to_string(), Vec::new());
    if full_text.is_empty() {
        return unchanged();
    }

    let ctes = extract_ctes(full_text, literals);
    let Some(last) = ctes.last() else {
        return unchanged();
    };

    let current_position = text_before_cursor.len();
    let mut local_tables = Vec::new();
    for cte in &ctes {
        if cte.contains(current_position) {
            let body_end = cte.stop.min(full_text.len());
            let full = full_text.get(cte.start..body_end).unwrap_or_default();
            let before = text_before_cursor.get(cte.start..).unwrap_or_default();
            return (full.to_string(), before.to_string(), local_tables);
        }
        local_tables.push(LocalTable {
            name: cte.name.clone(),
            columns: cte.columns.clone(),
        });
    }

    if current_position < last.stop {
        // Cursor in a CTE header, not a body
        return unchanged();
    }
    let full = full_text.get(last.stop..).unwrap_or_default();
    let before = text_before_cursor.get(last.stop..).unwrap_or_default();
    (full.to_string(), before.to_string(), local_tables)
}

/// Parse the CTEs at the start of `sql`. Unparseable input has none.
pub fn extract_ctes(sql: &str, literals: &Literals) -> Vec<TableExpression> {
    let Ok(tokens) = tokenize(sql, literals) else {
        return Vec::new();
    };
    let tokens: Vec<SqlToken> = tokens.into_iter().filter(|t| !t.is_trivia()).collect();
    let mut cursor = Cursor { tokens: &tokens, idx: 0 };

    if !cursor.keyword("WITH") {
        return Vec::new();
    }
    cursor.keyword("RECURSIVE");

    let mut ctes = Vec::new();
    loop {
        let Some(name) = cursor.name() else { break };
        let explicit_columns = if cursor.peek_punct("(") {
            let (start, end, _) = cursor.balanced();
            Some(column_list(&tokens[start + 1..end]))
        } else {
            None
        };
        if !cursor.keyword("AS") || !cursor.peek_punct("(") {
            break;
        }

        let (open, close, closed) = cursor.balanced();
        let body = &tokens[open + 1..close];
        let stop = if closed {
            tokens[close].end()
        } else {
            sql.len()
        };
        ctes.push(TableExpression {
            name,
            columns: explicit_columns.unwrap_or_else(|| projected_columns(body)),
            start: tokens[open].start,
            stop,
            closed,
        });
        if !closed || !cursor.punct(",") {
            break;
        }
    }
    ctes
}

struct Cursor<'a> {
    tokens: &'a [SqlToken],
    idx: usize,
}

impl Cursor<'_> {
    fn keyword(&mut self, kw: &str) -> bool {
        let hit = self
            .tokens
            .get(self.idx)
            .is_some_and(|t| t.value.eq_ignore_ascii_case(kw));
        if hit {
            self.idx += 1;
        }
        hit
    }

    fn punct(&mut self, p: &str) -> bool {
        let hit = self.peek_punct(p);
        if hit {
            self.idx += 1;
        }
        hit
    }

    fn peek_punct(&self, p: &str) -> bool {
        self.tokens.get(self.idx).is_some_and(|t| t.is_punct(p))
    }

    fn name(&mut self) -> Option<String> {
        let t = self.tokens.get(self.idx)?;
        if !matches!(
            t.kind,
            TokenKind::Name | TokenKind::QuotedName | TokenKind::Keyword
        ) {
            return None;
        }
        self.idx += 1;
        Some(unquote(&t.value).to_string())
    }

    /// Consume a parenthesized group starting at the current `(`. Returns
    /// the indices of the opening and closing tokens and whether the group
    /// was closed; an open group runs to the end.
    fn balanced(&mut self) -> (usize, usize, bool) {
        let open = self.idx;
        let mut depth = 0usize;
        for (i, t) in self.tokens.iter().enumerate().skip(open) {
            if t.is_punct("(") {
                depth += 1;
            } else if t.is_punct(")") {
                depth -= 1;
                if depth == 0 {
                    self.idx = i + 1;
                    return (open, i, true);
                }
            }
        }
        self.idx = self.tokens.len();
        (open, self.tokens.len(), false)
    }
}

/// Names in an explicit `(a, b, c)` column list
fn column_list(tokens: &[SqlToken]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::Name | TokenKind::QuotedName | TokenKind::Keyword))
        .map(|t| unquote(&t.value).to_string())
        .collect()
}

/// Output column names of the SELECT list of a CTE body
fn projected_columns(body: &[SqlToken]) -> Vec<String> {
    let mut iter = body.iter();
    if !iter
        .next()
        .is_some_and(|t| t.value.eq_ignore_ascii_case("SELECT"))
    {
        return Vec::new();
    }

    let mut items: Vec<Vec<&SqlToken>> = vec![Vec::new()];
    let mut depth = 0usize;
    for t in iter {
        if depth == 0 && t.is_keyword() && t.value.eq_ignore_ascii_case("FROM") {
            break;
        }
        if t.is_punct("(") {
            depth += 1;
        } else if t.is_punct(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && t.is_punct(",") {
            items.push(Vec::new());
            continue;
        }
        if let Some(item) = items.last_mut() {
            item.push(t);
        }
    }

    items.iter().filter_map(|item| item_name(item)).collect()
}

fn item_name(item: &[&SqlToken]) -> Option<String> {
    let item = match item.first() {
        Some(t) if t.is_keyword() && ["DISTINCT", "ALL"].contains(&t.normalized().as_str()) => &item[1..],
        _ => item,
    };
    let last = item.last()?;
    if !matches!(last.kind, TokenKind::Name | TokenKind::QuotedName) {
        return None;
    }
    // `expr AS name`, `expr name` and `t.col` all end with the output name
    Some(unquote(&last.value).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn literals() -> Literals {
        Literals::builtin().unwrap()
    }

    #[test]
    fn test_extract_ctes_with_columns() {
        let sql = "WITH a AS (SELECT x, t.y, count(*) AS n, z zz FROM t), b(p, q) AS (SELECT 1, 2) SELECT * FROM a";
        let ctes = extract_ctes(sql, &literals());
        assert_eq!(ctes.len(), 2);
        assert_eq!(ctes[0].name, "a");
        assert_eq!(ctes[0].columns, vec!["x", "y", "n", "zz"]);
        assert_eq!(&sql[ctes[0].start..ctes[0].start + 1], "(");
        assert_eq!(&sql[ctes[0].stop - 1..ctes[0].stop], ")");
        assert_eq!(ctes[1].name, "b");
        assert_eq!(ctes[1].columns, vec!["p", "q"]);
    }

    #[test]
    fn test_no_ctes() {
        assert!(extract_ctes("SELECT * FROM a", &literals()).is_empty());
        let (full, before, locals) = isolate_query_ctes("SELECT * FROM a", "SELECT ", &literals());
        assert_eq!(full, "SELECT * FROM a");
        assert_eq!(before, "SELECT ");
        assert!(locals.is_empty());
    }

    #[test]
    fn test_cursor_after_ctes() {
        let sql = "WITH a AS (SELECT x FROM t) SELECT * FROM ";
        let (full, before, locals) = isolate_query_ctes(sql, sql, &literals());
        assert_eq!(full, " SELECT * FROM ");
        assert_eq!(before, " SELECT * FROM ");
        assert_eq!(
            locals,
            vec![LocalTable {
                name: "a".into(),
                columns: vec!["x".into()]
            }]
        );
    }

    #[test]
    fn test_cursor_inside_cte_body() {
        let sql = "WITH a AS (SELECT x FROM t), b AS (SELECT  FROM a) SELECT 1";
        let cursor = sql.find("SELECT  ").unwrap() + "SELECT ".len();
        let (full, before, locals) = isolate_query_ctes(sql, &sql[..cursor], &literals());
        assert_eq!(full, "(SELECT  FROM a)");
        assert_eq!(before, "(SELECT ");
        assert_eq!(locals.len(), 1);
        assert_eq!(locals[0].name, "a");
    }

    #[test]
    fn test_unclosed_cte_body() {
        let sql = "WITH a AS (SELECT x FROM ";
        let (full, before, locals) = isolate_query_ctes(sql, sql, &literals());
        assert_eq!(full, "(SELECT x FROM ");
        assert_eq!(before, "(SELECT x FROM ");
        assert!(locals.is_empty());
    }
}
