/*!
 * Table reference extraction
 *
 * Finds the relations a statement draws from: everything following FROM,
 * JOIN, INTO, UPDATE, COPY and TABLE at any nesting level, with aliases.
 */

use super::lexer::{tokenize, TokenKind};
use super::literals::Literals;
use super::parse::{split_statements, Node, Statement};
use tracing::trace;

/// A relation referenced by a statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableReference {
    /// Qualifier written before the name, e.g. `S` in `S.ORDERS`
    pub schema: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl TableReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn schema_qualified(&self) -> bool {
        self.schema.is_some()
    }

    /// The name other parts of the statement use for this relation
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Whether `id` (an alias or name written by the user) refers to this
    /// relation
    pub fn identifies(&self, id: &str) -> bool {
        let id = unquote(id);
        self.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(id))
            || self.name.eq_ignore_ascii_case(id)
            || self
                .schema
                .as_deref()
                .is_some_and(|s| format!("{s}.{}", self.name).eq_ignore_ascii_case(id))
    }
}

/// Strip one pair of surrounding double quotes
pub fn unquote(name: &str) -> &str {
    name.strip_prefix('"')
        .and_then(|n| n.strip_suffix('"'))
        .unwrap_or(name)
}

const TABLE_PREFIXES: &[&str] = &["COPY", "FROM", "INTO", "UPDATE", "TABLE"];
const DML_KEYWORDS: &[&str] = &["SELECT", "INSERT", "UPSERT", "UPDATE", "DELETE"];

/// Extract the table references of the first statement in `sql`.
///
/// Unparseable input yields no references. For INSERT statements the scan
/// stops at the first punctuation so the column list is never mistaken for
/// a table.
pub fn extract_tables(sql: &str, literals: &Literals) -> Vec<TableReference> {
    let tokens = match tokenize(sql, literals) {
        Ok(tokens) => tokens,
        Err(err) => {
            trace!("table extraction skipped: {}", err);
            return Vec::new();
        }
    };
    let Some(first) = split_statements(tokens).into_iter().next() else {
        return Vec::new();
    };
    let statement = Statement::from_tokens(first);
    let is_insert = matches!(
        statement.first_keyword().as_deref(),
        Some("insert") | Some("upsert")
    );

    let mut items = Vec::new();
    extract_from_part(&statement.nodes, is_insert, &mut items);
    items.into_iter().filter_map(table_reference).collect()
}

fn is_subselect(node: &Node) -> bool {
    let Node::Parenthesis(children) = node else {
        return false;
    };
    children
        .iter()
        .skip(1)
        .find(|n| !n.is_trivia())
        .is_some_and(|n| {
            n.is_keyword() && DML_KEYWORDS.contains(&n.lower().to_uppercase().as_str())
        })
}

fn is_table_prefix(node: &Node) -> bool {
    node.as_token().is_some_and(|t| {
        t.is_keyword() && {
            let kw = t.normalized();
            TABLE_PREFIXES.contains(&kw.as_str()) || kw.ends_with("JOIN")
        }
    })
}

/// Collect candidate table nodes, descending into subselects and WHERE
/// clauses
fn extract_from_part<'a>(nodes: &'a [Node], stop_at_punctuation: bool, out: &mut Vec<&'a Node>) {
    let mut prefix_seen = false;
    let mut skip_alias = false;

    for node in nodes.iter().filter(|n| !n.is_trivia()) {
        if let Node::Where(children) = node {
            prefix_seen = false;
            extract_from_part(children, stop_at_punctuation, out);
            continue;
        }
        if is_subselect(node) {
            extract_from_part(node.children(), stop_at_punctuation, out);
            skip_alias = prefix_seen;
            continue;
        }
        if !prefix_seen {
            prefix_seen = is_table_prefix(node);
            continue;
        }

        if stop_at_punctuation
            && node
                .as_token()
                .is_some_and(|t| t.kind == TokenKind::Punctuation)
        {
            return;
        }
        if node.is_keyword() && !is_table_prefix(node) {
            prefix_seen = false;
        } else if skip_alias && matches!(node, Node::Identifier(_)) {
            skip_alias = false;
        } else {
            skip_alias = false;
            out.push(node);
        }
    }
}

/// Split an identifier or function node into its dotted name parts and an
/// optional alias
fn name_parts(children: &[Node]) -> (Vec<String>, Option<String>) {
    let mut parts = Vec::new();
    let mut idx = 0;
    let mut expect_part = true;

    while let Some(node) = children.get(idx) {
        match node {
            Node::Token(t) if t.is_punct(".") => {
                if expect_part {
                    parts.push(String::new());
                }
                expect_part = true;
            }
            Node::Token(t) if expect_part && !t.is_trivia() => {
                parts.push(unquote(&t.value).to_string());
                expect_part = false;
            }
            Node::Parenthesis(_) => expect_part = false,
            _ => break,
        }
        idx += 1;
    }
    if expect_part && !parts.is_empty() {
        // Dangling `name.`
        parts.push(String::new());
    }

    let alias = children[idx..]
        .iter()
        .rev()
        .find_map(Node::as_token)
        .filter(|t| matches!(t.kind, TokenKind::Name | TokenKind::QuotedName))
        .map(|t| unquote(&t.value).to_string());
    (parts, alias)
}

fn table_reference(node: &Node) -> Option<TableReference> {
    let children = match node {
        Node::Identifier(children) | Node::Function(children) => children.as_slice(),
        _ => return None,
    };
    let (mut parts, alias) = name_parts(children);
    let name = parts.pop().filter(|n| !n.is_empty())?;
    let schema = parts.pop().filter(|s| !s.is_empty());
    Some(TableReference {
        schema,
        name,
        alias,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn tables(sql: &str) -> Vec<(Option<String>, String, Option<String>)> {
        extract_tables(sql, &Literals::builtin().unwrap())
            .into_iter()
            .map(|t| (t.schema, t.name, t.alias))
            .collect()
    }

    fn t(name: &str, alias: Option<&str>) -> (Option<String>, String, Option<String>) {
        (None, name.to_string(), alias.map(str::to_string))
    }

    #[rstest]
    #[case("SELECT * FROM orders", vec![t("orders", None)])]
    #[case("SELECT * FROM orders o", vec![t("orders", Some("o"))])]
    #[case("SELECT * FROM orders AS o WHERE o.id = 1", vec![t("orders", Some("o"))])]
    #[case("SELECT * FROM a, b", vec![t("a", None), t("b", None)])]
    #[case("SELECT * FROM a JOIN b ON a.id = b.id", vec![t("a", None), t("b", None)])]
    #[case("SELECT * FROM a LEFT OUTER JOIN b bb", vec![t("a", None), t("b", Some("bb"))])]
    #[case("UPDATE accounts SET x = 1", vec![t("accounts", None)])]
    #[case("DELETE FROM accounts WHERE", vec![t("accounts", None)])]
    #[case("INSERT INTO orders (id, total) VALUES (1, 2)", vec![t("orders", None)])]
    #[case("SELECT * FROM (SELECT id FROM inner_t) x", vec![t("inner_t", None)])]
    #[case("SELECT * FROM a WHERE id IN (SELECT id FROM b)", vec![t("a", None), t("b", None)])]
    #[case("SELECT * FROM \"My Table\" m", vec![t("My Table", Some("m"))])]
    #[case("SELECT 'unterminated FROM x", vec![])]
    fn test_extract_tables(
        #[case] sql: &str,
        #[case] expected: Vec<(Option<String>, String, Option<String>)>,
    ) {
        assert_eq!(tables(sql), expected);
    }

    #[test]
    fn test_schema_qualified_reference() {
        let refs = extract_tables("SELECT * FROM s.orders o", &Literals::builtin().unwrap());
        assert_eq!(refs.len(), 1);
        assert!(refs[0].schema_qualified());
        assert!(refs[0].identifies("O"));
        assert!(refs[0].identifies("orders"));
        assert!(refs[0].identifies("s.orders"));
        assert!(!refs[0].identifies("s"));
        assert_eq!(refs[0].reference(), "o");
    }

    #[test]
    fn test_dangling_qualifier_is_ignored() {
        assert_eq!(tables("SELECT * FROM orders o JOIN c."), vec![t("orders", Some("o"))]);
    }
}
