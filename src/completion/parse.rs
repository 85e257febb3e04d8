/*!
 * Statement splitting and light-weight grouping
 *
 * Groups the flat token stream into the few composite nodes the analyzer
 * cares about: closed parentheses, dotted identifiers (with aliases),
 * function calls, comparisons and WHERE clauses. Unbalanced input is fine;
 * an unclosed parenthesis simply stays a plain token.
 */

use super::lexer::{SqlToken, TokenKind};

/// Keywords that terminate a WHERE clause
const WHERE_CLOSERS: &[&str] = &[
    "ORDER",
    "GROUP",
    "LIMIT",
    "OFFSET",
    "UNION",
    "EXCEPT",
    "INTERSECT",
    "HAVING",
    "RETURNING",
    "INTO",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Token(SqlToken),
    /// `name`, `a.b`, `a.b alias`, `a AS b`, or a dangling `a.`
    Identifier(Vec<Node>),
    /// `name(...)`, optionally aliased
    Function(Vec<Node>),
    /// A balanced `( ... )`, parentheses included
    Parenthesis(Vec<Node>),
    /// `lhs <op> rhs`
    Comparison(Vec<Node>),
    /// `WHERE ...` up to the next clause keyword
    Where(Vec<Node>),
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Token(_) => &[],
            Node::Identifier(c)
            | Node::Function(c)
            | Node::Parenthesis(c)
            | Node::Comparison(c)
            | Node::Where(c) => c,
        }
    }

    pub fn as_token(&self) -> Option<&SqlToken> {
        match self {
            Node::Token(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_trivia(&self) -> bool {
        self.as_token().is_some_and(SqlToken::is_trivia)
    }

    pub fn is_keyword(&self) -> bool {
        self.as_token().is_some_and(SqlToken::is_keyword)
    }

    pub fn is_punct(&self, punct: &str) -> bool {
        self.as_token().is_some_and(|t| t.is_punct(punct))
    }

    /// Source text covered by the node
    pub fn value(&self) -> String {
        match self {
            Node::Token(t) => t.value.clone(),
            _ => self.children().iter().map(Node::value).collect(),
        }
    }

    /// Lower-cased value; keywords are whitespace-normalized first
    pub fn lower(&self) -> String {
        match self {
            Node::Token(t) => t.lower(),
            _ => self.value().to_lowercase(),
        }
    }

    pub fn flatten(&self) -> Vec<&SqlToken> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into<'a>(&'a self, out: &mut Vec<&'a SqlToken>) {
        match self {
            Node::Token(t) => out.push(t),
            _ => self.children().iter().for_each(|c| c.flatten_into(out)),
        }
    }
}

/// Index of the last non-trivia node in `nodes`
pub fn last_significant(nodes: &[Node]) -> Option<usize> {
    nodes.iter().rposition(|n| !n.is_trivia())
}

/// Index of the first non-trivia node in `nodes`
pub fn first_significant(nodes: &[Node]) -> Option<usize> {
    nodes.iter().position(|n| !n.is_trivia())
}

/// Index of the non-trivia node preceding position `idx`
pub fn prev_significant(nodes: &[Node], idx: usize) -> Option<usize> {
    nodes[..idx.min(nodes.len())].iter().rposition(|n| !n.is_trivia())
}

/// One grouped SQL statement
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    pub nodes: Vec<Node>,
}

impl Statement {
    pub fn from_tokens(tokens: Vec<SqlToken>) -> Self {
        Self {
            nodes: group(tokens),
        }
    }

    pub fn first_token(&self) -> Option<&Node> {
        first_significant(&self.nodes).map(|i| &self.nodes[i])
    }

    pub fn last_token(&self) -> Option<&Node> {
        last_significant(&self.nodes).map(|i| &self.nodes[i])
    }

    /// Statement keyword, e.g. `select` or `insert`
    pub fn first_keyword(&self) -> Option<String> {
        self.first_token().map(Node::lower)
    }

    pub fn flatten(&self) -> Vec<&SqlToken> {
        self.nodes.iter().flat_map(Node::flatten).collect()
    }

    pub fn value(&self) -> String {
        self.nodes.iter().map(Node::value).collect()
    }
}

/// Split a token stream into statements. Each statement keeps its trailing
/// semicolon and the whitespace after it, so statement lengths add up to
/// the length of the input.
pub fn split_statements(tokens: Vec<SqlToken>) -> Vec<Vec<SqlToken>> {
    let mut statements = Vec::new();
    let mut current: Vec<SqlToken> = Vec::new();
    let mut after_semicolon = false;

    for token in tokens {
        if after_semicolon && token.kind != TokenKind::Whitespace {
            statements.push(std::mem::take(&mut current));
            after_semicolon = false;
        }
        if token.is_punct(";") {
            after_semicolon = true;
        }
        current.push(token);
    }
    if !current.is_empty() {
        statements.push(current);
    }
    statements
}

fn group(tokens: Vec<SqlToken>) -> Vec<Node> {
    group_level(group_parens(tokens))
}

/// Build parenthesis nodes for balanced pairs; unclosed parentheses and
/// their contents are spliced back into the enclosing level.
fn group_parens(tokens: Vec<SqlToken>) -> Vec<Node> {
    let mut stack: Vec<Vec<Node>> = vec![Vec::new()];

    for token in tokens {
        if token.is_punct("(") {
            stack.push(vec![Node::Token(token)]);
        } else if token.is_punct(")") && stack.len() > 1 {
            let mut inner = stack.pop().unwrap_or_default();
            inner.push(Node::Token(token));
            let open = inner.remove(0);
            let close = inner.pop();
            let mut children = vec![open];
            children.extend(group_level(inner));
            children.extend(close);
            if let Some(parent) = stack.last_mut() {
                parent.push(Node::Parenthesis(children));
            }
        } else if let Some(level) = stack.last_mut() {
            level.push(Node::Token(token));
        }
    }

    while stack.len() > 1 {
        let unclosed = stack.pop().unwrap_or_default();
        if let Some(parent) = stack.last_mut() {
            parent.extend(unclosed);
        }
    }
    stack.pop().unwrap_or_default()
}

fn group_level(nodes: Vec<Node>) -> Vec<Node> {
    group_where(group_comparisons(group_identifiers(nodes)))
}

fn is_word(node: &Node) -> bool {
    node.as_token().is_some_and(|t| {
        matches!(
            t.kind,
            TokenKind::Name | TokenKind::QuotedName | TokenKind::Keyword
        )
    })
}

fn is_name(node: &Node) -> bool {
    node.as_token()
        .is_some_and(|t| matches!(t.kind, TokenKind::Name | TokenKind::QuotedName))
}

fn group_identifiers(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut i = 0;

    while i < nodes.len() {
        let starts_chain =
            is_name(&nodes[i]) || (is_word(&nodes[i]) && nodes.get(i + 1).is_some_and(|n| n.is_punct(".")));
        if !starts_chain {
            out.push(nodes[i].clone());
            i += 1;
            continue;
        }

        // Dotted chain: word ('.' (word | '*')?)*
        let mut end = i + 1;
        while nodes.get(end).is_some_and(|n| n.is_punct(".")) {
            end += 1;
            let part = nodes.get(end);
            if part.is_some_and(|n| is_word(n) || n.value() == "*") {
                end += 1;
            } else {
                break;
            }
        }

        let is_function = matches!(nodes.get(end), Some(Node::Parenthesis(_)));
        if is_function {
            end += 1;
        }

        // Optional alias: [AS] name
        let mut alias_end = None;
        let mut j = end;
        while nodes.get(j).is_some_and(Node::is_trivia) {
            j += 1;
        }
        if nodes
            .get(j)
            .is_some_and(|n| n.is_keyword() && n.lower() == "as")
        {
            j += 1;
            while nodes.get(j).is_some_and(Node::is_trivia) {
                j += 1;
            }
        }
        if nodes.get(j).is_some_and(is_name) {
            alias_end = Some(j + 1);
        }

        let stop = alias_end.unwrap_or(end);
        let children: Vec<Node> = nodes[i..stop].to_vec();
        out.push(if is_function {
            Node::Function(children)
        } else {
            Node::Identifier(children)
        });
        i = stop;
    }
    out
}

fn is_operand(node: &Node) -> bool {
    match node {
        Node::Identifier(_) | Node::Function(_) | Node::Parenthesis(_) => true,
        Node::Token(t) => matches!(
            t.kind,
            TokenKind::Literal | TokenKind::Name | TokenKind::QuotedName
        ),
        _ => false,
    }
}

fn group_comparisons(nodes: Vec<Node>) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(nodes.len());
    let mut i = 0;

    while i < nodes.len() {
        let is_operator = nodes[i]
            .as_token()
            .is_some_and(|t| t.kind == TokenKind::Comparison);
        if is_operator {
            let left = last_significant(&out).filter(|&l| is_operand(&out[l]));
            let right = (i + 1..nodes.len())
                .find(|&r| !nodes[r].is_trivia())
                .filter(|&r| is_operand(&nodes[r]));
            if let (Some(l), Some(r)) = (left, right) {
                let mut children: Vec<Node> = out.drain(l..).collect();
                children.extend(nodes[i..=r].iter().cloned());
                out.push(Node::Comparison(children));
                i = r + 1;
                continue;
            }
        }
        out.push(nodes[i].clone());
        i += 1;
    }
    out
}

fn group_where(nodes: Vec<Node>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut i = 0;

    while i < nodes.len() {
        if nodes[i].is_keyword() && nodes[i].lower() == "where" {
            let end = (i + 1..nodes.len())
                .find(|&e| {
                    nodes[e].is_keyword()
                        && WHERE_CLOSERS.contains(&nodes[e].lower().to_uppercase().as_str())
                })
                .unwrap_or(nodes.len());
            out.push(Node::Where(nodes[i..end].to_vec()));
            i = end;
        } else {
            out.push(nodes[i].clone());
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::lexer::tokenize;
    use crate::completion::literals::Literals;

    fn parse(sql: &str) -> Statement {
        let tokens = tokenize(sql, &Literals::builtin().unwrap()).unwrap();
        Statement::from_tokens(tokens)
    }

    #[test]
    fn test_where_clause_is_grouped() {
        let stmt = parse("SELECT * FROM foo WHERE a = 1 AND b ORDER BY a");
        assert!(stmt
            .nodes
            .iter()
            .any(|n| matches!(n, Node::Where(c) if c.iter().any(|x| matches!(x, Node::Comparison(_))))));
        assert_eq!(stmt.last_token().unwrap().value(), "a");
    }

    #[test]
    fn test_trailing_where_is_last_token() {
        let stmt = parse("SELECT * FROM foo WHERE ");
        assert!(matches!(stmt.last_token(), Some(Node::Where(_))));
    }

    #[test]
    fn test_identifier_with_alias() {
        let stmt = parse("SELECT * FROM orders o");
        let last = stmt.last_token().unwrap();
        assert!(matches!(last, Node::Identifier(_)));
        assert_eq!(last.value(), "orders o");
    }

    #[test]
    fn test_trailing_as_is_not_absorbed() {
        let stmt = parse("SELECT a AS ");
        assert_eq!(stmt.last_token().unwrap().lower(), "as");
    }

    #[test]
    fn test_unclosed_paren_stays_flat() {
        let stmt = parse("SELECT count(");
        assert!(stmt.last_token().unwrap().is_punct("("));
        let stmt = parse("SELECT count(*)");
        assert!(matches!(stmt.last_token(), Some(Node::Function(_))));
    }

    #[test]
    fn test_comparison_needs_both_sides() {
        let stmt = parse("SELECT * FROM a JOIN b ON a.id = ");
        assert_eq!(stmt.last_token().unwrap().value(), "=");
        let stmt = parse("SELECT * FROM a JOIN b ON a.id = b.id");
        assert!(matches!(stmt.last_token(), Some(Node::Comparison(_))));
    }

    #[test]
    fn test_split_keeps_lengths() {
        let sql = "SELECT 1;  SELECT 2; SELECT";
        let tokens = tokenize(sql, &Literals::builtin().unwrap()).unwrap();
        let parts = split_statements(tokens);
        assert_eq!(parts.len(), 3);
        let total: usize = parts
            .iter()
            .map(|p| p.iter().map(|t| t.value.len()).sum::<usize>())
            .sum();
        assert_eq!(total, sql.len());
        assert_eq!(parts[1][0].value, "SELECT");
    }
}
