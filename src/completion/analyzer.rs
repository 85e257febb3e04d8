/*!
 * Context analysis
 *
 * Decides which kinds of objects may appear at the cursor by looking at the
 * last significant token before it (and, when that is not decisive, the
 * keyword before that). The analysis never fails: malformed input simply
 * produces fewer suggestions.
 */

use super::lexer::{last_word, tokenize, SqlToken, TokenKind, WordScope};
use super::literals::Literals;
use super::parse::{last_significant, prev_significant, split_statements, Node, Statement};
use super::statement::{find_prev_keyword, SqlStatement, TableScope};
use super::suggestion::{ColumnContext, FunctionUsage, SuggestionRequest};
use super::tables::{extract_tables, TableReference};
use std::sync::Arc;
use tracing::{debug, trace};

/// Re-dispatch limit when walking back through keywords
const MAX_DEPTH: usize = 32;

#[derive(Debug, Clone)]
pub struct ContextAnalyzer {
    literals: Arc<Literals>,
}

impl ContextAnalyzer {
    pub fn new(literals: Arc<Literals>) -> Self {
        Self { literals }
    }

    /// Kinds of objects that may appear at the end of `text_before_cursor`,
    /// most relevant first. `full_text` is the whole buffer.
    pub fn suggest_type(&self, full_text: &str, text_before_cursor: &str) -> Vec<SuggestionRequest> {
        let mut stmt = match SqlStatement::new(full_text, text_before_cursor, &self.literals) {
            Ok(stmt) => stmt,
            Err(err) => {
                trace!("no suggestions, input does not tokenize: {}", err);
                return Vec::new();
            }
        };
        trace!(
            word = %stmt.word_before_cursor,
            before = %stmt.text_before_cursor,
            "analyzing statement"
        );

        let last = stmt.last_token.clone();
        let requests = self.suggest_based_on_last_token(last, &mut stmt, 0);
        debug!(
            kinds = ?requests.iter().map(SuggestionRequest::kind).collect::<Vec<_>>(),
            "suggestion requests"
        );
        requests
    }

    fn suggest_based_on_last_token(
        &self,
        token: Option<Node>,
        stmt: &mut SqlStatement,
        depth: usize,
    ) -> Vec<SuggestionRequest> {
        if depth > MAX_DEPTH {
            return Vec::new();
        }
        let Some(token) = token else {
            return vec![SuggestionRequest::keyword(None)];
        };

        let token = match token {
            Node::Token(t) => t,
            Node::Where(_) => {
                // Suggest based on the keyword inside the clause, e.g.
                // `WHERE x = 1 AND `
                let prev = stmt.reduce_to_prev_keyword(0);
                return self.suggest_based_on_last_token(prev.map(Node::Token), stmt, depth + 1);
            }
            Node::Identifier(_) => {
                // `CREATE TABLE foo (bar ` expects a datatype
                let (prev, _) = find_prev_keyword(&stmt.text_before_cursor, 0, &self.literals);
                return if prev.is_some_and(|p| p.is_punct("(")) {
                    vec![SuggestionRequest::Datatype]
                } else {
                    vec![SuggestionRequest::keyword(None)]
                };
            }
            Node::Comparison(children) => {
                // `a = b` with the cursor after `b`
                let rhs = last_significant(&children).map(|i| children[i].clone());
                return self.suggest_based_on_last_token(rhs, stmt, depth + 1);
            }
            Node::Function(_) | Node::Parenthesis(_) => {
                return vec![SuggestionRequest::keyword(None)];
            }
        };

        let value = token.lower();
        match value.as_str() {
            "exec" | "execute" => vec![SuggestionRequest::Procedure],
            v if v.ends_with('(') => self.suggest_in_parenthesis(stmt, depth),
            "set" => vec![self.column_request(stmt.get_tables(TableScope::Full), stmt)],
            "select" | "where" | "having" | "by" | "distinct" => self.suggest_expression(&token, stmt),
            "as" => Vec::new(),
            v if is_table_position(&token, v) => self.suggest_relation(&token, v, stmt),
            "function" => {
                let prev = stmt.get_previous_token(&token).map(|t| t.lower());
                let names_signature = matches!(
                    prev.as_deref(),
                    Some("drop") | Some("alter") | Some("create") | Some("create or replace")
                );
                if names_signature {
                    vec![SuggestionRequest::Function {
                        table_refs: Vec::new(),
                        usage: FunctionUsage::Signature,
                        qualifier: None,
                    }]
                } else {
                    Vec::new()
                }
            }
            "table" => vec![SuggestionRequest::Table {
                table_refs: Vec::new(),
                local_tables: stmt.local_tables.clone(),
                qualifier: stmt.parent_name().map(str::to_string),
            }],
            "view" => vec![SuggestionRequest::View {
                table_refs: Vec::new(),
                qualifier: stmt.parent_name().map(str::to_string),
            }],
            "column" => vec![self.column_request(stmt.get_tables(TableScope::Full), stmt)],
            "on" => self.suggest_join_condition(stmt),
            v if v.ends_with(',') || matches!(v, "=" | "and" | "or") => {
                match stmt.reduce_to_prev_keyword(0) {
                    Some(prev) => {
                        self.suggest_based_on_last_token(Some(Node::Token(prev)), stmt, depth + 1)
                    }
                    None => Vec::new(),
                }
            }
            "type" => vec![SuggestionRequest::Datatype],
            "alter" | "create" | "drop" => vec![SuggestionRequest::keyword(Some(token.normalized()))],
            _ if token.is_keyword() => match stmt.reduce_to_prev_keyword(1) {
                Some(prev) => {
                    self.suggest_based_on_last_token(Some(Node::Token(prev)), stmt, depth + 1)
                }
                None => vec![SuggestionRequest::keyword(Some(token.normalized()))],
            },
            _ => vec![SuggestionRequest::keyword(None)],
        }
    }

    fn column_request(&self, table_refs: Vec<TableReference>, stmt: &SqlStatement) -> SuggestionRequest {
        SuggestionRequest::column(table_refs, stmt.local_tables.clone())
    }

    /// Cursor right after an opening parenthesis
    fn suggest_in_parenthesis(&self, stmt: &mut SqlStatement, depth: usize) -> Vec<SuggestionRequest> {
        let Ok(tokens) = tokenize(&stmt.text_before_cursor, &self.literals) else {
            return Vec::new();
        };
        let Some(first) = split_statements(tokens).into_iter().next() else {
            return Vec::new();
        };
        let p = Statement::from_tokens(first);

        if let Some(Node::Where(where_nodes)) = p.nodes.last() {
            // `WHERE EXISTS (` starts a subquery; anything else wants columns
            let prev = last_significant(where_nodes)
                .and_then(|paren| prev_significant(where_nodes, paren))
                .map(|i| &where_nodes[i]);
            let prev = match prev {
                Some(Node::Comparison(children)) => last_significant(children).map(|i| &children[i]),
                other => other,
            };
            if prev.is_some_and(|n| n.lower() == "exists") {
                return vec![SuggestionRequest::keyword(None)];
            }
            let where_token = SqlToken {
                kind: TokenKind::Keyword,
                value: "where".to_string(),
                start: 0,
            };
            return self.suggest_based_on_last_token(Some(Node::Token(where_token)), stmt, depth + 1);
        }

        let last_idx = last_significant(&p.nodes);
        let prev_idx = last_idx.and_then(|i| prev_significant(&p.nodes, i));
        let prev = prev_idx.map(|i| &p.nodes[i]);

        // `JOIN b USING (`
        if prev.is_some_and(|n| n.lower().split_whitespace().last() == Some("using")) {
            return vec![SuggestionRequest::Column {
                table_refs: stmt.get_tables(TableScope::Before),
                require_last_table: true,
                local_tables: stmt.local_tables.clone(),
                qualifiable: false,
                context: ColumnContext::Default,
            }];
        }

        // Subquery: `SELECT * FROM (`
        if p.first_keyword().as_deref() == Some("select")
            && last_word(&stmt.text_before_cursor, WordScope::AllPunctuations).starts_with('(')
        {
            return vec![SuggestionRequest::keyword(None)];
        }

        // `INSERT INTO t (`
        let prev_prev = prev_idx.and_then(|i| prev_significant(&p.nodes, i)).map(|i| &p.nodes[i]);
        if prev_prev.is_some_and(|n| n.is_keyword() && n.lower() == "into") {
            return vec![SuggestionRequest::Column {
                table_refs: stmt.get_tables(TableScope::Insert),
                require_last_table: false,
                local_tables: Vec::new(),
                qualifiable: false,
                context: ColumnContext::Insert,
            }];
        }

        // Function arguments and the like
        vec![SuggestionRequest::Column {
            table_refs: extract_tables(&stmt.full_text, &self.literals),
            require_last_table: false,
            local_tables: stmt.local_tables.clone(),
            qualifiable: true,
            context: ColumnContext::Default,
        }]
    }

    /// After SELECT, WHERE, HAVING, BY or DISTINCT
    fn suggest_expression(&self, token: &SqlToken, stmt: &SqlStatement) -> Vec<SuggestionRequest> {
        let tables = stmt.get_tables(TableScope::Full);
        match stmt.parent_name() {
            Some(parent) => qualified_requests(&tables, parent, stmt),
            None => vec![
                SuggestionRequest::Column {
                    table_refs: tables.clone(),
                    require_last_table: false,
                    local_tables: stmt.local_tables.clone(),
                    qualifiable: true,
                    context: ColumnContext::Default,
                },
                SuggestionRequest::Function {
                    table_refs: tables,
                    usage: FunctionUsage::Call,
                    qualifier: None,
                },
                SuggestionRequest::keyword(Some(token.normalized())),
            ],
        }
    }

    /// After FROM, JOIN, INTO, UPDATE, COPY, DESCRIBE or TRUNCATE
    fn suggest_relation(&self, token: &SqlToken, value: &str, stmt: &SqlStatement) -> Vec<SuggestionRequest> {
        let qualifier = stmt.parent_name().map(str::to_string);
        let tables = extract_tables(&stmt.text_before_cursor, &self.literals);
        let is_join = value.ends_with("join") && token.is_keyword();

        let mut requests = if value == "from" || is_join {
            vec![SuggestionRequest::FromClauseItem {
                table_refs: tables,
                local_tables: stmt.local_tables.clone(),
            }]
        } else if value == "truncate" {
            vec![SuggestionRequest::Table {
                table_refs: tables,
                local_tables: Vec::new(),
                qualifier,
            }]
        } else {
            vec![
                SuggestionRequest::Table {
                    table_refs: tables.clone(),
                    local_tables: stmt.local_tables.clone(),
                    qualifier: qualifier.clone(),
                },
                SuggestionRequest::View {
                    table_refs: tables,
                    qualifier,
                },
            ]
        };

        if is_join && allow_join(stmt) {
            requests.push(SuggestionRequest::Join {
                table_refs: stmt.get_tables(TableScope::Before),
            });
        }
        requests
    }

    /// After ON
    fn suggest_join_condition(&self, stmt: &SqlStatement) -> Vec<SuggestionRequest> {
        let tables = stmt.get_tables(TableScope::Before);
        let join_condition_allowed = allow_join_condition(stmt);

        if let Some(parent) = stmt.parent_name() {
            let filtered: Vec<TableReference> =
                tables.iter().filter(|t| t.identifies(parent)).cloned().collect();
            let mut requests = qualified_requests(&tables, parent, stmt);
            if join_condition_allowed {
                if let Some(last) = filtered.last() {
                    requests.push(SuggestionRequest::JoinCondition {
                        table_refs: tables.clone(),
                        parent: Some(last.clone()),
                    });
                }
            }
            return requests;
        }

        let aliases = tables.iter().map(|t| t.reference().to_string()).collect();
        let mut requests = vec![SuggestionRequest::Alias { aliases }];
        if join_condition_allowed {
            requests.push(SuggestionRequest::JoinCondition {
                table_refs: tables,
                parent: None,
            });
        }
        requests
    }
}

/// Requests for a qualified word such as `c.` after SELECT or ON
fn qualified_requests(tables: &[TableReference], parent: &str, stmt: &SqlStatement) -> Vec<SuggestionRequest> {
    let filtered: Vec<TableReference> = tables.iter().filter(|t| t.identifies(parent)).cloned().collect();
    let qualifier = Some(parent.to_string());
    let mut requests = Vec::new();
    // A qualifier naming no table in scope has no columns; an empty
    // table list would mean every column
    if !filtered.is_empty() {
        requests.push(SuggestionRequest::column(filtered, stmt.local_tables.clone()));
    }
    requests.extend([
        SuggestionRequest::Table {
            table_refs: Vec::new(),
            local_tables: Vec::new(),
            qualifier: qualifier.clone(),
        },
        SuggestionRequest::View {
            table_refs: Vec::new(),
            qualifier: qualifier.clone(),
        },
        SuggestionRequest::Function {
            table_refs: Vec::new(),
            usage: FunctionUsage::Call,
            qualifier,
        },
    ]);
    requests
}

fn is_table_position(token: &SqlToken, value: &str) -> bool {
    (value.ends_with("join") && token.is_keyword())
        || matches!(
            value,
            "copy" | "from" | "update" | "into" | "describe" | "truncate"
        )
}

fn last_statement_token(stmt: &SqlStatement) -> Option<String> {
    stmt.parsed
        .as_ref()
        .and_then(Statement::last_token)
        .map(Node::lower)
}

/// A JOIN just before the cursor accepts a join suggestion; CROSS and
/// NATURAL joins take no condition
fn allow_join(stmt: &SqlStatement) -> bool {
    last_statement_token(stmt).is_some_and(|t| {
        t.ends_with("join") && !matches!(t.as_str(), "cross join" | "natural join")
    })
}

fn allow_join_condition(stmt: &SqlStatement) -> bool {
    last_statement_token(stmt).is_some_and(|t| matches!(t.as_str(), "on" | "and" | "or"))
}
