use super::analyzer::ContextAnalyzer;
use super::cte::LocalTable;
use super::literals::Literals;
use super::suggestion::{ColumnContext, FunctionUsage, SuggestionRequest};
use super::tables::TableReference;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

fn suggest(text: &str) -> Vec<SuggestionRequest> {
    let analyzer = ContextAnalyzer::new(Arc::new(Literals::builtin().unwrap()));
    analyzer.suggest_type(text, text)
}

fn suggest_at(full: &str, cursor: usize) -> Vec<SuggestionRequest> {
    let analyzer = ContextAnalyzer::new(Arc::new(Literals::builtin().unwrap()));
    analyzer.suggest_type(full, &full[..cursor])
}

fn kinds(text: &str) -> Vec<&'static str> {
    suggest(text).iter().map(SuggestionRequest::kind).collect()
}

fn table(name: &str) -> TableReference {
    TableReference::new(name)
}

fn aliased(name: &str, alias: &str) -> TableReference {
    TableReference::new(name).with_alias(alias)
}

fn expression_requests(tables: Vec<TableReference>, keyword: &str) -> Vec<SuggestionRequest> {
    vec![
        SuggestionRequest::Column {
            table_refs: tables.clone(),
            require_last_table: false,
            local_tables: vec![],
            qualifiable: true,
            context: ColumnContext::Default,
        },
        SuggestionRequest::Function {
            table_refs: tables,
            usage: FunctionUsage::Call,
            qualifier: None,
        },
        SuggestionRequest::keyword(Some(keyword.to_string())),
    ]
}

fn qualified_requests(tables: Vec<TableReference>, qualifier: &str) -> Vec<SuggestionRequest> {
    let qualifier = Some(qualifier.to_string());
    vec![
        SuggestionRequest::column(tables, vec![]),
        SuggestionRequest::Table {
            table_refs: vec![],
            local_tables: vec![],
            qualifier: qualifier.clone(),
        },
        SuggestionRequest::View {
            table_refs: vec![],
            qualifier: qualifier.clone(),
        },
        SuggestionRequest::Function {
            table_refs: vec![],
            usage: FunctionUsage::Call,
            qualifier,
        },
    ]
}

#[rstest]
#[case("")]
#[case("SEL")]
#[case("SELECT * FROM orders o ")]
#[case("SELECT * FROM a JOIN b ")]
#[case("SELECT * FROM t WHERE EXISTS (")]
#[case("SELECT * FROM (")]
fn test_plain_keyword_positions(#[case] text: &str) {
    assert_eq!(suggest(text), vec![SuggestionRequest::keyword(None)]);
}

#[test]
fn test_select_list() {
    assert_eq!(suggest("SELECT "), expression_requests(vec![], "SELECT"));
    assert_eq!(suggest("select id, "), expression_requests(vec![], "SELECT"));
}

#[test]
fn test_where_clause_resolves_tables() {
    assert_eq!(
        suggest("SELECT * FROM orders WHERE id = 1 AND "),
        expression_requests(vec![table("orders")], "WHERE")
    );
    assert_eq!(
        suggest("SELECT * FROM orders ORDER BY "),
        expression_requests(vec![table("orders")], "BY")
    );
}

#[test]
fn test_tables_after_cursor_are_in_scope() {
    let text = "SELECT  FROM orders o JOIN customers c";
    assert_eq!(
        suggest_at(text, "SELECT ".len()),
        expression_requests(vec![aliased("orders", "o"), aliased("customers", "c")], "SELECT")
    );
}

#[test]
fn test_alias_resolution() {
    assert_eq!(
        suggest("SELECT * FROM accounts a WHERE a."),
        qualified_requests(vec![aliased("accounts", "a")], "a")
    );
}

#[rstest]
#[case("SELECT * FROM orders WHERE z.")]
#[case("SELECT * FROM orders o JOIN customers c ON x.")]
fn test_unknown_qualifier_has_no_column_scope(#[case] text: &str) {
    assert_eq!(kinds(text), vec!["table", "view", "function"]);
}

#[test]
fn test_from_and_join() {
    assert_eq!(
        suggest("SELECT * FROM "),
        vec![SuggestionRequest::FromClauseItem {
            table_refs: vec![],
            local_tables: vec![],
        }]
    );
    assert_eq!(
        suggest("SELECT * FROM orders o JOIN "),
        vec![
            SuggestionRequest::FromClauseItem {
                table_refs: vec![aliased("orders", "o")],
                local_tables: vec![],
            },
            SuggestionRequest::Join {
                table_refs: vec![aliased("orders", "o")],
            },
        ]
    );
}

#[rstest]
#[case("SELECT * FROM a CROSS JOIN ")]
#[case("SELECT * FROM a NATURAL JOIN ")]
fn test_join_suggestion_not_legal(#[case] text: &str) {
    assert_eq!(kinds(text), vec!["from clause item"]);
}

#[rstest]
#[case("SELECT * FROM a LEFT JOIN ")]
#[case("SELECT * FROM a left outer join ")]
#[case("SELECT * FROM a INNER JOIN ")]
fn test_join_suggestion_legal(#[case] text: &str) {
    assert_eq!(kinds(text), vec!["from clause item", "join"]);
}

#[test]
fn test_on_clause() {
    let tables = vec![aliased("orders", "o"), aliased("customers", "c")];
    assert_eq!(
        suggest("SELECT * FROM orders o JOIN customers c ON "),
        vec![
            SuggestionRequest::Alias {
                aliases: vec!["o".to_string(), "c".to_string()],
            },
            SuggestionRequest::JoinCondition {
                table_refs: tables.clone(),
                parent: None,
            },
        ]
    );

    let mut expected = qualified_requests(vec![aliased("customers", "c")], "c");
    expected.push(SuggestionRequest::JoinCondition {
        table_refs: tables,
        parent: Some(aliased("customers", "c")),
    });
    assert_eq!(suggest("SELECT * FROM orders o JOIN customers c ON c."), expected);
}

#[test]
fn test_comparison_in_join_condition() {
    assert_eq!(
        suggest("SELECT * FROM ORDERS O JOIN CUSTOMERS C ON O.CUSTOMER_ID = C."),
        qualified_requests(vec![aliased("CUSTOMERS", "C")], "C")
    );
}

#[test]
fn test_insert_column_list() {
    assert_eq!(
        suggest("INSERT INTO orders ("),
        vec![SuggestionRequest::Column {
            table_refs: vec![table("orders")],
            require_last_table: false,
            local_tables: vec![],
            qualifiable: false,
            context: ColumnContext::Insert,
        }]
    );
}

#[test]
fn test_insert_target_is_not_a_source() {
    assert_eq!(
        suggest("INSERT INTO orders SELECT * FROM customers WHERE "),
        expression_requests(vec![table("customers")], "WHERE")
    );
}

#[test]
fn test_using_requires_last_table() {
    assert_eq!(
        suggest("SELECT * FROM a JOIN b USING ("),
        vec![SuggestionRequest::Column {
            table_refs: vec![table("a"), table("b")],
            require_last_table: true,
            local_tables: vec![],
            qualifiable: false,
            context: ColumnContext::Default,
        }]
    );
}

#[test]
fn test_function_arguments() {
    assert_eq!(
        suggest("SELECT count("),
        vec![SuggestionRequest::Column {
            table_refs: vec![],
            require_last_table: false,
            local_tables: vec![],
            qualifiable: true,
            context: ColumnContext::Default,
        }]
    );
    assert_eq!(
        suggest("SELECT * FROM t WHERE id IN ("),
        expression_requests(vec![table("t")], "WHERE")
    );
}

#[test]
fn test_update_set() {
    assert_eq!(
        suggest("UPDATE orders SET "),
        vec![SuggestionRequest::column(vec![table("orders")], vec![])]
    );
    assert_eq!(
        suggest("UPDATE "),
        vec![
            SuggestionRequest::Table {
                table_refs: vec![],
                local_tables: vec![],
                qualifier: None,
            },
            SuggestionRequest::View {
                table_refs: vec![],
                qualifier: None,
            },
        ]
    );
}

#[rstest]
#[case("EXEC ")]
#[case("execute ")]
fn test_procedures(#[case] text: &str) {
    assert_eq!(suggest(text), vec![SuggestionRequest::Procedure]);
}

#[test]
fn test_exec_with_partial_procedure_name() {
    assert_eq!(suggest("EXEC @Ad"), vec![SuggestionRequest::Procedure]);
}

#[rstest]
#[case("CREATE TABLE foo (bar ")]
#[case("CREATE TABLE foo (bar INTEGER, baz ")]
fn test_datatype_positions(#[case] text: &str) {
    assert_eq!(suggest(text), vec![SuggestionRequest::Datatype]);
}

#[rstest]
#[case("DROP ", "DROP")]
#[case("create ", "CREATE")]
#[case("ALTER ", "ALTER")]
fn test_ddl_keywords(#[case] text: &str, #[case] keyword: &str) {
    assert_eq!(suggest(text), vec![SuggestionRequest::keyword(Some(keyword.to_string()))]);
}

#[rstest]
#[case("DROP FUNCTION ")]
#[case("CREATE OR REPLACE FUNCTION ")]
fn test_function_signature(#[case] text: &str) {
    assert_eq!(
        suggest(text),
        vec![SuggestionRequest::Function {
            table_refs: vec![],
            usage: FunctionUsage::Signature,
            qualifier: None,
        }]
    );
}

#[test]
fn test_alias_position_suggests_nothing() {
    assert!(suggest("SELECT id AS ").is_empty());
}

#[test]
fn test_tokenizer_failure_is_empty() {
    assert!(suggest("SELECT 'abc def").is_empty());
}

#[test]
fn test_multiple_statements() {
    assert_eq!(
        suggest("SELECT * FROM a; SELECT * FROM b WHERE "),
        expression_requests(vec![table("b")], "WHERE")
    );
    let full = "SELECT * FROM a WHERE ; SELECT * FROM b";
    assert_eq!(
        suggest_at(full, "SELECT * FROM a WHERE ".len()),
        expression_requests(vec![table("a")], "WHERE")
    );
}

#[test]
fn test_cte_tables_are_local() {
    assert_eq!(
        suggest("WITH cte AS (SELECT x FROM t) SELECT * FROM "),
        vec![SuggestionRequest::FromClauseItem {
            table_refs: vec![],
            local_tables: vec![LocalTable {
                name: "cte".to_string(),
                columns: vec!["x".to_string()],
            }],
        }]
    );
}

#[test]
fn test_cursor_inside_cte_body() {
    let full = "WITH a AS (SELECT  FROM t) SELECT * FROM a";
    let cursor = "WITH a AS (SELECT ".len();
    assert_eq!(
        suggest_at(full, cursor),
        expression_requests(vec![table("t")], "SELECT")
    );
}

#[test]
fn test_function_body() {
    assert_eq!(
        kinds("CREATE FUNCTION f() RETURNS int AS $$ SELECT * FROM "),
        vec!["from clause item"]
    );
}

#[rstest]
#[case("((((")]
#[case(")))")]
#[case("SELECT ,,, = = AND OR ")]
#[case("; ; ;")]
#[case("WITH")]
#[case("WITH a AS (")]
fn test_malformed_input_does_not_panic(#[case] text: &str) {
    let _ = suggest(text);
}
