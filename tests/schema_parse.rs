use datautils::{
    Error,
    schema::{TableSchema, parse_schema},
    value::SqlType,
};

fn pairs(schema: &TableSchema) -> Vec<(&str, SqlType)> {
    schema
        .columns
        .iter()
        .map(|c| (c.name.as_str(), c.sql_type))
        .collect()
}

#[test]
fn row_id_foreign_key_and_unique_entries_are_excluded() {
    let statement = "CREATE TABLE t(id INTEGER PRIMARY KEY, name TEXT, score REAL, \
                     owner INTEGER, FOREIGN KEY(owner) REFERENCES u(id), UNIQUE(name))";
    let schema = parse_schema(statement).unwrap();
    assert_eq!(
        pairs(&schema),
        vec![
            ("name", SqlType::Text),
            ("score", SqlType::Real),
            ("owner", SqlType::Integer),
        ]
    );
}

#[test]
fn keywords_are_case_insensitive_and_statement_may_span_lines() {
    let statement = "create table if not exists \"orders\" (\n\
                     \tsku varchar(16) not null,\n\
                     \tqty BIGINT,\n\
                     \tprice double precision,\n\
                     \tdiscount Float\n\
                     );";
    let schema = parse_schema(statement).unwrap();
    assert_eq!(
        pairs(&schema),
        vec![
            ("sku", SqlType::Text),
            ("qty", SqlType::Integer),
            ("price", SqlType::Real),
            ("discount", SqlType::Real),
        ]
    );
}

#[test]
fn table_constraints_are_not_columns() {
    let statement = "CREATE TABLE pairs(a INT, b INT, PRIMARY KEY (a, b), \
                     CONSTRAINT positive CHECK (a > 0))";
    let schema = parse_schema(statement).unwrap();
    assert_eq!(schema.names().collect::<Vec<_>>(), vec!["a", "b"]);
}

#[test]
fn typeless_columns_are_text() {
    let schema = parse_schema("CREATE TABLE loose(anything, other)").unwrap();
    assert!(schema.types().all(|t| t == SqlType::Text));
    assert_eq!(schema.len(), 2);
}

#[test]
fn statement_without_column_list_fails() {
    let err = parse_schema("DROP TABLE t").unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(parse_schema("").is_err());
}

#[test]
fn display_lists_name_and_type() {
    let schema = parse_schema("CREATE TABLE t(a INTEGER, b TEXT)").unwrap();
    assert_eq!(schema.to_string(), "(a integer, b text)");
}
