//! Schema-checked bulk insertion.
//!
//! The pipeline is strictly linear and stops at the first failure:
//! fetch schema → validate shape → cast → `execute_many` → `commit`.
//! Nothing is committed unless every step succeeds.

use log::{error, info};

use crate::{
    db::SqlBackend,
    error::{Error, Result},
    frame::Row,
    schema::{TableSchema, parse_schema},
    value::cast,
};

/// Reads and parses the creation statement of `table`.
pub fn fetch_schema<B: SqlBackend + ?Sized>(backend: &mut B, table: &str) -> Result<TableSchema> {
    let statement = backend.table_sql(table)?;
    parse_schema(&statement)
}

/// Checks the batch width against `schema` and optionally casts every value
/// to its column's storage class.
///
/// Only the first row is measured; use [`ensure_uniform_shape`] beforehand
/// when the batch may be ragged. Casting pairs values with schema columns
/// positionally, and the first value that does not convert fails the batch.
pub fn validate_and_cast(schema: &TableSchema, rows: Vec<Row>, cast_values: bool) -> Result<Vec<Row>> {
    let width = rows.first().map_or(0, Vec::len);
    if schema.len() != width {
        let msg = format!(
            "Insertion validation error: table has {} cols vs input {} cols",
            schema.len(),
            width
        );
        error!("{msg}");
        return Err(Error::Shape(msg));
    }
    if !cast_values {
        return Ok(rows);
    }

    let mut cast_rows = Vec::with_capacity(rows.len());
    for (row_idx, row) in rows.iter().enumerate() {
        let converted = row
            .iter()
            .zip(schema.columns.iter())
            .map(|(value, column)| cast(column.sql_type, value))
            .collect::<Result<Row>>()
            .map_err(|err| {
                let msg = format!("exception while casting row {row_idx} {row:?}: {err}");
                error!("Insertion validation error: {msg}");
                Error::Cast(msg)
            })?;
        cast_rows.push(converted);
    }
    Ok(cast_rows)
}

/// Fails unless every row has the same number of values.
pub fn ensure_uniform_shape(rows: &[Row]) -> Result<()> {
    let Some(width) = rows.first().map(Vec::len) else {
        return Ok(());
    };
    match rows.iter().position(|row| row.len() != width) {
        Some(idx) => Err(Error::Shape(format!(
            "Row {idx} has {} value(s), expected {width}",
            rows[idx].len()
        ))),
        None => Ok(()),
    }
}

/// `INSERT INTO table(c1,...) VALUES (?,...)` naming the schema's columns in schema order.
pub fn insert_statement(table: &str, schema: &TableSchema) -> String {
    let columns = schema.names().collect::<Vec<_>>().join(",");
    let placeholders = vec!["?"; schema.len()].join(",");
    format!("INSERT INTO {table}({columns}) VALUES ({placeholders})")
}

/// Inserts `rows` into `table` as one committed batch and returns the row count.
///
/// An empty batch is a no-op and never touches the backend.
pub fn insert<B: SqlBackend + ?Sized>(
    backend: &mut B,
    table: &str,
    rows: Vec<Row>,
    cast_values: bool,
) -> Result<usize> {
    if rows.is_empty() {
        info!("Insertion to {table} skipped: no rows");
        return Ok(0);
    }
    let schema = fetch_schema(backend, table)?;
    let rows = validate_and_cast(&schema, rows, cast_values)?;
    let statement = insert_statement(table, &schema);
    backend.execute_many(&statement, &rows).inspect_err(|err| {
        error!("Insertion exception for {statement}: {err}");
    })?;
    backend.commit()?;
    info!("Insertion to {table} executed: {statement} ({} row(s))", rows.len());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::SchemaColumn, value::{SqlType, Value}};

    fn schema(columns: &[(&str, SqlType)]) -> TableSchema {
        TableSchema {
            columns: columns
                .iter()
                .map(|(name, sql_type)| SchemaColumn {
                    name: name.to_string(),
                    sql_type: *sql_type,
                })
                .collect(),
        }
    }

    #[test]
    fn insert_statement_uses_schema_order() {
        let schema = schema(&[("x", SqlType::Integer), ("y", SqlType::Text)]);
        assert_eq!(
            insert_statement("t", &schema),
            "INSERT INTO t(x,y) VALUES (?,?)"
        );
    }

    #[test]
    fn uniform_shape_reports_first_ragged_row() {
        let rows = vec![
            vec![Value::Integer(1), Value::Integer(2)],
            vec![Value::Integer(3)],
        ];
        let err = ensure_uniform_shape(&rows).unwrap_err();
        assert_eq!(err.to_string(), "Row 1 has 1 value(s), expected 2");
        assert!(ensure_uniform_shape(&[]).is_ok());
    }

    #[test]
    fn cast_disabled_returns_rows_untouched() {
        let schema = schema(&[("x", SqlType::Integer)]);
        let rows = vec![vec![Value::from("not a number")]];
        assert_eq!(validate_and_cast(&schema, rows.clone(), false).unwrap(), rows);
    }
}
