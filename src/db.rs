//! Database capability used by the insertion pipeline.
//!
//! The pipeline never talks to a driver directly. It needs four things from a
//! connection: run a query, run a statement, run one statement over a batch
//! of rows inside a transaction, and commit. [`SqlBackend`] names exactly
//! those, plus the lookup of a table's creation statement.

use log::{error, info};

use crate::{
    error::{Error, Result},
    frame::{Frame, Row},
    table_def::TableDef,
};

/// Rows returned by a query together with the column names that describe them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

pub trait SqlBackend {
    fn query(&mut self, sql: &str) -> Result<QueryResult>;

    fn execute(&mut self, sql: &str) -> Result<usize>;

    /// Runs `sql` once per row inside an open transaction.
    ///
    /// On failure the batch's rows are rolled back before the error is
    /// returned. Work done earlier in a transaction the caller already opened
    /// is kept.
    fn execute_many(&mut self, sql: &str, rows: &[Row]) -> Result<usize>;

    /// Commits the open transaction. A failed commit rolls it back, so no
    /// rejected rows survive into a later commit.
    fn commit(&mut self) -> Result<()>;

    /// Creation statement of `table` as stored by the engine's catalog.
    fn table_sql(&mut self, table: &str) -> Result<String>;
}

/// Runs `sql` and returns the result as a [`Frame`].
pub fn query_frame<B: SqlBackend + ?Sized>(backend: &mut B, sql: &str) -> Result<Frame> {
    let result = backend.query(sql).inspect_err(|err| {
        error!("Query {sql} returned invalid status: {err}");
    })?;
    Frame::new(result.columns, result.rows)
}

/// Executes the `CREATE TABLE` statement generated from `def`.
pub fn create_table<B: SqlBackend + ?Sized>(backend: &mut B, def: &TableDef) -> Result<()> {
    let statement = def.create_statement();
    match backend.execute(&statement) {
        Ok(_) => {
            info!("Create statement executed: {statement}");
            Ok(())
        }
        Err(err) => {
            error!("Create statement exception: {statement}; {err}");
            Err(err)
        }
    }
}

/// Coarse guard for user-supplied read queries: a `SELECT ... FROM` that
/// mentions neither `DELETE` nor `INSERT`.
pub fn is_read_only_query(sql: &str) -> bool {
    let lowered = sql.to_ascii_lowercase();
    lowered.contains("select")
        && lowered.contains("from")
        && !lowered.contains("delete")
        && !lowered.contains("insert")
}

/// Like [`query_frame`] but refuses statements failing [`is_read_only_query`].
pub fn read_only_query<B: SqlBackend + ?Sized>(backend: &mut B, sql: &str) -> Result<Frame> {
    if !is_read_only_query(sql) {
        return Err(Error::Backend(format!("Invalid query {sql}")));
    }
    query_frame(backend, sql)
}
