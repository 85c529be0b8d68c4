use std::path::Path;

use log::{debug, error, info};
use rusqlite::{
    Connection, OptionalExtension, params_from_iter,
    types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef},
};

use crate::{
    db::{QueryResult, SqlBackend},
    error::{Error, Result},
    frame::Row,
    value::Value,
};

const BATCH_SAVEPOINT: &str = "datautils_batch";

const TABLE_SQL_QUERY: &str = "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1";

/// [`SqlBackend`] over a single SQLite connection.
///
/// `execute_many` opens a transaction that stays open until [`commit`]
/// is called; dropping the backend without committing discards it. When a
/// transaction is already open the batch runs inside a savepoint, so a failed
/// batch only undoes its own rows. A failed `COMMIT` rolls the transaction back.
///
/// [`commit`]: SqlBackend::commit
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        debug!("Opened SQLite database {path:?}");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn rollback_to_savepoint(&self) {
        let undo = format!("ROLLBACK TO {BATCH_SAVEPOINT}; RELEASE {BATCH_SAVEPOINT}");
        if let Err(err) = self.conn.execute_batch(&undo) {
            error!("Rollback to savepoint failed: {err}");
        }
    }

    fn rollback(&self) {
        if self.conn.is_autocommit() {
            return;
        }
        if let Err(err) = self.conn.execute_batch("ROLLBACK") {
            error!("Rollback failed: {err}");
        }
    }
}

impl SqlBackend for SqliteBackend {
    fn query(&mut self, sql: &str) -> Result<QueryResult> {
        match run_query(&self.conn, sql) {
            Ok(result) => {
                info!("Query executed: {sql}");
                Ok(result)
            }
            Err(err) => {
                error!("Query exception: {sql}; {err}");
                Err(err.into())
            }
        }
    }

    fn execute(&mut self, sql: &str) -> Result<usize> {
        let affected = self.conn.execute(sql, []).inspect_err(|err| {
            error!("Statement exception: {sql}; {err}");
        })?;
        info!("Statement executed: {sql}");
        Ok(affected)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Row]) -> Result<usize> {
        let nested = !self.conn.is_autocommit();
        let open = if nested {
            format!("SAVEPOINT {BATCH_SAVEPOINT}")
        } else {
            "BEGIN".to_string()
        };
        self.conn.execute_batch(&open)?;
        match execute_rows(&self.conn, sql, rows) {
            Ok(affected) => {
                if nested {
                    self.conn.execute_batch(&format!("RELEASE {BATCH_SAVEPOINT}"))?;
                }
                debug!("Executed {sql} for {} row(s)", rows.len());
                Ok(affected)
            }
            Err(err) => {
                error!("Batch exception for {sql}: {err}");
                if nested {
                    self.rollback_to_savepoint();
                } else {
                    self.rollback();
                }
                Err(err.into())
            }
        }
    }

    fn commit(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        if let Err(err) = self.conn.execute_batch("COMMIT") {
            error!("Commit failed: {err}");
            self.rollback();
            return Err(err.into());
        }
        Ok(())
    }

    fn table_sql(&mut self, table: &str) -> Result<String> {
        let sql: Option<String> = self
            .conn
            .query_row(TABLE_SQL_QUERY, [table], |row| row.get(0))
            .optional()?;
        sql.ok_or_else(|| {
            let msg = format!("Schema validation query for table {table} found no table");
            error!("{msg}");
            Error::Backend(msg)
        })
    }
}

fn run_query(conn: &Connection, sql: &str) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let width = columns.len();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|idx| row.get_ref(idx).map(from_value_ref))
                .collect::<rusqlite::Result<Row>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(QueryResult { columns, rows })
}

fn execute_rows(conn: &Connection, sql: &str, rows: &[Row]) -> rusqlite::Result<usize> {
    let mut stmt = conn.prepare(sql)?;
    let mut affected = 0usize;
    for row in rows {
        affected += stmt.execute(params_from_iter(row.iter()))?;
    }
    Ok(affected)
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}
