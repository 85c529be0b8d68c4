mod common;

use datautils::{
    CoreResult, Error,
    db::{QueryResult, SqlBackend, query_frame},
    frame::Row,
    insert::{insert, validate_and_cast},
    schema::parse_schema,
    sqlite::SqliteBackend,
    value::{SqlType, Value, cast},
};
use proptest::prelude::*;

use common::TestWorkspace;

/// Backend that records calls and serves a fixed creation statement.
#[derive(Default)]
struct RecordingBackend {
    create_sql: String,
    fail_batch: bool,
    schema_lookups: usize,
    batches: Vec<(String, Vec<Row>)>,
    commits: usize,
}

impl RecordingBackend {
    fn with_table(create_sql: &str) -> Self {
        Self {
            create_sql: create_sql.to_string(),
            ..Self::default()
        }
    }
}

impl SqlBackend for RecordingBackend {
    fn query(&mut self, _sql: &str) -> CoreResult<QueryResult> {
        Ok(QueryResult::default())
    }

    fn execute(&mut self, _sql: &str) -> CoreResult<usize> {
        Ok(0)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Row]) -> CoreResult<usize> {
        if self.fail_batch {
            return Err(Error::Backend("constraint violated".to_string()));
        }
        self.batches.push((sql.to_string(), rows.to_vec()));
        Ok(rows.len())
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.commits += 1;
        Ok(())
    }

    fn table_sql(&mut self, _table: &str) -> CoreResult<String> {
        self.schema_lookups += 1;
        Ok(self.create_sql.clone())
    }
}

const PEOPLE: &str = "CREATE TABLE people(id INTEGER PRIMARY KEY, name TEXT, age INTEGER)";

#[test]
fn width_mismatch_touches_nothing_after_schema_lookup() {
    let mut backend = RecordingBackend::with_table(PEOPLE);
    let rows = vec![vec![Value::from("ann"), Value::from("31"), Value::from("extra")]];
    let err = insert(&mut backend, "people", rows, true).unwrap_err();
    assert!(matches!(err, Error::Shape(_)));
    assert_eq!(
        err.to_string(),
        "Insertion validation error: table has 2 cols vs input 3 cols"
    );
    assert!(backend.batches.is_empty());
    assert_eq!(backend.commits, 0);
}

#[test]
fn cast_failure_aborts_the_whole_batch() {
    let mut backend = RecordingBackend::with_table(PEOPLE);
    let rows = vec![
        vec![Value::from("ann"), Value::from("31")],
        vec![Value::from("bob"), Value::from("31.5")],
    ];
    let err = insert(&mut backend, "people", rows, true).unwrap_err();
    assert!(matches!(err, Error::Cast(msg) if msg.contains("row 1")));
    assert!(backend.batches.is_empty());
    assert_eq!(backend.commits, 0);
}

#[test]
fn successful_insert_runs_one_batch_then_commits() {
    let mut backend = RecordingBackend::with_table(PEOPLE);
    let rows = vec![
        vec![Value::from("ann"), Value::from("31")],
        vec![Value::from("bob"), Value::Null],
    ];
    let count = insert(&mut backend, "people", rows, true).unwrap();
    assert_eq!(count, 2);
    assert_eq!(backend.commits, 1);
    assert_eq!(backend.batches.len(), 1);
    let (sql, cast_rows) = &backend.batches[0];
    assert_eq!(sql, "INSERT INTO people(name,age) VALUES (?,?)");
    assert_eq!(
        cast_rows,
        &vec![
            vec![Value::from("ann"), Value::Integer(31)],
            vec![Value::from("bob"), Value::Null],
        ]
    );
}

#[test]
fn failed_batch_is_never_committed() {
    let mut backend = RecordingBackend {
        fail_batch: true,
        ..RecordingBackend::with_table(PEOPLE)
    };
    let rows = vec![vec![Value::from("ann"), Value::Integer(31)]];
    assert!(insert(&mut backend, "people", rows, false).is_err());
    assert_eq!(backend.commits, 0);
}

#[test]
fn empty_batch_skips_the_backend() {
    let mut backend = RecordingBackend::with_table(PEOPLE);
    assert_eq!(insert(&mut backend, "people", Vec::new(), true).unwrap(), 0);
    assert_eq!(backend.schema_lookups, 0);
    assert_eq!(backend.commits, 0);
}

#[test]
fn unparseable_schema_stops_the_pipeline() {
    let mut backend = RecordingBackend::with_table("not a create statement");
    let rows = vec![vec![Value::Integer(1)]];
    assert!(matches!(
        insert(&mut backend, "people", rows, true),
        Err(Error::Parse(_))
    ));
    assert!(backend.batches.is_empty());
}

#[test]
fn validate_and_cast_converts_by_position() {
    let schema = parse_schema("CREATE TABLE m(a INTEGER, b REAL, c TEXT)").unwrap();
    let rows = vec![vec![Value::from("7"), Value::Integer(2), Value::Real(0.5)]];
    assert_eq!(
        validate_and_cast(&schema, rows, true).unwrap(),
        vec![vec![Value::Integer(7), Value::Real(2.0), Value::from("0.5")]]
    );
}

#[test]
fn float_text_is_not_an_integer() {
    for input in ["1.0", "2.5", "1e3"] {
        assert!(cast(SqlType::Integer, &Value::from(input)).is_err(), "{input}");
    }
    assert!(cast(SqlType::Integer, &Value::Real(3.0)).is_err());
}

proptest! {
    #[test]
    fn integer_text_round_trips(n in any::<i64>()) {
        prop_assert_eq!(cast(SqlType::Integer, &Value::from(n.to_string())).unwrap(), Value::Integer(n));
    }

    #[test]
    fn real_text_round_trips(x in -1.0e12f64..1.0e12) {
        let rendered = Value::Real(x).as_display();
        prop_assert_eq!(cast(SqlType::Real, &Value::from(rendered)).unwrap(), Value::Real(x));
    }

    #[test]
    fn text_cast_keeps_text(s in ".*") {
        prop_assert_eq!(cast(SqlType::Text, &Value::from(s.clone())).unwrap(), Value::Text(s));
    }
}

#[test]
fn sqlite_insert_is_visible_after_commit() {
    let workspace = TestWorkspace::new();
    let path = workspace.database(
        "people.sqlite",
        &["CREATE TABLE people(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, score REAL)"],
    );

    let mut backend = SqliteBackend::open(&path).unwrap();
    let rows = vec![
        vec![Value::from("ann"), Value::from("1.5")],
        vec![Value::from("bob"), Value::from("2")],
    ];
    assert_eq!(insert(&mut backend, "people", rows, true).unwrap(), 2);
    drop(backend);

    let mut reopened = SqliteBackend::open(&path).unwrap();
    let frame = query_frame(&mut reopened, "SELECT id, name, score FROM people ORDER BY id").unwrap();
    assert_eq!(
        frame.rows(),
        [
            vec![Value::Integer(1), Value::from("ann"), Value::Real(1.5)],
            vec![Value::Integer(2), Value::from("bob"), Value::Real(2.0)],
        ]
    );
}

#[test]
fn rejected_commit_is_not_carried_into_the_next_insert() {
    let mut backend = SqliteBackend::open_in_memory().unwrap();
    backend
        .connection()
        .execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE parent(id INTEGER PRIMARY KEY);
             CREATE TABLE child(name TEXT, parent_id INTEGER \
                 REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED);",
        )
        .unwrap();

    let orphan = vec![vec![Value::from("orphan"), Value::Integer(99)]];
    assert!(matches!(
        insert(&mut backend, "child", orphan, true),
        Err(Error::Backend(_))
    ));
    assert!(backend.connection().is_autocommit());

    backend.execute("INSERT INTO parent(id) VALUES (1)").unwrap();
    let kid = vec![vec![Value::from("kid"), Value::Integer(1)]];
    assert_eq!(insert(&mut backend, "child", kid, true).unwrap(), 1);

    let frame = query_frame(&mut backend, "SELECT name FROM child ORDER BY name").unwrap();
    assert_eq!(frame.rows(), [vec![Value::from("kid")]]);
}

#[test]
fn sqlite_constraint_violation_leaves_table_empty() {
    let mut backend = SqliteBackend::open_in_memory().unwrap();
    backend
        .execute("CREATE TABLE tags(label TEXT UNIQUE, weight INTEGER)")
        .unwrap();
    let rows = vec![
        vec![Value::from("x"), Value::Integer(1)],
        vec![Value::from("x"), Value::Integer(2)],
    ];
    assert!(matches!(
        insert(&mut backend, "tags", rows, true),
        Err(Error::Backend(_))
    ));
    let frame = query_frame(&mut backend, "SELECT COUNT(*) AS n FROM tags").unwrap();
    assert_eq!(frame.rows()[0], vec![Value::Integer(0)]);
}
