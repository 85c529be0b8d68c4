use std::path::Path;

use anyhow::{Context, Result, bail};
use log::info;

use crate::{
    cli::{CreateArgs, InsertArgs, OutputFormat, QueryArgs, SchemaArgs},
    db, diff_cmd,
    frame::{Frame, Row},
    insert,
    io_utils, report,
    schema::{TableSchema, parse_schema},
    sqlite::SqliteBackend,
    table_def::TableDef,
    value::Value,
};

fn open_existing(path: &Path) -> Result<SqliteBackend> {
    if !path.exists() {
        bail!("Database {path:?} does not exist");
    }
    SqliteBackend::open(path).with_context(|| format!("Opening database {path:?}"))
}

/// Empty CSV fields stand for SQL NULL.
fn blank_to_null(rows: Vec<Row>) -> Vec<Row> {
    rows.into_iter()
        .map(|row| {
            row.into_iter()
                .map(|value| match value {
                    Value::Text(text) if text.is_empty() => Value::Null,
                    other => other,
                })
                .collect()
        })
        .collect()
}

pub fn execute_insert(args: &InsertArgs) -> Result<()> {
    let options = diff_cmd::csv_input(&args.csv, false)?;
    let frame = io_utils::read_frame(&args.input, options)?;
    let rows = blank_to_null(frame.into_rows());
    insert::ensure_uniform_shape(&rows)?;

    let mut backend = open_existing(&args.db)?;
    let inserted = insert::insert(&mut backend, &args.table, rows, !args.no_cast)
        .with_context(|| format!("Inserting {:?} into table {}", args.input, args.table))?;
    info!("Inserted {inserted} row(s) into {}", args.table);
    println!("{inserted}");
    Ok(())
}

pub fn execute_schema(args: &SchemaArgs) -> Result<()> {
    let schema = match (&args.statement, &args.db, &args.table) {
        (Some(statement), _, _) => parse_schema(statement)?,
        (None, Some(path), Some(table)) => {
            let mut backend = open_existing(path)?;
            insert::fetch_schema(&mut backend, table)
                .with_context(|| format!("Reading schema of table {table}"))?
        }
        _ => bail!("Either --statement or --db with --table is required"),
    };
    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&schema)?),
        OutputFormat::Table => print!("{}", report::render_frame(&schema_frame(&schema)?)),
        OutputFormat::Csv => {
            let mut writer = io_utils::open_csv_writer(None, b',')?;
            io_utils::write_frame(&mut writer, &schema_frame(&schema)?)?;
        }
    }
    Ok(())
}

fn schema_frame(schema: &TableSchema) -> Result<Frame> {
    let rows = schema
        .columns
        .iter()
        .map(|c| vec![Value::from(c.name.as_str()), Value::from(c.sql_type.as_str())])
        .collect();
    Ok(Frame::new(vec!["column".into(), "type".into()], rows)?)
}

pub fn execute_create(args: &CreateArgs) -> Result<()> {
    let def = TableDef::load(&args.definition)
        .with_context(|| format!("Loading table definition {:?}", args.definition))?;
    if args.dry_run {
        println!("{}", def.create_statement());
        return Ok(());
    }
    let Some(path) = &args.db else {
        bail!("--db is required unless --dry-run is given");
    };
    let mut backend = SqliteBackend::open(path)
        .with_context(|| format!("Opening database {path:?}"))?;
    db::create_table(&mut backend, &def)
        .with_context(|| format!("Creating table {}", def.name()))?;
    info!("Created table {} in {path:?}", def.name());
    Ok(())
}

pub fn execute_query(args: &QueryArgs) -> Result<()> {
    let mut backend = open_existing(&args.db)?;
    let frame = db::read_only_query(&mut backend, &args.sql)?;
    match args.format {
        OutputFormat::Table => print!("{}", report::render_frame(&frame)),
        OutputFormat::Json => println!("{}", report::frame_to_json(&frame)?),
        OutputFormat::Csv => {
            let mut writer = io_utils::open_csv_writer(None, b',')?;
            io_utils::write_frame(&mut writer, &frame)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_cells_become_null() {
        let rows = vec![vec![Value::from(""), Value::from("x")]];
        assert_eq!(blank_to_null(rows), vec![vec![Value::Null, Value::from("x")]]);
    }
}
