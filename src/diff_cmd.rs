use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{CsvArgs, DiffArgs, DupsArgs, OutputFormat},
    diff::{self, DiffResult},
    frame::Frame,
    io_utils::{self, CsvInput},
    printable_delimiter, report,
    value::Value,
};

pub(crate) fn csv_input(args: &CsvArgs, infer_types: bool) -> Result<CsvInput> {
    Ok(CsvInput {
        delimiter: args.delimiter,
        encoding: io_utils::resolve_encoding(args.input_encoding.as_deref())?,
        infer_types,
    })
}

pub fn execute_diff(args: &DiffArgs) -> Result<()> {
    let options = csv_input(&args.csv, args.typed)?;
    info!(
        "Diffing {:?} against {:?} on key {:?} using delimiter '{}'",
        args.old,
        args.new,
        args.keys,
        printable_delimiter(io_utils::resolve_delimiter(Some(&args.old), args.csv.delimiter))
    );
    let old = io_utils::read_frame(&args.old, options)?;
    let new = io_utils::read_frame(&args.new, options)?;
    let result = diff::diff(&old, &new, &args.keys, &args.ignore)
        .with_context(|| format!("Diffing {:?} against {:?}", args.old, args.new))?;

    match args.format {
        OutputFormat::Table => print!("{}", report::render_diff(&result)),
        OutputFormat::Json => println!("{}", report::diff_to_json(&result)?),
        OutputFormat::Csv => write_change_log(&result, &args.keys)?,
    }
    Ok(())
}

/// One CSV line per change: `change,key,column,old,new`. Added and retired
/// rows carry their key only.
fn write_change_log(result: &DiffResult, keys: &[String]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(None, b',')?;
    writer.write_record(["change", "key", "column", "old", "new"])?;
    for (change, frame) in [("add", &result.adds), ("retire", &result.retires)] {
        let key_idx = frame.column_indices(keys)?;
        for row in frame.rows() {
            let key = render_key(&Frame::project(row, &key_idx));
            writer.write_record([change, key.as_str(), "", "", ""])?;
        }
    }
    for modification in &result.mods {
        let key = modification.key.join("|");
        for delta in &modification.deltas {
            writer.write_record([
                "mod",
                key.as_str(),
                delta.column.as_str(),
                delta.old.as_str(),
                delta.new.as_str(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn render_key(key: &[Value]) -> String {
    key.iter().map(Value::as_display).collect::<Vec<_>>().join("|")
}

pub fn execute_dups(args: &DupsArgs) -> Result<()> {
    let options = csv_input(&args.csv, false)?;
    let frame = io_utils::read_frame(&args.input, options)?;
    let (dups, uniques) = frame
        .split_unique(&args.keys)
        .with_context(|| format!("Checking key {:?} in {:?}", args.keys, args.input))?;
    info!(
        "{} row(s) with unique keys, {} row(s) with duplicated keys",
        uniques.len(),
        dups.len()
    );
    if args.duplicates_only {
        let delimiter = io_utils::resolve_delimiter(Some(&args.input), args.csv.delimiter);
        let mut writer = io_utils::open_csv_writer(None, delimiter)?;
        return io_utils::write_frame(&mut writer, &dups);
    }
    println!("Duplicated ({})", dups.len());
    if !dups.is_empty() {
        print!("{}", report::render_frame(&dups));
    }
    println!("Unique: {}", uniques.len());
    Ok(())
}
