//! CSV input and output for the command layer.
//!
//! Snapshots enter the toolkit as delimited text and leave it as delimited
//! text, a rendered table, or JSON. This module owns the delimited half:
//!
//! - delimiter resolution (`.tsv` → tab, anything else → comma, unless overridden),
//! - input decoding through `encoding_rs` (UTF-8 unless a label is given),
//! - `-` as the path for standard input or output.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::{frame::Frame, value::Value};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// How a CSV source should be read into a [`Frame`].
#[derive(Debug, Clone, Copy)]
pub struct CsvInput {
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub infer_types: bool,
}

impl Default for CsvInput {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
            infer_types: true,
        }
    }
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn resolve_delimiter(path: Option<&Path>, provided: Option<u8>) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        return Ok(Box::new(std::io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(Box::new(BufReader::new(file)))
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| {
            let (text, _, had_errors) = encoding.decode(field);
            if had_errors {
                Err(anyhow!(
                    "Failed to decode text with encoding {}",
                    encoding.name()
                ))
            } else {
                Ok(text.into_owned())
            }
        })
        .collect()
}

/// Reads a headed CSV stream into a [`Frame`].
pub fn read_frame_from<R: Read>(reader: R, options: CsvInput, delimiter: u8) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);
    let headers = decode_record(reader.byte_headers()?, options.encoding)?;
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading record {}", idx + 1))?;
        rows.push(decode_record(&record, options.encoding)?);
    }
    debug!("Read {} record(s) with {} column(s)", rows.len(), headers.len());
    Ok(Frame::from_text_rows(headers, rows, options.infer_types)?)
}

/// Reads the CSV file at `path` (or standard input for `-`) into a [`Frame`].
pub fn read_frame(path: &Path, options: CsvInput) -> Result<Frame> {
    let delimiter = resolve_delimiter(Some(path), options.delimiter);
    let source = open_source(path)?;
    read_frame_from(source, options, delimiter).with_context(|| format!("Loading {path:?}"))
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let sink: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .from_writer(sink))
}

/// Writes `frame` with a header row. Nulls become empty fields.
pub fn write_frame<W: Write>(writer: &mut csv::Writer<W>, frame: &Frame) -> Result<()> {
    writer.write_record(frame.columns())?;
    for row in frame.rows() {
        writer.write_record(row.iter().map(Value::as_display))?;
    }
    writer.flush()?;
    Ok(())
}
