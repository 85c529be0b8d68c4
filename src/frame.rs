//! In-memory tabular snapshot and the row-set helpers built on it.
//!
//! A [`Frame`] is an ordered list of column names plus rows of [`Value`]s,
//! each row exactly as wide as the column list. Frames are never mutated by
//! the diff or insert pipelines; every helper here returns a new frame.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    value::Value,
};

pub type Row = Vec<Value>;
pub type KeyTuple = Vec<Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FrameParts")]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// Unchecked serialized form; deserialization goes through [`Frame::new`].
#[derive(Deserialize)]
struct FrameParts {
    columns: Vec<String>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl TryFrom<FrameParts> for Frame {
    type Error = Error;

    fn try_from(parts: FrameParts) -> Result<Self> {
        Frame::new(parts.columns, parts.rows)
    }
}

impl Frame {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(Error::Shape(format!(
                "Row {idx} has {} value(s) but frame has {} column(s)",
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// A frame with the given columns and no rows.
    pub fn empty(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_indices<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.column_index(name)
                    .ok_or_else(|| Error::UnknownColumn(name.to_string()))
            })
            .collect()
    }

    /// Projected values of `row` at `indices`, in index order.
    pub fn project(row: &[Value], indices: &[usize]) -> KeyTuple {
        indices.iter().map(|idx| row[*idx].clone()).collect()
    }

    /// Distinct key tuples of this frame projected onto `keys`.
    pub fn key_set<S: AsRef<str>>(&self, keys: &[S]) -> Result<HashSet<KeyTuple>> {
        let indices = self.column_indices(keys)?;
        Ok(self
            .rows
            .iter()
            .map(|row| Self::project(row, &indices))
            .collect())
    }

    /// Rows matching `keep`, preserving their original order.
    pub fn select_rows<F>(&self, mut keep: F) -> Frame
    where
        F: FnMut(&[Value]) -> bool,
    {
        Frame {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Rows whose value equals the given value for every `(column, value)` pair.
    pub fn filter_eq(&self, conditions: &[(&str, Value)]) -> Result<Frame> {
        let resolved = conditions
            .iter()
            .map(|(name, value)| {
                self.column_index(name)
                    .map(|idx| (idx, value))
                    .ok_or_else(|| Error::UnknownColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.select_rows(|row| resolved.iter().all(|(idx, value)| row[*idx] == **value)))
    }

    /// Rows whose value is a member of the listed values for every column.
    ///
    /// An empty value list matches nothing.
    pub fn filter_in(&self, conditions: &[(&str, Vec<Value>)]) -> Result<Frame> {
        let resolved = conditions
            .iter()
            .map(|(name, values)| {
                self.column_index(name)
                    .map(|idx| (idx, values.iter().collect::<HashSet<_>>()))
                    .ok_or_else(|| Error::UnknownColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.select_rows(|row| {
            resolved
                .iter()
                .all(|(idx, allowed)| allowed.contains(&row[*idx]))
        }))
    }

    /// Splits rows into `(duplicates, uniques)` by key.
    pub fn split_unique<S: AsRef<str>>(&self, keys: &[S]) -> Result<(Frame, Frame)> {
        let indices = self.column_indices(keys)?;
        let mut counts: HashMap<KeyTuple, usize> = HashMap::new();
        for row in &self.rows {
            *counts.entry(Self::project(row, &indices)).or_insert(0) += 1;
        }
        let is_duplicate = |row: &[Value]| counts[&Self::project(row, &indices)] > 1;
        let duplicates = self.select_rows(is_duplicate);
        let uniques = self.select_rows(|row| !is_duplicate(row));
        debug!(
            "split_unique: {} duplicate row(s), {} unique row(s)",
            duplicates.len(),
            uniques.len()
        );
        Ok((duplicates, uniques))
    }

    /// Builds a frame from a matrix; with `header` the first row names the columns,
    /// otherwise columns are named by position.
    pub fn from_matrix(matrix: Vec<Row>, header: bool) -> Result<Frame> {
        let mut rows = matrix.into_iter();
        if header {
            let columns = rows
                .next()
                .map(|hdr| hdr.iter().map(Value::as_display).collect())
                .unwrap_or_default();
            Frame::new(columns, rows.collect())
        } else {
            let rows: Vec<Row> = rows.collect();
            let width = rows.first().map_or(0, Vec::len);
            let columns = (0..width).map(|idx| idx.to_string()).collect();
            Frame::new(columns, rows)
        }
    }

    pub fn to_matrix(&self, header: bool) -> Vec<Row> {
        let mut matrix = Vec::with_capacity(self.rows.len() + usize::from(header));
        if header {
            matrix.push(self.columns.iter().map(|c| Value::from(c.as_str())).collect());
        }
        matrix.extend(self.rows.iter().cloned());
        matrix
    }

    /// Builds a frame from raw text cells.
    ///
    /// With `infer`, each column becomes Integer when every non-empty cell
    /// parses as one, else Real when every non-empty cell parses as a float,
    /// else Text. Empty cells become `Null` when inferring and empty text otherwise.
    pub fn from_text_rows(
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        infer: bool,
    ) -> Result<Frame> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != headers.len())
        {
            return Err(Error::Shape(format!(
                "Row {idx} has {} cell(s) but {} header(s)",
                row.len(),
                headers.len()
            )));
        }
        if !infer {
            let rows = rows
                .into_iter()
                .map(|row| row.into_iter().map(Value::Text).collect())
                .collect();
            return Frame::new(headers, rows);
        }

        let mut candidates = vec![TypeCandidate::new(); headers.len()];
        for row in &rows {
            for (candidate, cell) in candidates.iter_mut().zip(row) {
                candidate.observe(cell);
            }
        }
        let typed = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&candidates)
                    .map(|(cell, candidate)| candidate.convert(cell))
                    .collect()
            })
            .collect();
        Frame::new(headers, typed)
    }

    /// Collapses all rows into one: `sum` columns are added, `avg` columns are
    /// averaged and every other column keeps its first value.
    ///
    /// Columns listed in `uniq` are expected to hold a single distinct value.
    pub fn merge_rows<S: AsRef<str>>(&self, sum: &[S], avg: &[S], uniq: &[S]) -> Result<Frame> {
        self.column_indices(sum)?;
        self.column_indices(avg)?;
        let uniq_indices = self.column_indices(uniq)?;
        if self.rows.is_empty() {
            return Ok(Frame::empty(self.columns.clone()));
        }
        let is_listed = |list: &[S], name: &str| list.iter().any(|s| s.as_ref() == name);

        let mut merged = Vec::with_capacity(self.columns.len());
        for (idx, name) in self.columns.iter().enumerate() {
            let column = self.rows.iter().map(|row| &row[idx]);
            let value = if is_listed(sum, name) {
                sum_values(name, column)?
            } else if is_listed(avg, name) {
                let numbers = numeric_values(name, column)?;
                if numbers.is_empty() {
                    Value::Null
                } else {
                    Value::Real(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            } else {
                if uniq_indices.contains(&idx) {
                    let distinct = self.rows.iter().map(|row| &row[idx]).collect::<HashSet<_>>();
                    if distinct.len() > 1 {
                        debug!("merge_rows: column '{name}' holds {} distinct values", distinct.len());
                    }
                }
                self.rows[0][idx].clone()
            };
            merged.push(value);
        }
        Frame::new(self.columns.clone(), vec![merged])
    }
}

fn numeric_values<'a, I>(name: &str, values: I) -> Result<Vec<f64>>
where
    I: Iterator<Item = &'a Value>,
{
    let mut numbers = Vec::new();
    for value in values {
        match value {
            Value::Null => {}
            other => numbers.push(other.as_f64().ok_or_else(|| {
                Error::Cast(format!("column '{name}' holds non-numeric value '{other}'"))
            })?),
        }
    }
    Ok(numbers)
}

fn sum_values<'a, I>(name: &str, values: I) -> Result<Value>
where
    I: Iterator<Item = &'a Value> + Clone,
{
    let all_integers = values.clone().all(|v| matches!(v, Value::Integer(_) | Value::Null));
    if all_integers {
        let total = values
            .filter_map(|v| match v {
                Value::Integer(i) => Some(*i),
                _ => None,
            })
            .try_fold(0i64, i64::checked_add)
            .ok_or_else(|| Error::Cast(format!("integer overflow summing column '{name}'")))?;
        return Ok(Value::Integer(total));
    }
    Ok(Value::Real(numeric_values(name, values)?.into_iter().sum()))
}

#[derive(Debug, Clone)]
struct TypeCandidate {
    possible_integer: bool,
    possible_real: bool,
}

impl TypeCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_real: true,
        }
    }

    fn observe(&mut self, cell: &str) {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return;
        }
        if self.possible_integer && trimmed.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_real && parse_numeral(trimmed).is_none() {
            self.possible_real = false;
        }
    }

    fn convert(&self, cell: String) -> Value {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }
        if self.possible_integer
            && let Ok(parsed) = trimmed.parse::<i64>()
        {
            return Value::Integer(parsed);
        }
        if self.possible_real
            && let Some(parsed) = parse_numeral(trimmed)
        {
            return Value::Real(parsed);
        }
        Value::Text(cell)
    }
}

/// Finite decimal or exponent numerals only; `nan`, `inf` and friends stay text.
fn parse_numeral(text: &str) -> Option<f64> {
    if !text
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
    {
        return None;
    }
    text.parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Which dimensions [`compare_dims`] must find equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimCheck {
    None,
    Columns,
    Rows,
    Both,
}

pub fn compare_dims(left: &Frame, right: &Frame, check: DimCheck) -> Result<()> {
    let (cols1, cols2) = (left.width(), right.width());
    let (rows1, rows2) = (left.len(), right.len());
    let ok = match check {
        DimCheck::None => true,
        DimCheck::Columns => cols1 == cols2,
        DimCheck::Rows => rows1 == rows2,
        DimCheck::Both => cols1 == cols2 && rows1 == rows2,
    };
    if ok {
        return Ok(());
    }
    let message = match check {
        DimCheck::Columns => format!("Cols mismatch: {cols1} vs {cols2}"),
        DimCheck::Rows => format!("Rows mismatch: {rows1} vs {rows2}"),
        _ => format!("Matrix mismatch: {rows1} x {cols1} vs {rows2} x {cols2}"),
    };
    Err(Error::Shape(message))
}
