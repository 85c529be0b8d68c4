//! Keyed reconciliation of two snapshots of the same table.
//!
//! [`diff`] partitions rows by their key tuple into additions (new only),
//! retirements (old only) and matched pairs; matched pairs that differ in a
//! compared column become [`Modification`]s. Key tuples compare by exact
//! value equality, so `1`, `1.0` and `"1"` are three different keys.

use std::{borrow::Cow, collections::HashSet};

use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;

use crate::{
    error::{Error, Result},
    frame::{DimCheck, Frame, KeyTuple, Row, compare_dims},
    value::Value,
};

/// One changed column of a matched row pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Delta {
    pub column: String,
    pub old: String,
    pub new: String,
}

impl Delta {
    pub fn new(column: impl Into<String>, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

/// All changed columns of one matched row, identified by its key rendered as strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modification {
    pub key: Vec<String>,
    pub deltas: Vec<Delta>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffResult {
    pub adds: Frame,
    pub mods: Vec<Modification>,
    pub retires: Frame,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.mods.is_empty() && self.retires.is_empty()
    }
}

/// Key tuples present in both frames, only the left, and only the right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPartition {
    pub both: HashSet<KeyTuple>,
    pub left_only: HashSet<KeyTuple>,
    pub right_only: HashSet<KeyTuple>,
}

/// Rows of each frame split by the [`KeyPartition`], in their original order.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricSplit {
    pub left_both: Frame,
    pub right_both: Frame,
    pub left_only: Frame,
    pub right_only: Frame,
}

pub fn symm_diff_keys<S: AsRef<str>>(left: &Frame, right: &Frame, keys: &[S]) -> Result<KeyPartition> {
    let left_keys = left.key_set(keys)?;
    let right_keys = right.key_set(keys)?;
    Ok(KeyPartition {
        both: left_keys.intersection(&right_keys).cloned().collect(),
        left_only: left_keys.difference(&right_keys).cloned().collect(),
        right_only: right_keys.difference(&left_keys).cloned().collect(),
    })
}

pub fn symm_diff_frames<S: AsRef<str>>(
    left: &Frame,
    right: &Frame,
    keys: &[S],
) -> Result<SymmetricSplit> {
    let partition = symm_diff_keys(left, right, keys)?;
    let left_idx = left.column_indices(keys)?;
    let right_idx = right.column_indices(keys)?;
    Ok(SymmetricSplit {
        left_both: left.select_rows(|row| key_in(&partition.both, row, &left_idx)),
        right_both: right.select_rows(|row| key_in(&partition.both, row, &right_idx)),
        left_only: left.select_rows(|row| key_in(&partition.left_only, row, &left_idx)),
        right_only: right.select_rows(|row| key_in(&partition.right_only, row, &right_idx)),
    })
}

fn key_in(set: &HashSet<KeyTuple>, row: &[Value], key_idx: &[usize]) -> bool {
    set.contains(&Frame::project(row, key_idx))
}

/// Column-level changes between two frames holding the same set of keys.
///
/// Both frames must have the same dimensions and unique keys. Rows are paired
/// after sorting each side by key; pairs without a differing compared column
/// are omitted. Results are ordered by key.
pub fn find_mods<S: AsRef<str>>(
    old: &Frame,
    new: &Frame,
    keys: &[S],
    ignore: &[S],
) -> Result<Vec<Modification>> {
    let aligned = align_columns(old, new)?;
    let new: &Frame = &aligned;
    let key_idx = old.column_indices(keys)?;
    let ignore_idx = old.column_indices(ignore)?;
    ensure_unique_keys(old, &key_idx, "old")?;
    ensure_unique_keys(new, &key_idx, "new")?;
    compare_dims(old, new, DimCheck::Both)?;

    let diff_cols = (0..old.width())
        .filter(|idx| !key_idx.contains(idx) && !ignore_idx.contains(idx))
        .collect::<Vec<_>>();
    let old_sorted = sorted_by_key(old, &key_idx);
    let new_sorted = sorted_by_key(new, &key_idx);

    let mut mods = Vec::new();
    for (old_row, new_row) in old_sorted.into_iter().zip(new_sorted) {
        let deltas = diff_cols
            .iter()
            .filter(|idx| old_row[**idx] != new_row[**idx])
            .map(|idx| {
                Delta::new(
                    old.columns()[*idx].as_str(),
                    old_row[*idx].as_display(),
                    new_row[*idx].as_display(),
                )
            })
            .collect::<Vec<_>>();
        if deltas.is_empty() {
            continue;
        }
        let key = key_idx
            .iter()
            .map(|idx| old_row[*idx].as_display())
            .collect();
        mods.push(Modification { key, deltas });
    }
    debug!("find_mods: {} modified row(s) of {}", mods.len(), old.len());
    Ok(mods)
}

fn sorted_by_key<'a>(frame: &'a Frame, key_idx: &[usize]) -> Vec<&'a Row> {
    frame
        .rows()
        .iter()
        .sorted_by_cached_key(|row| Frame::project(row, key_idx))
        .collect()
}

/// Differences from `old` to `new` relative to `keys`, skipping `ignore` columns.
///
/// Fails before doing any work when the frames disagree on column count or
/// column names; `new` may list its columns in a different order.
pub fn diff<S: AsRef<str>>(old: &Frame, new: &Frame, keys: &[S], ignore: &[S]) -> Result<DiffResult> {
    compare_dims(old, new, DimCheck::Columns)?;
    if keys.is_empty() {
        return Err(Error::Shape("At least one key column is required".to_string()));
    }
    let aligned = align_columns(old, new)?;
    old.column_indices(ignore)?;

    let split = symm_diff_frames(old, &aligned, keys)?;
    let mods = find_mods(&split.left_both, &split.right_both, keys, ignore)?;
    info!(
        "Diff complete: {} addition(s), {} modification(s), {} retirement(s)",
        split.right_only.len(),
        mods.len(),
        split.left_only.len()
    );
    Ok(DiffResult {
        adds: split.right_only,
        mods,
        retires: split.left_only,
    })
}

/// Returns `right` with its columns in `left`'s order.
fn align_columns<'a>(left: &Frame, right: &'a Frame) -> Result<Cow<'a, Frame>> {
    if left.columns() == right.columns() {
        return Ok(Cow::Borrowed(right));
    }
    compare_dims(left, right, DimCheck::Columns)?;
    let order = right.column_indices(left.columns()).map_err(|_| {
        Error::Shape(format!(
            "Column names mismatch: [{}] vs [{}]",
            left.columns().join(", "),
            right.columns().join(", ")
        ))
    })?;
    let rows = right
        .rows()
        .iter()
        .map(|row| Frame::project(row, &order))
        .collect();
    Ok(Cow::Owned(Frame::new(left.columns().to_vec(), rows)?))
}

fn ensure_unique_keys(frame: &Frame, key_idx: &[usize], side: &'static str) -> Result<()> {
    let mut seen = HashSet::with_capacity(frame.len());
    for row in frame.rows() {
        let key = Frame::project(row, key_idx);
        if !seen.insert(key.clone()) {
            return Err(Error::DuplicateKey {
                side,
                key: key.iter().map(Value::as_display).collect(),
            });
        }
    }
    Ok(())
}
