//! Human and machine renderings of frames and diff results.

use std::{borrow::Cow, fmt::Write as _};

use anyhow::Result;

use crate::{
    diff::{DiffResult, Modification},
    frame::Frame,
    value::Value,
};

const COLUMN_GAP: &str = "  ";

/// Renders `frame` as an aligned text table: header, dashed rule, rows.
/// Numeric cells are right-aligned, everything else left-aligned.
pub fn render_frame(frame: &Frame) -> String {
    let cells = frame
        .rows()
        .iter()
        .map(|row| row.iter().map(|v| sanitize(v.as_display())).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let mut widths = frame
        .columns()
        .iter()
        .map(|c| c.chars().count().max(1))
        .collect::<Vec<_>>();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let numeric = (0..frame.width())
        .map(|idx| {
            frame
                .rows()
                .iter()
                .all(|row| matches!(row[idx], Value::Integer(_) | Value::Real(_) | Value::Null))
                && !frame.is_empty()
        })
        .collect::<Vec<_>>();

    let mut out = String::new();
    push_line(&mut out, frame.columns().iter().map(String::as_str), &widths, &numeric);
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    push_line(&mut out, rule.iter().map(String::as_str), &widths, &numeric);
    for row in &cells {
        push_line(&mut out, row.iter().map(String::as_str), &widths, &numeric);
    }
    out
}

fn push_line<'a>(
    out: &mut String,
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
    right_align: &[bool],
) {
    let line = cells
        .zip(widths.iter().zip(right_align))
        .map(|(cell, (&width, &right))| {
            if right {
                format!("{cell:>width$}")
            } else {
                format!("{cell:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    let _ = writeln!(out, "{}", line.trim_end());
}

fn sanitize(text: String) -> String {
    if text.contains(['\n', '\r', '\t']) {
        text.replace(['\n', '\r', '\t'], " ")
    } else {
        text
    }
}

fn describe_modification(modification: &Modification) -> String {
    let key: Cow<'_, str> = match modification.key.as_slice() {
        [single] => Cow::Borrowed(single),
        many => Cow::Owned(format!("({})", many.join(", "))),
    };
    let changes = modification
        .deltas
        .iter()
        .map(|d| format!("{}: {} -> {}", d.column, d.old, d.new))
        .collect::<Vec<_>>()
        .join("; ");
    format!("{key}  {changes}")
}

/// Text report with one section per diff category.
pub fn render_diff(result: &DiffResult) -> String {
    if result.is_empty() {
        return "No differences\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "Adds ({})", result.adds.len());
    if !result.adds.is_empty() {
        out.push_str(&render_frame(&result.adds));
    }
    let _ = writeln!(out, "\nMods ({})", result.mods.len());
    for modification in &result.mods {
        let _ = writeln!(out, "{}", describe_modification(modification));
    }
    let _ = writeln!(out, "\nRetires ({})", result.retires.len());
    if !result.retires.is_empty() {
        out.push_str(&render_frame(&result.retires));
    }
    out
}

pub fn diff_to_json(result: &DiffResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

/// Array of objects keyed by column name.
pub fn frame_to_json(frame: &Frame) -> Result<String> {
    let records = frame
        .rows()
        .iter()
        .map(|row| {
            frame
                .columns()
                .iter()
                .cloned()
                .zip(row.iter().map(serde_json::to_value))
                .map(|(column, value)| value.map(|v| (column, v)))
                .collect::<serde_json::Result<serde_json::Map<_, _>>>()
        })
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(serde_json::to_string_pretty(&records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Delta;

    fn frame() -> Frame {
        Frame::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Value::Integer(7), Value::from("ann")],
                vec![Value::Integer(12), Value::from("line\nbreak")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn render_frame_right_aligns_numbers() {
        let rendered = render_frame(&frame());
        assert_eq!(
            rendered,
            "id  name\n--  ----------\n 7  ann\n12  line break\n"
        );
    }

    #[test]
    fn render_diff_lists_modifications_by_key() {
        let result = DiffResult {
            adds: Frame::empty(vec!["id".into()]),
            mods: vec![Modification {
                key: vec!["a".into(), "1".into()],
                deltas: vec![Delta::new("col2", "x", "z")],
            }],
            retires: Frame::empty(vec!["id".into()]),
        };
        let rendered = render_diff(&result);
        assert!(rendered.contains("Mods (1)\n(a, 1)  col2: x -> z\n"));
        assert!(rendered.starts_with("Adds (0)\n"));
    }

    #[test]
    fn frame_json_uses_column_names() {
        let json = frame_to_json(&frame()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["id"], 7);
        assert_eq!(parsed[1]["name"], "line\nbreak");
    }
}
