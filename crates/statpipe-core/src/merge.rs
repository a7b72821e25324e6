//! Key-based merges and concatenation for loaders
//!
//! Loaders combine many per-file frames into one table. Every helper here is
//! meant to be followed by [`sort_by_key`] so the output does not depend on the
//! order the input files were listed in.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::frame::{Cell, CellKey, Frame};

/// Columns that identify one observation across datasets
pub const NATURAL_KEY: [&str; 2] = ["Country Name", "year"];

/// Suffixes appended to overlapping non-key columns (left, right)
pub const SUFFIXES: (&str, &str) = ("_x", "_y");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Every left row, matched right rows where available
    Left,
    /// Every row from both sides
    Outer,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinKind::Left => f.write_str("left"),
            JoinKind::Outer => f.write_str("outer"),
        }
    }
}

fn row_key(row: &[Cell], indices: &[usize]) -> Vec<CellKey> {
    indices.iter().map(|&i| row[i].key()).collect()
}

/// Join two frames on the `on` columns
///
/// Output columns are the left columns followed by the right non-key columns.
/// Non-key columns present on both sides get [`SUFFIXES`]. A key column missing on
/// either side is a format error.
pub fn merge(left: &Frame, right: &Frame, on: &[&str], how: JoinKind) -> Result<Frame> {
    let left_keys = on
        .iter()
        .map(|key| left.require_column(key, "left side of merge"))
        .collect::<Result<Vec<_>>>()?;
    let right_keys = on
        .iter()
        .map(|key| right.require_column(key, "right side of merge"))
        .collect::<Result<Vec<_>>>()?;

    let right_values: Vec<usize> = (0..right.width())
        .filter(|i| !right_keys.contains(i))
        .collect();

    let mut columns: Vec<String> = Vec::with_capacity(left.width() + right_values.len());
    for (i, name) in left.columns().iter().enumerate() {
        if !left_keys.contains(&i) && right.has_column(name) {
            columns.push(format!("{}{}", name, SUFFIXES.0));
        } else {
            columns.push(name.clone());
        }
    }
    for &i in &right_values {
        let name = &right.columns()[i];
        if left.has_column(name) {
            columns.push(format!("{}{}", name, SUFFIXES.1));
        } else {
            columns.push(name.clone());
        }
    }

    let mut index: HashMap<Vec<CellKey>, Vec<usize>> = HashMap::new();
    for (position, row) in right.rows().iter().enumerate() {
        index.entry(row_key(row, &right_keys)).or_default().push(position);
    }

    let mut matched_right: HashSet<usize> = HashSet::new();
    let mut merged = Frame::new(columns);

    for row in left.rows() {
        match index.get(&row_key(row, &left_keys)) {
            Some(positions) => {
                for &position in positions {
                    matched_right.insert(position);
                    let right_row = &right.rows()[position];
                    let mut combined = row.clone();
                    combined.extend(right_values.iter().map(|&i| right_row[i].clone()));
                    merged.push_row(combined)?;
                }
            },
            None => {
                let mut combined = row.clone();
                combined.extend(right_values.iter().map(|_| Cell::Empty));
                merged.push_row(combined)?;
            },
        }
    }

    if how == JoinKind::Outer {
        for (position, right_row) in right.rows().iter().enumerate() {
            if matched_right.contains(&position) {
                continue;
            }
            let mut combined = vec![Cell::Empty; left.width()];
            for (&l, &r) in left_keys.iter().zip(&right_keys) {
                combined[l] = right_row[r].clone();
            }
            combined.extend(right_values.iter().map(|&i| right_row[i].clone()));
            merged.push_row(combined)?;
        }
    }

    Ok(merged)
}

/// Fold a list of frames into one with repeated [`merge`] calls
///
/// Returns `None` for an empty list.
pub fn merge_all(frames: Vec<Frame>, on: &[&str], how: JoinKind) -> Result<Option<Frame>> {
    let mut frames = frames.into_iter();
    let Some(mut merged) = frames.next() else {
        return Ok(None);
    };
    for frame in frames {
        merged = merge(&merged, &frame, on, how)?;
    }
    Ok(Some(merged))
}

/// Stable sort on [`NATURAL_KEY`]
pub fn sort_by_key(frame: &mut Frame) -> Result<()> {
    frame.sort_by(&NATURAL_KEY)
}

/// Concatenate frames and sort the result on [`NATURAL_KEY`]
pub fn concat_sorted(frames: Vec<Frame>) -> Result<Frame> {
    let mut combined = Frame::concat(frames);
    sort_by_key(&mut combined)?;
    Ok(combined)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::EtlError;

    fn gdp() -> Frame {
        Frame::from_rows(
            ["Country Name", "year", "gdp"],
            vec![
                vec!["Chad".into(), 2020.into(), 10.into()],
                vec!["Mali".into(), 2020.into(), 12.into()],
            ],
        )
        .unwrap()
    }

    fn trade() -> Frame {
        Frame::from_rows(
            ["Country Name", "year", "exports"],
            vec![
                vec!["Chad".into(), 2020.0.into(), 3.into()],
                vec!["Niger".into(), 2020.into(), 5.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_left_merge_keeps_left_rows() {
        let merged = merge(&gdp(), &trade(), &NATURAL_KEY, JoinKind::Left).unwrap();
        assert_eq!(merged.columns(), &["Country Name", "year", "gdp", "exports"]);
        assert_eq!(merged.height(), 2);
        // 2020.0 on the right joins with 2020 on the left
        assert_eq!(merged.cell(0, "exports"), Some(&Cell::Int(3)));
        assert_eq!(merged.cell(1, "exports"), Some(&Cell::Empty));
    }

    #[test]
    fn test_outer_merge_adds_unmatched_right_rows() {
        let mut merged = merge(&gdp(), &trade(), &NATURAL_KEY, JoinKind::Outer).unwrap();
        sort_by_key(&mut merged).unwrap();
        let names: Vec<_> = merged
            .column("Country Name")
            .unwrap()
            .into_iter()
            .map(|cell| cell.to_string())
            .collect();
        assert_eq!(names, vec!["Chad", "Mali", "Niger"]);
        assert_eq!(merged.cell(2, "gdp"), Some(&Cell::Empty));
        assert_eq!(merged.cell(2, "exports"), Some(&Cell::Int(5)));
    }

    #[test]
    fn test_overlapping_columns_get_suffixes() {
        let merged = merge(&gdp(), &gdp(), &NATURAL_KEY, JoinKind::Outer).unwrap();
        assert_eq!(merged.columns(), &["Country Name", "year", "gdp_x", "gdp_y"]);
    }

    #[test]
    fn test_missing_key_is_format_error() {
        let frame = Frame::from_rows(["country", "year"], vec![]).unwrap();
        let err = merge(&gdp(), &frame, &NATURAL_KEY, JoinKind::Left).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { ref column, .. } if column == "Country Name"));
    }

    #[test]
    fn test_self_merge_is_idempotent_on_rows() {
        let mut base = gdp();
        base.dedup();
        let merged = merge(&base, &base, &NATURAL_KEY, JoinKind::Outer).unwrap();
        assert_eq!(merged.height(), base.height());
        let keys = |frame: &Frame| -> Vec<Vec<String>> {
            frame
                .rows()
                .iter()
                .map(|row| row[..2].iter().map(ToString::to_string).collect())
                .collect()
        };
        assert_eq!(keys(&merged), keys(&base));
    }

    #[test]
    fn test_merge_all_empty_is_none() {
        assert!(merge_all(Vec::new(), &NATURAL_KEY, JoinKind::Outer).unwrap().is_none());
        let single = merge_all(vec![gdp()], &NATURAL_KEY, JoinKind::Outer).unwrap().unwrap();
        assert_eq!(single, gdp());
    }

    #[test]
    fn test_concat_sorted_orders_by_natural_key() {
        let combined = concat_sorted(vec![trade(), gdp()]).unwrap();
        let first = combined.cell(0, "Country Name").unwrap().to_string();
        assert_eq!(first, "Chad");
        assert_eq!(combined.height(), 4);
    }
}
