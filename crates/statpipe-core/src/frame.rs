//! In-memory tabular data
//!
//! A [`Frame`] is a list of named columns and rows of [`Cell`]s. It carries just
//! enough behavior for the transforms and merges the pipeline performs:
//! column selection and renaming, value replacement, stable multi-key sorting,
//! de-duplication and concatenation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{EtlError, Result};

/// A single value in a [`Frame`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// Hashable identity of a cell, used for joins and de-duplication
///
/// Integral floats collapse onto the matching integer so that `2019` read from a
/// CSV file and `2019.0` read from a spreadsheet join together.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CellKey {
    Empty,
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(String),
}

impl Cell {
    /// Infer a typed cell from raw text (integer, then float, then boolean, then text)
    pub fn infer(raw: &str) -> Cell {
        let value = raw.trim();
        if value.is_empty() {
            return Cell::Empty;
        }
        if let Ok(int) = value.parse::<i64>() {
            return Cell::Int(int);
        }
        if let Ok(float) = value.parse::<f64>() {
            if float.is_finite() {
                return Cell::Float(float);
            }
        }
        match value {
            "true" | "True" | "TRUE" => Cell::Bool(true),
            "false" | "False" | "FALSE" => Cell::Bool(false),
            _ => Cell::Text(raw.to_string()),
        }
    }

    pub fn text(value: impl Into<String>) -> Cell {
        Cell::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(value) => Some(*value as f64),
            Cell::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn key(&self) -> CellKey {
        match self {
            Cell::Empty => CellKey::Empty,
            Cell::Int(value) => CellKey::Int(*value),
            Cell::Float(value) => {
                if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                    CellKey::Int(*value as i64)
                } else {
                    CellKey::Float(value.to_bits())
                }
            },
            Cell::Bool(value) => CellKey::Bool(*value),
            Cell::Text(value) => CellKey::Text(value.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Int(_) | Cell::Float(_) => 0,
            Cell::Text(_) => 1,
            Cell::Bool(_) => 2,
            Cell::Empty => 3,
        }
    }

    /// Total order used for sorting: numbers, then text, then booleans, empty cells last
    pub fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Bool(a), Cell::Bool(b)) => a.cmp(b),
            (Cell::Int(a), Cell::Int(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(value) => write!(f, "{}", value),
            Cell::Float(value) => write!(f, "{}", value),
            Cell::Bool(value) => write!(f, "{}", value),
            Cell::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Int(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Int(i64::from(value))
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Float(value)
    }
}

/// Rows of cells under named columns
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a frame, checking every row against the column count
    pub fn from_rows<I, S>(columns: I, rows: Vec<Vec<Cell>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut frame = Frame::new(columns);
        for row in rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::format(format!(
                "row has {} cells but the frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Index of a column that has to exist, `context` names the operation for the error
    pub fn require_column(&self, name: &str, context: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EtlError::missing_column(name, context))
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|cells| &cells[index])
    }

    /// New frame with only the named columns, in the given order
    pub fn select(&self, names: &[&str]) -> Result<Frame> {
        let indices = names
            .iter()
            .map(|name| self.require_column(name, "select"))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.project(&indices))
    }

    /// New frame with the columns accepted by `keep`, in their current order
    pub fn select_where(&self, keep: impl Fn(&str) -> bool) -> Frame {
        let indices: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| keep(name))
            .map(|(index, _)| index)
            .collect();
        self.project(&indices)
    }

    fn project(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: indices.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Rename columns through `mapper`; `None` keeps the current name
    pub fn rename_with(&mut self, mapper: impl Fn(&str) -> Option<String>) {
        for column in &mut self.columns {
            if let Some(renamed) = mapper(column) {
                *column = renamed;
            }
        }
    }

    /// Rename columns from `(old, new)` pairs; absent columns are ignored
    pub fn rename(&mut self, pairs: &[(&str, &str)]) {
        self.rename_with(|name| {
            pairs
                .iter()
                .find(|(old, _)| *old == name)
                .map(|(_, new)| new.to_string())
        });
    }

    /// Apply `f` to every cell of a column
    pub fn map_column(&mut self, name: &str, f: impl Fn(&Cell) -> Cell) -> Result<()> {
        let index = self.require_column(name, "map_column")?;
        for row in &mut self.rows {
            row[index] = f(&row[index]);
        }
        Ok(())
    }

    /// Replace exact text values in a column from `(from, to)` pairs
    pub fn replace_values(&mut self, name: &str, pairs: &[(&str, &str)]) -> Result<()> {
        self.map_column(name, |cell| match cell.as_str() {
            Some(value) => pairs
                .iter()
                .find(|(from, _)| *from == value)
                .map(|(_, to)| Cell::text(*to))
                .unwrap_or_else(|| cell.clone()),
            None => cell.clone(),
        })
    }

    /// Stable ascending sort on the given key columns
    pub fn sort_by(&mut self, keys: &[&str]) -> Result<()> {
        let indices = keys
            .iter()
            .map(|key| self.require_column(key, "sort"))
            .collect::<Result<Vec<_>>>()?;

        self.rows.sort_by(|a, b| {
            indices
                .iter()
                .map(|&i| a[i].sort_cmp(&b[i]))
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(())
    }

    /// Drop repeated rows, keeping the first occurrence
    pub fn dedup(&mut self) {
        let mut seen = HashSet::new();
        self.rows
            .retain(|row| seen.insert(row.iter().map(Cell::key).collect::<Vec<_>>()));
    }

    /// Stack frames vertically; the result has the union of all columns
    ///
    /// Columns keep first-seen order and cells a frame does not have are empty.
    pub fn concat(frames: Vec<Frame>) -> Frame {
        let mut columns: Vec<String> = Vec::new();
        for frame in &frames {
            for column in &frame.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::with_capacity(frames.iter().map(Frame::height).sum());
        for frame in frames {
            let positions: Vec<Option<usize>> =
                columns.iter().map(|column| frame.column_index(column)).collect();
            for row in frame.rows {
                rows.push(
                    positions
                        .iter()
                        .map(|position| position.map(|i| row[i].clone()).unwrap_or_default())
                        .collect(),
                );
            }
        }

        Frame { columns, rows }
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.columns, self.rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_rows(
            ["name", "year", "score"],
            vec![
                vec!["Chad".into(), 2020.into(), 1.5.into()],
                vec!["Angola".into(), 2021.into(), Cell::Empty],
                vec!["Angola".into(), 2019.into(), 3.0.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_infer_cells() {
        assert_eq!(Cell::infer(""), Cell::Empty);
        assert_eq!(Cell::infer(" 42 "), Cell::Int(42));
        assert_eq!(Cell::infer("2.5"), Cell::Float(2.5));
        assert_eq!(Cell::infer("True"), Cell::Bool(true));
        assert_eq!(Cell::infer("Cote d'Ivoire"), Cell::text("Cote d'Ivoire"));
        assert_eq!(Cell::infer("NaN"), Cell::text("NaN"));
    }

    #[test]
    fn test_integral_float_keys_match_ints() {
        assert_eq!(Cell::Float(2019.0).key(), Cell::Int(2019).key());
        assert_ne!(Cell::Float(2019.5).key(), Cell::Int(2019).key());
        assert_ne!(Cell::text("2019").key(), Cell::Int(2019).key());
    }

    #[test]
    fn test_push_row_rejects_wrong_width() {
        let mut frame = Frame::new(["a", "b"]);
        assert!(frame.push_row(vec![Cell::Int(1)]).is_err());
        assert!(frame.push_row(vec![Cell::Int(1), Cell::Int(2)]).is_ok());
    }

    #[test]
    fn test_select_and_missing_column() {
        let frame = sample();
        let selected = frame.select(&["year", "name"]).unwrap();
        assert_eq!(selected.columns(), &["year", "name"]);
        assert_eq!(selected.cell(0, "name"), Some(&Cell::text("Chad")));

        let err = frame.select(&["population"]).unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { .. }));
    }

    #[test]
    fn test_select_where_keeps_order() {
        let frame = sample().select_where(|name| name != "year");
        assert_eq!(frame.columns(), &["name", "score"]);
    }

    #[test]
    fn test_rename_and_replace() {
        let mut frame = sample();
        frame.rename(&[("name", "Country Name"), ("absent", "ignored")]);
        frame
            .replace_values("Country Name", &[("Chad", "Republic of Chad")])
            .unwrap();
        assert_eq!(frame.columns()[0], "Country Name");
        assert_eq!(frame.cell(0, "Country Name"), Some(&Cell::text("Republic of Chad")));
    }

    #[test]
    fn test_sort_by_is_multi_key() {
        let mut frame = sample();
        frame.sort_by(&["name", "year"]).unwrap();
        let years: Vec<_> = frame.column("year").unwrap().into_iter().cloned().collect();
        assert_eq!(years, vec![Cell::Int(2019), Cell::Int(2021), Cell::Int(2020)]);
    }

    #[test]
    fn test_sort_places_empty_last() {
        let mut frame = sample();
        frame.sort_by(&["score"]).unwrap();
        assert_eq!(frame.cell(2, "score"), Some(&Cell::Empty));
        assert_eq!(frame.cell(0, "score"), Some(&Cell::Float(1.5)));
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut frame = sample();
        let first = frame.rows()[0].clone();
        frame.push_row(first).unwrap();
        assert_eq!(frame.height(), 4);
        frame.dedup();
        assert_eq!(frame.height(), 3);
    }

    #[test]
    fn test_concat_unions_columns() {
        let a = Frame::from_rows(["name", "year"], vec![vec!["Chad".into(), 2020.into()]]).unwrap();
        let b = Frame::from_rows(["name", "inci"], vec![vec!["Mali".into(), 4.into()]]).unwrap();
        let combined = Frame::concat(vec![a, b]);
        assert_eq!(combined.columns(), &["name", "year", "inci"]);
        assert_eq!(combined.height(), 2);
        assert_eq!(combined.cell(0, "inci"), Some(&Cell::Empty));
        assert_eq!(combined.cell(1, "year"), Some(&Cell::Empty));
    }

    #[test]
    fn test_concat_of_nothing_is_empty() {
        let combined = Frame::concat(Vec::new());
        assert_eq!(combined.width(), 0);
        assert!(combined.is_empty());
    }
}
