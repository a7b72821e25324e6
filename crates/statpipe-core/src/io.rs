//! Reading and writing tabular files
//!
//! - `.csv` files go through the `csv` crate, cells are type-inferred
//! - `.xlsx`, `.xlsm`, `.xls` and `.ods` are read with `calamine` (first sheet)
//! - output is written as CSV or as an `.xlsx` workbook via `rust_xlsxwriter`

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::Workbook;
use statpipe_common::types::SaveFileType;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{EtlError, Result};
use crate::frame::{Cell, Frame};

const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

/// A named frame read from one file
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    /// Lower-cased file name up to its first `.`
    pub name: String,
    pub frame: Frame,
}

impl DatasetEntry {
    pub fn new(name: impl Into<String>, frame: Frame) -> Self {
        Self {
            name: name.into(),
            frame,
        }
    }
}

/// Logical name of an input file: `GTI_2019.csv` becomes `gti_2019`
pub fn entry_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    file_name
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn is_visible_file(path: &Path) -> bool {
    path.is_file()
        && !path
            .file_name()
            .map(|name| name.to_string_lossy().starts_with('.'))
            .unwrap_or(true)
}

/// Regular, non-hidden files of `dir`, sorted by file name
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EtlError::input_precondition(dir, "directory does not exist"));
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| EtlError::input_precondition(dir, format!("directory is not readable: {}", e)))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            EtlError::input_precondition(dir, format!("directory listing failed: {}", e))
        })?;
        let path = entry.path();
        if is_visible_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Number of files currently in `dir`; a missing directory counts as empty
pub fn count_files(dir: &Path) -> usize {
    list_files(dir).map(|files| files.len()).unwrap_or(0)
}

/// Read every file of `dir` into a [`DatasetEntry`]
///
/// Fails on the first file that cannot be read: units treat their input
/// directory as a whole.
pub fn fetch_all_files(dir: &Path) -> Result<Vec<DatasetEntry>> {
    list_files(dir)?
        .into_iter()
        .map(|path| {
            let frame = read_frame(&path)?;
            Ok(DatasetEntry::new(entry_name(&path), frame))
        })
        .collect()
}

/// Read a tabular file, dispatching on its extension
pub fn read_frame(path: &Path) -> Result<Frame> {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    debug!(path = %path.display(), extension = %extension, "Reading tabular file");

    match extension.as_str() {
        "csv" => read_csv(path),
        ext if SPREADSHEET_EXTENSIONS.contains(&ext) => read_spreadsheet(path),
        _ => Err(EtlError::format(format!(
            "unsupported file extension '{}' for {}",
            extension,
            path.display()
        ))),
    }
}

fn read_csv(path: &Path) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;

    let columns: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|header| String::from_utf8_lossy(header).trim().to_string())
        .collect();
    let width = columns.len();
    let mut frame = Frame::new(columns);

    for record in reader.byte_records() {
        let record = record?;
        let mut row: Vec<Cell> = record
            .iter()
            .take(width)
            .map(|field| Cell::infer(&String::from_utf8_lossy(field)))
            .collect();
        row.resize(width, Cell::Empty);
        frame.push_row(row)?;
    }

    Ok(frame)
}

fn spreadsheet_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(value) => Cell::Int(*value),
        Data::Float(value) => Cell::Float(*value),
        Data::Bool(value) => Cell::Bool(*value),
        Data::String(value) if value.trim().is_empty() => Cell::Empty,
        Data::String(value) => Cell::Text(value.clone()),
        other => Cell::Text(other.to_string()),
    }
}

fn read_spreadsheet(path: &Path) -> Result<Frame> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EtlError::format(format!("{} has no worksheets", path.display())))??;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Frame::default());
    };
    let columns: Vec<String> = header.iter().map(|cell| cell.to_string().trim().to_string()).collect();
    let width = columns.len();
    let mut frame = Frame::new(columns);

    for cells in rows {
        let mut row: Vec<Cell> = cells.iter().take(width).map(spreadsheet_cell).collect();
        row.resize(width, Cell::Empty);
        frame.push_row(row)?;
    }

    Ok(frame)
}

/// Write `frame` to `{dir}/{name}.{ext}` and return the written path
pub fn write_frame(dir: &Path, name: &str, frame: &Frame, file_type: SaveFileType) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.{}", name, file_type.extension()));

    match file_type {
        SaveFileType::Csv => write_csv(&path, frame)?,
        SaveFileType::Excel => write_xlsx(&path, frame)?,
    }

    debug!(path = %path.display(), rows = frame.height(), "Wrote tabular file");
    Ok(path)
}

fn write_csv(path: &Path, frame: &Frame) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(frame.columns())?;
    for row in frame.rows() {
        writer.write_record(row.iter().map(ToString::to_string))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(path: &Path, frame: &Frame) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in frame.columns().iter().enumerate() {
        sheet.write_string(0, column_number(col)?, name)?;
    }

    for (index, row) in frame.rows().iter().enumerate() {
        let row_number = u32::try_from(index + 1)
            .map_err(|_| EtlError::format("frame has too many rows for a worksheet"))?;
        for (col, cell) in row.iter().enumerate() {
            let col = column_number(col)?;
            match cell {
                Cell::Empty => {},
                Cell::Int(value) => {
                    sheet.write_number(row_number, col, *value as f64)?;
                },
                Cell::Float(value) => {
                    sheet.write_number(row_number, col, *value)?;
                },
                Cell::Bool(value) => {
                    sheet.write_boolean(row_number, col, *value)?;
                },
                Cell::Text(value) => {
                    sheet.write_string(row_number, col, value)?;
                },
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn column_number(index: usize) -> Result<u16> {
    u16::try_from(index).map_err(|_| EtlError::format("frame has too many columns for a worksheet"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_rows(
            ["Country Name", "year", "overall", "note"],
            vec![
                vec!["Chad".into(), 2019.into(), 6.5.into(), Cell::Empty],
                vec!["Cote d'Ivoire".into(), 2020.into(), 3.25.into(), "revised".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_entry_name_is_lowercase_stem() {
        assert_eq!(entry_name(Path::new("/tmp/GTI_2019.csv")), "gti_2019");
        assert_eq!(entry_name(Path::new("US.TradeMerchTotal.csv")), "us");
        assert_eq!(entry_name(Path::new("plain")), "plain");
    }

    #[test]
    fn test_csv_round_trip_keeps_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_frame(dir.path(), "sample", &sample(), SaveFileType::Csv).unwrap();
        assert_eq!(path, dir.path().join("sample.csv"));

        let read = read_frame(&path).unwrap();
        assert_eq!(read.columns(), sample().columns());
        assert_eq!(read.height(), 2);
        assert_eq!(read.cell(1, "Country Name"), Some(&Cell::text("Cote d'Ivoire")));
        assert_eq!(read.cell(0, "note"), Some(&Cell::Empty));
    }

    #[test]
    fn test_xlsx_round_trip_keeps_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_frame(dir.path(), "sample", &sample(), SaveFileType::Excel).unwrap();
        assert_eq!(path.extension().unwrap(), "xlsx");

        let read = read_frame(&path).unwrap();
        assert_eq!(read.columns(), sample().columns());
        assert_eq!(read.height(), 2);
        assert_eq!(read.cell(0, "year").unwrap().key(), Cell::Int(2019).key());
    }

    #[test]
    fn test_short_csv_rows_are_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b,c\n1,2\n4,5,6,7\n").unwrap();

        let frame = read_frame(&path).unwrap();
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.cell(0, "c"), Some(&Cell::Empty));
        assert_eq!(frame.cell(1, "c"), Some(&Cell::Int(6)));
    }

    #[test]
    fn test_unknown_extension_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.parquet");
        std::fs::write(&path, b"PAR1").unwrap();
        assert!(matches!(read_frame(&path), Err(EtlError::Format(_))));
    }

    #[test]
    fn test_fetch_all_files_sorted_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("B.csv"), "x\n1\n").unwrap();
        std::fs::write(dir.path().join("a.csv"), "x\n2\n").unwrap();
        std::fs::write(dir.path().join(".hidden.csv"), "x\n3\n").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let entries = fetch_all_files(dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(count_files(dir.path()), 2);
    }

    #[test]
    fn test_missing_directory_is_input_precondition() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        let err = fetch_all_files(&missing).unwrap_err();
        assert!(matches!(err, EtlError::InputPrecondition { .. }));
        assert_eq!(count_files(&missing), 0);
    }
}
