// src/workbook/mod.rs

//! In-memory spreadsheet document shared by every pipeline stage.
//!
//! Workbooks are read with calamine and written back with rust_xlsxwriter.
//! Only cell values survive a round trip, plus the text number format on the
//! columns declared in a [`TextColumnSchema`].

mod header;
mod schema;

pub use header::HeaderIndex;
pub use schema::{TextColumn, TextColumnSchema};

use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};
use time::format_description::well_known::Iso8601;
use time::macros::datetime;
use time::{Duration, PrimitiveDateTime, Time};
use tracing::debug;

use crate::error::PipelineError;

/// Day zero of the 1900 date system as Excel actually counts it.
const EXCEL_EPOCH: PrimitiveDateTime = datetime!(1899-12-30 0:00);

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(PrimitiveDateTime),
}

static EMPTY: CellValue = CellValue::Empty;

impl CellValue {
    /// A text cell; the empty string is an empty cell.
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Text rendering used for header lookups, code comparisons and forced-text
    /// conversion. Integral floats render without a decimal part.
    pub fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Self::DateTime(dt) => format_datetime(*dt),
        }
    }

    fn from_data(data: &Data) -> Self {
        match data {
            Data::Empty => Self::Empty,
            Data::String(s) => Self::text(s.as_str()),
            Data::Int(i) => Self::Int(*i),
            Data::Float(f) => Self::Float(*f),
            Data::Bool(b) => Self::Bool(*b),
            Data::DateTime(dt) if dt.is_duration() => Self::Float(dt.as_f64()),
            Data::DateTime(dt) => from_excel_serial(dt.as_f64())
                .map(Self::DateTime)
                .unwrap_or(Self::Float(dt.as_f64())),
            Data::DateTimeIso(s) => PrimitiveDateTime::parse(s, &Iso8601::DEFAULT)
                .map(Self::DateTime)
                .unwrap_or_else(|_| Self::text(s.as_str())),
            Data::DurationIso(s) => Self::text(s.as_str()),
            Data::Error(e) => Self::text(e.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

pub fn format_date(dt: PrimitiveDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        dt.year(),
        u8::from(dt.month()),
        dt.day()
    )
}

fn format_datetime(dt: PrimitiveDateTime) -> String {
    if dt.time() == Time::MIDNIGHT {
        format_date(dt)
    } else {
        format!(
            "{} {:02}:{:02}:{:02}",
            format_date(dt),
            dt.hour(),
            dt.minute(),
            dt.second()
        )
    }
}

fn from_excel_serial(serial: f64) -> Option<PrimitiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let seconds = (serial * SECONDS_PER_DAY).round() as i64;
    EXCEL_EPOCH.checked_add(Duration::seconds(seconds))
}

fn to_excel_serial(dt: PrimitiveDateTime) -> f64 {
    (dt - EXCEL_EPOCH).as_seconds_f64() / SECONDS_PER_DAY
}

/// One named grid of cells. Rows and columns are 1-based; row 1 holds headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_row(&self) -> usize {
        self.rows.len()
    }

    pub fn max_column(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Row numbers below the header row.
    pub fn data_rows(&self) -> std::ops::RangeInclusive<usize> {
        2..=self.max_row()
    }

    pub fn get(&self, row: usize, col: usize) -> &CellValue {
        if row == 0 || col == 0 {
            return &EMPTY;
        }
        self.rows
            .get(row - 1)
            .and_then(|r| r.get(col - 1))
            .unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, row: usize, col: usize, value: CellValue) {
        if row == 0 || col == 0 {
            return;
        }
        let in_bounds = self.rows.get(row - 1).is_some_and(|r| col <= r.len());
        if !in_bounds && value.is_blank() {
            return;
        }
        if self.rows.len() < row {
            self.rows.resize_with(row, Vec::new);
        }
        let cells = &mut self.rows[row - 1];
        if cells.len() < col {
            cells.resize_with(col, CellValue::default);
        }
        cells[col - 1] = value;
    }

    /// Build the header index fresh from row 1.
    pub fn header_index(&self) -> HeaderIndex {
        HeaderIndex::from_row(self.rows.first().map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Convert every non-blank data cell of `col` to its text rendering.
    /// Returns the number of cells that changed type.
    pub fn force_text(&mut self, col: usize) -> usize {
        let mut converted = 0;
        for row in self.data_rows() {
            let cell = self.get(row, col);
            if cell.is_blank() || matches!(cell, CellValue::Text(_)) {
                continue;
            }
            let text = cell.to_text();
            self.set(row, col, CellValue::Text(text));
            converted += 1;
        }
        converted
    }
}

/// Ordered collection of sheets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    /// Read every sheet's cell values, re-anchored to absolute coordinates.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let read_err = |message: String| PipelineError::Spreadsheet {
            path: path.to_path_buf(),
            message,
        };

        let mut reader = open_workbook_auto(path).map_err(|e| read_err(e.to_string()))?;
        let mut sheets = Vec::new();

        for name in reader.sheet_names() {
            let range = reader
                .worksheet_range(&name)
                .map_err(|e| read_err(format!("sheet {name}: {e}")))?;

            let mut sheet = Sheet::new(name.as_str());
            if let Some((first_row, first_col)) = range.start() {
                for (r, c, data) in range.used_cells() {
                    let row = first_row as usize + r + 1;
                    let col = first_col as usize + c + 1;
                    sheet.set(row, col, CellValue::from_data(data));
                }
            }
            debug!(sheet = %name, rows = sheet.max_row(), cols = sheet.max_column(), "Loaded sheet");
            sheets.push(sheet);
        }

        Ok(Self { sheets })
    }

    /// Write all sheets to `path`, replacing any existing file.
    pub fn save(&self, path: &Path, schema: &TextColumnSchema) -> Result<(), PipelineError> {
        let write_err = |source| PipelineError::Write {
            path: path.to_path_buf(),
            source,
        };

        let text_format = Format::new().set_num_format("@");
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

        let mut book = XlsxWorkbook::new();
        for sheet in &self.sheets {
            let text_columns = schema.columns_for(sheet);
            let worksheet = book.add_worksheet();
            worksheet.set_name(sheet.name()).map_err(write_err)?;

            for &col in &text_columns {
                worksheet
                    .set_column_format((col - 1) as u16, &text_format)
                    .map_err(write_err)?;
            }

            for (r, cells) in sheet.rows.iter().enumerate() {
                for (c, value) in cells.iter().enumerate() {
                    let (row, col) = (r as u32, c as u16);
                    if value.is_blank() {
                        continue;
                    }
                    if text_columns.contains(&(c + 1)) {
                        worksheet
                            .write_string_with_format(row, col, value.to_text(), &text_format)
                            .map_err(write_err)?;
                        continue;
                    }
                    match value {
                        CellValue::Empty => {}
                        CellValue::Text(s) => {
                            worksheet.write_string(row, col, s.as_str()).map_err(write_err)?;
                        }
                        CellValue::Int(i) => {
                            worksheet.write_number(row, col, *i as f64).map_err(write_err)?;
                        }
                        CellValue::Float(f) => {
                            worksheet.write_number(row, col, *f).map_err(write_err)?;
                        }
                        CellValue::Bool(b) => {
                            worksheet.write_boolean(row, col, *b).map_err(write_err)?;
                        }
                        CellValue::DateTime(dt) => {
                            let format = if dt.time() == Time::MIDNIGHT {
                                &date_format
                            } else {
                                &datetime_format
                            };
                            worksheet
                                .write_number_with_format(row, col, to_excel_serial(*dt), format)
                                .map_err(write_err)?;
                        }
                    }
                }
            }
        }

        book.save(path).map_err(write_err)?;
        debug!(path = %path.display(), sheets = self.sheets.len(), "Workbook saved");
        Ok(())
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn sheets_mut(&mut self) -> impl Iterator<Item = &mut Sheet> {
        self.sheets.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_set_grows_and_get_defaults_to_empty() {
        let mut sheet = Sheet::new("BARANG");
        sheet.set(3, 2, CellValue::text("x"));
        assert_eq!(sheet.max_row(), 3);
        assert_eq!(sheet.max_column(), 2);
        assert_eq!(sheet.get(3, 2), &CellValue::text("x"));
        assert!(sheet.get(1, 1).is_blank());
        assert!(sheet.get(10, 10).is_blank());
    }

    #[test]
    fn test_blank_write_outside_grid_does_not_grow() {
        let mut sheet = Sheet::new("BARANG");
        sheet.set(5, 5, CellValue::Empty);
        assert_eq!(sheet.max_row(), 0);
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(CellValue::Float(8.0).to_text(), "8");
        assert_eq!(CellValue::Float(1.5).to_text(), "1.5");
        assert_eq!(CellValue::Int(50900).to_text(), "50900");
        assert_eq!(
            CellValue::DateTime(datetime!(2025-01-20 0:00)).to_text(),
            "2025-01-20"
        );
        assert!(CellValue::text("").is_blank());
    }

    #[test]
    fn test_excel_serial_round_trip() {
        let dt = datetime!(2025-01-20 13:45:10);
        assert_eq!(from_excel_serial(to_excel_serial(dt)), Some(dt));
        assert_eq!(from_excel_serial(45677.0), Some(datetime!(2025-01-20 0:00)));
    }

    #[test]
    fn test_force_text_skips_header_and_blanks() {
        let mut sheet = Sheet::from_rows(
            "ENTITAS",
            vec![
                vec![CellValue::text("NOMOR IDENTITAS")],
                vec![CellValue::Float(10694040059.0)],
                vec![CellValue::Empty],
                vec![CellValue::text("0010694040059000000000")],
            ],
        );
        assert_eq!(sheet.force_text(1), 1);
        assert_eq!(sheet.get(2, 1), &CellValue::text("10694040059"));
        assert_eq!(sheet.get(4, 1), &CellValue::text("0010694040059000000000"));
    }

    #[test]
    fn test_save_and_load_preserves_values_and_sheet_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        let book = Workbook::new(vec![
            Sheet::from_rows(
                "HEADER",
                vec![
                    vec![CellValue::text("NOMOR AJU"), CellValue::text("TANGGAL")],
                    vec![
                        CellValue::text("00002701069420250120000124"),
                        CellValue::DateTime(datetime!(2025-01-20 0:00)),
                    ],
                ],
            ),
            Sheet::from_rows(
                "BARANG",
                vec![
                    vec![CellValue::text("SERI BARANG"), CellValue::Empty, CellValue::text("OK")],
                    vec![CellValue::Int(1), CellValue::Empty, CellValue::Bool(true)],
                ],
            ),
        ]);

        book.save(&path, &TextColumnSchema::customs()).unwrap();
        let loaded = Workbook::load(&path).unwrap();

        let names: Vec<&str> = loaded.sheets().iter().map(Sheet::name).collect();
        assert_eq!(names, vec!["HEADER", "BARANG"]);
        let header = loaded.sheet("HEADER").unwrap();
        assert_eq!(header.get(2, 1), &CellValue::text("00002701069420250120000124"));
        assert_eq!(header.get(2, 2).to_text(), "2025-01-20");
        let barang = loaded.sheet("BARANG").unwrap();
        assert_eq!(barang.get(2, 1).to_text(), "1");
        assert_eq!(barang.get(2, 3), &CellValue::Bool(true));
        assert!(barang.get(1, 2).is_blank());
    }

    #[test]
    fn test_load_missing_file_is_spreadsheet_error() {
        let err = Workbook::load(Path::new("/nonexistent/book.xlsx")).unwrap_err();
        assert!(matches!(err, PipelineError::Spreadsheet { .. }));
    }
}
