//! Excel workbook parsing (`.xls` and `.xlsx`) via calamine.
//!
//! The whole workbook is read into memory once. Cells keep their absolute
//! row position, so a header offset always counts from the top of the sheet
//! even when the first rows are blank.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Number, Value};

use crate::error::{ParseError, ParseResult};
use crate::models::RawRow;

/// Largest float that still converts to `i64` without losing integrality.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// One worksheet: its name and cell values by absolute row.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookSheet {
    pub name: String,
    cells: Vec<Vec<Option<Value>>>,
}

impl WorkbookSheet {
    pub fn new(name: impl Into<String>, cells: Vec<Vec<Option<Value>>>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// Rows below the header, keyed by header name.
    ///
    /// The header sits at row index `header_offset`. Columns with a blank
    /// header are ignored, empty cells are absent keys and rows with no
    /// value at all are skipped.
    pub fn rows(&self, header_offset: usize) -> Vec<RawRow> {
        let Some(header_row) = self.cells.get(header_offset) else {
            return Vec::new();
        };

        let headers: Vec<Option<String>> = header_row
            .iter()
            .map(|cell| cell.as_ref().map(header_text).filter(|h| !h.is_empty()))
            .collect();

        self.cells
            .iter()
            .skip(header_offset + 1)
            .filter_map(|cells| {
                let mut row = RawRow::new();
                for (header, cell) in headers.iter().zip(cells.iter()) {
                    if let (Some(header), Some(value)) = (header, cell) {
                        row.insert(header.clone(), value.clone());
                    }
                }
                (!row.is_empty()).then_some(row)
            })
            .collect()
    }
}

/// An opened workbook with every sheet loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    sheets: Vec<WorkbookSheet>,
}

impl Workbook {
    /// Open workbook bytes, auto-detecting xls/xlsx/xlsb/ods.
    pub fn open(bytes: &[u8]) -> ParseResult<Self> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name)?;
            let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

            let mut cells: Vec<Vec<Option<Value>>> = vec![Vec::new(); first_row];
            cells.extend(
                range
                    .rows()
                    .map(|row| row.iter().map(cell_value).collect::<Vec<_>>()),
            );

            sheets.push(WorkbookSheet::new(name, cells));
        }

        Ok(Self { sheets })
    }

    pub fn from_sheets(sheets: Vec<WorkbookSheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// True when the second sheet carries the template's name.
    pub fn has_template_sheet(&self, template_name: &str) -> bool {
        self.sheets
            .get(1)
            .is_some_and(|sheet| sheet.name == template_name)
    }

    /// The sheet location rows are read from: the second one, or the only
    /// one for single-sheet workbooks.
    pub fn data_sheet(&self) -> Option<&WorkbookSheet> {
        self.sheets.get(1).or_else(|| self.sheets.first())
    }

    /// Rows of the data sheet below `header_offset` title rows.
    pub fn data_rows(&self, header_offset: usize) -> ParseResult<Vec<RawRow>> {
        self.data_sheet()
            .map(|sheet| sheet.rows(header_offset))
            .ok_or(ParseError::NoWorksheet)
    }
}

/// Convert one cell to a JSON scalar; `None` for empty cells.
///
/// Integral floats become integers so that identifiers read back as `"123"`
/// rather than `"123.0"`. Date cells keep their serial number.
pub fn cell_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::Int(i) => Some(Value::from(*i)),
        Data::Float(f) => float_value(*f),
        Data::DateTime(dt) => float_value(dt.as_f64()),
        Data::Bool(b) => Some(Value::Bool(*b)),
        Data::String(s) if s.is_empty() => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
        Data::Error(e) => Some(Value::String(e.to_string())),
    }
}

fn float_value(f: f64) -> Option<Value> {
    if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER {
        Some(Value::from(f as i64))
    } else {
        Number::from_f64(f).map(Value::Number)
    }
}

fn header_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
