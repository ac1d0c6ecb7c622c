//! Input parsing: raw upload bytes to rows or JSON.
//!
//! - CSV with encoding and delimiter auto-detection (this module)
//! - GeoJSON documents ([`geojson`])
//! - Excel workbooks ([`spreadsheet`])
//!
//! Nothing here knows about the project location schema; rows come out as
//! [`RawRow`] maps of column name to untyped scalar.

pub mod geojson;
pub mod spreadsheet;

pub use geojson::{parse_geojson, GeoJsonDocument};
pub use spreadsheet::{Workbook, WorkbookSheet};

use serde_json::Value;

use crate::models::RawRow;

/// CSV parsing error with context
#[derive(Debug, Clone)]
pub struct CsvError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0);
        CsvError::new(line, err.to_string())
    }
}

/// Parsed CSV with detection metadata
#[derive(Debug, Clone)]
pub struct CsvTable {
    /// One row per non-blank data line
    pub rows: Vec<RawRow>,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Unknown encodings and invalid UTF-8 fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let text = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Comma wins ties, matching the usual spreadsheet export.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text into rows with an explicit delimiter.
///
/// Quoted fields may contain delimiters and newlines. Values are kept
/// verbatim as strings; a row shorter than the header simply lacks the
/// trailing columns. Rows where every field is empty are skipped.
pub fn parse_csv_str(content: &str, delimiter: char) -> Result<Vec<RawRow>, CsvError> {
    let (headers, rows) = read_records(content, delimiter)?;
    Ok(rows_from_records(&headers, rows))
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_csv_bytes(bytes: &[u8]) -> Result<CsvTable, CsvError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let (headers, records) = read_records(&content, delimiter)?;
    let rows = rows_from_records(&headers, records);

    Ok(CsvTable {
        rows,
        encoding,
        delimiter,
        headers,
    })
}

fn read_records(content: &str, delimiter: char) -> Result<(Vec<String>, Vec<csv::StringRecord>), CsvError> {
    let delimiter = u8::try_from(delimiter)
        .map_err(|_| CsvError::new(1, format!("Unsupported delimiter '{}'", delimiter)))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "No headers found"));
    }

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        records.push(record);
    }

    Ok((headers, records))
}

fn rows_from_records(headers: &[String], records: Vec<csv::StringRecord>) -> Vec<RawRow> {
    records
        .iter()
        .map(|record| {
            let mut row = RawRow::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                if header.is_empty() {
                    continue;
                }
                row.insert(header.clone(), Value::String(field.to_string()));
            }
            row
        })
        .collect()
}
