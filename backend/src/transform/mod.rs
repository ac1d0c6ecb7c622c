//! Transformation module.
//!
//! Turns tabular rows into GeoJSON location features:
//! - Coerce: lenient number, identifier and serial date conversion
//! - Rows: CSV and spreadsheet row transformers

pub mod coerce;
pub mod rows;

pub use coerce::{excel_date_to_string, safe_parse_float, safe_parse_int, scalar_to_string};
pub use rows::{from_csv_row, from_spreadsheet_row, transform_csv_rows, transform_spreadsheet_rows};
