//! Row to feature transformation.
//!
//! Both transformers build a [`LocationFeature`] with a Point geometry and
//! move every unrecognized column into the feature's properties unchanged.

use serde_json::Value;

use super::coerce::{excel_date_to_string, safe_parse_float, safe_parse_int, scalar_to_string};
use crate::models::{LocationFeature, LocationProperties, PointGeometry, RawRow, SectorLocation};

/// Columns the spreadsheet template stores as serial dates.
pub const DATE_COLUMNS: [&str; 3] = [
    "plannedOrActualStartDate",
    "plannedOrActualEndDate",
    "dateOfDataCollection",
];

/// Identifier columns that must come out as strings.
pub const IDENTIFIER_COLUMNS: [&str; 3] = ["primaryKey", "kfwProjectNoINPRO", "uniqueId"];

// =============================================================================
// Single Rows
// =============================================================================

/// Build a feature from a CSV row.
pub fn from_csv_row(mut row: RawRow) -> LocationFeature {
    let geometry = take_geometry(&mut row);
    let properties = LocationProperties {
        budget_share: Some(safe_parse_float(row.remove("budgetShare").as_ref())),
        dac5_purpose_code: Some(safe_parse_int(row.remove("dac5PurposeCode").as_ref())),
        ..Default::default()
    };
    let properties = take_common(&mut row, properties);

    LocationFeature { geometry, properties }
}

/// Build a feature from a spreadsheet row.
///
/// Serial dates become `YYYY-MM-DD` and numeric identifiers become strings.
/// `budgetShare` and `dac5PurposeCode` are taken only when the cell already
/// holds a fitting number; any other cell is passed through unchanged.
/// Absent cells stay absent.
pub fn from_spreadsheet_row(mut row: RawRow) -> LocationFeature {
    let geometry = take_geometry(&mut row);

    let mut identifiers = IDENTIFIER_COLUMNS
        .map(|column| row.remove(column).filter(|v| !v.is_null()).map(|v| scalar_to_string(&v)));
    let mut dates = DATE_COLUMNS
        .map(|column| row.remove(column).filter(|v| !v.is_null()).map(|v| excel_date_to_string(&v)));

    let mut properties = LocationProperties {
        primary_key: identifiers[0].take(),
        kfw_project_no_inpro: identifiers[1].take(),
        unique_id: identifiers[2].take(),
        planned_or_actual_start_date: dates[0].take(),
        planned_or_actual_end_date: dates[1].take(),
        date_of_data_collection: dates[2].take(),
        ..Default::default()
    };
    take_spreadsheet_numbers(&mut row, &mut properties);

    LocationFeature {
        geometry,
        properties: take_common(&mut row, properties),
    }
}

fn take_geometry(row: &mut RawRow) -> PointGeometry {
    let latitude = safe_parse_float(row.remove("latitude").as_ref());
    let longitude = safe_parse_float(row.remove("longitude").as_ref());
    PointGeometry::new(longitude, latitude)
}

fn take_spreadsheet_numbers(row: &mut RawRow, properties: &mut LocationProperties) {
    if let Some(share) = row.get("budgetShare").and_then(Value::as_f64) {
        row.remove("budgetShare");
        properties.budget_share = Some(share);
    }
    if let Some(code) = row
        .get("dac5PurposeCode")
        .and_then(Value::as_f64)
        .filter(|code| code.fract() == 0.0)
    {
        row.remove("dac5PurposeCode");
        properties.dac5_purpose_code = Some(code);
    }
}

fn take_common(row: &mut RawRow, mut properties: LocationProperties) -> LocationProperties {
    properties.sector_location = SectorLocation {
        sector: row.remove("sector"),
        location_type: row.remove("location_type"),
    };
    properties.extra = std::mem::take(row);
    properties
}

// =============================================================================
// Batches
// =============================================================================

/// Transform CSV rows, preserving order.
pub fn transform_csv_rows(rows: Vec<RawRow>) -> Vec<LocationFeature> {
    rows.into_iter().map(from_csv_row).collect()
}

/// Transform spreadsheet rows, preserving order.
pub fn transform_spreadsheet_rows(rows: Vec<RawRow>) -> Vec<LocationFeature> {
    rows.into_iter().map(from_spreadsheet_row).collect()
}
