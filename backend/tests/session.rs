//! End-to-end upload scenarios against the bundled schema mirror.

use std::path::PathBuf;

use ogm_validator::{
    FeatureCollection, OutboundError, OutcomeStatus, SchemaRegistry, Session, SessionError, SessionState,
    UploadedFile, ValidationMode, ValidatorConfig,
};
use serde_json::{json, Value};

const CSV: &str = "text/csv";
const JSON: &str = "application/json";
const XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn fixture(name: &str) -> Vec<u8> {
    std::fs::read(manifest_dir().join("tests/fixtures").join(name)).unwrap()
}

async fn ready_session() -> Session {
    let config = ValidatorConfig::default();
    let registry = SchemaRegistry::new(&config).unwrap();
    let mut session = Session::new(config);
    session
        .load_schemas_from_dir(&registry, &manifest_dir().join("schemas"))
        .await
        .unwrap();
    assert_eq!(session.state(), &SessionState::Ready);
    session
}

fn feature(latitude: Value, project: Option<&str>) -> Value {
    let mut properties = json!({
        "budgetShare": 50,
        "dac5PurposeCode": 12220,
        "sector_location": { "sector": "Health", "location_type": "Clinic" }
    });
    if let Some(project) = project {
        properties["kfwProjectNoINPRO"] = json!(project);
    }
    json!({
        "type": "Feature",
        "geometry": { "type": "Point", "coordinates": [7.4951, latitude] },
        "properties": properties
    })
}

// =============================================================================
// Tabular uploads
// =============================================================================

#[tokio::test]
async fn test_csv_keeps_failing_rows() {
    let mut session = ready_session().await;
    let csv = "\
latitude,longitude,kfwProjectNoINPRO,budgetShare,dac5PurposeCode,sector,location_type,projectName
-1.2921,36.8219,2019 65 123,40,14020,Water and Sanitation,Well,Rural water
9.0579,7.4951,2019 65 123,60,12220,Mining,Clinic,Clinic Abuja
abc,7.4951,2019 65 123,60,12220,Health,Clinic,Clinic Kano
";
    session
        .upload(UploadedFile::new("locations.csv", CSV, csv.as_bytes().to_vec()))
        .unwrap();

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::PartiallyValid);
    assert_eq!(outcome.mode, Some(ValidationMode::Tabular));
    assert_eq!(outcome.data.as_ref().unwrap().len(), 3);

    assert_eq!(outcome.report[0], "Validation Errors:");
    assert!(outcome
        .report
        .iter()
        .any(|line| line.starts_with("Row 2 at \"/properties/sector_location/sector\"")));
    assert!(outcome
        .report
        .contains(&"Row 3: Invalid or missing coordinates (latitude/longitude values). The project location is not printed on the map.".to_string()));
    assert!(!outcome.report.iter().any(|line| line.starts_with("Row 1")));

    let row3 = &outcome.data.as_ref().unwrap().features[2];
    assert_eq!(row3["geometry"]["coordinates"], json!([7.4951, null]));
    assert_eq!(row3["properties"]["projectName"], "Clinic Kano");
}

#[tokio::test]
async fn test_csv_semicolon_with_bom() {
    let mut session = ready_session().await;
    let csv = "\u{feff}latitude;longitude;kfwProjectNoINPRO;budgetShare;dac5PurposeCode;sector;location_type;projectName\n\
-1.2921;36.8219;A1;40;14020;Water and Sanitation;Well;Brunnen M\u{fc}nchen\n";

    session
        .upload(UploadedFile::new("semicolon.csv", CSV, csv.as_bytes().to_vec()))
        .unwrap();

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Valid, "{:?}", outcome.report);
    let feature = &outcome.data.as_ref().unwrap().features[0];
    assert_eq!(feature["geometry"]["coordinates"], json!([36.8219, -1.2921]));
    assert_eq!(feature["properties"]["projectName"], "Brunnen München");
}

#[tokio::test]
async fn test_header_only_csv_has_no_mail_draft() {
    let mut session = ready_session().await;
    session
        .upload(UploadedFile::new("empty.csv", CSV, b"latitude,longitude,kfwProjectNoINPRO\n".to_vec()))
        .unwrap();

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Valid);
    assert!(outcome.data.as_ref().unwrap().is_empty());
    assert!(matches!(session.mail_draft(), Err(OutboundError::NoRecords)));
}

#[tokio::test]
async fn test_template_workbook_and_mail_draft() {
    let mut session = ready_session().await;
    let state = session
        .upload(UploadedFile::new("template.xlsx", XLSX, fixture("template.xlsx")))
        .unwrap();
    assert!(matches!(state, SessionState::Resolved(_)));

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Valid, "{:?}", outcome.report);
    assert_eq!(outcome.report, vec!["Excel/CSV data is valid!"]);

    let data = outcome.data.as_ref().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data.features[0]["geometry"]["coordinates"], json!([36.8219, -1.2921]));
    assert_eq!(data.features[0]["properties"]["plannedOrActualStartDate"], "2023-03-15");
    assert_eq!(data.features[1]["properties"]["kfwProjectNoINPRO"], "201965123");
    assert_eq!(data.features[1]["properties"]["plannedOrActualStartDate"], "2023-03-16");

    let draft = session.mail_draft().unwrap();
    assert_eq!(draft.project_numbers, vec!["201965123"]);
    assert_eq!(draft.subject, "Validated Location data for Project 201965123");
}

#[tokio::test]
async fn test_workbook_without_template_sheet() {
    let mut session = ready_session().await;
    let state = session
        .upload(UploadedFile::new("export.xlsx", XLSX, fixture("no_template.xlsx")))
        .unwrap();

    match state {
        SessionState::AwaitingTemplateDecision(warning) => {
            assert_eq!(warning.file_name, "export.xlsx");
            assert_eq!(warning.expected_sheet, "Location Data");
            assert_eq!(warning.found_sheets, vec!["Sheet1", "Data"]);
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert!(session.outcome().is_none());

    session.continue_without_template().unwrap();
    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::PartiallyValid);
    assert_eq!(outcome.data.as_ref().unwrap().len(), 2);
    assert!(outcome
        .report
        .iter()
        .any(|line| line.starts_with("Row 2: Invalid or missing coordinates")));
    assert!(matches!(session.mail_draft(), Err(OutboundError::NotValidTabular)));
}

#[tokio::test]
async fn test_dismissed_workbook_is_discarded() {
    let mut session = ready_session().await;
    session
        .upload(UploadedFile::new("export.xlsx", XLSX, fixture("no_template.xlsx")))
        .unwrap();

    session.dismiss_structural_warning().unwrap();
    assert_eq!(session.state(), &SessionState::Ready);
    assert!(session.outcome().is_none());
    assert!(matches!(
        session.continue_without_template(),
        Err(SessionError::NoPendingDecision)
    ));
}

// =============================================================================
// GeoJSON uploads
// =============================================================================

#[tokio::test]
async fn test_feature_collection_drops_invalid_members() {
    let mut session = ready_session().await;
    let collection = json!({
        "type": "FeatureCollection",
        "features": [
            feature(json!(9.0579), Some("A1")),
            feature(json!(9.0579), None),
            feature(json!(12.0), Some("A3")),
        ]
    });
    session
        .upload(UploadedFile::new("c.geojson", JSON, collection.to_string().into_bytes()))
        .unwrap();

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::PartiallyValid);
    assert_eq!(outcome.mode, Some(ValidationMode::FeatureCollection));
    assert_eq!(
        outcome.report[0],
        "Some features in the GeoJSON FeatureCollection failed validation."
    );
    assert!(outcome.report[1].starts_with("Feature 2 at \"/properties\""));
    assert!(outcome.report[1].contains("kfwProjectNoINPRO"));

    let data = outcome.data.as_ref().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data.features[1]["properties"]["kfwProjectNoINPRO"], "A3");
}

#[tokio::test]
async fn test_single_feature_download_round_trip() {
    let mut session = ready_session().await;
    let uploaded = feature(json!(9.0579), Some("A1"));
    session
        .upload(UploadedFile::new("f.json", JSON, uploaded.to_string().into_bytes()))
        .unwrap();

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.report, vec!["GeoJSON Feature is valid!"]);

    let artifact = session.download().unwrap();
    assert_eq!(artifact.file_name, "validated_data.geojson");
    let parsed: FeatureCollection = serde_json::from_str(&artifact.contents).unwrap();
    assert_eq!(parsed.features, vec![uploaded]);

    // Mail is only offered for tabular uploads
    assert!(matches!(session.mail_draft(), Err(OutboundError::NotValidTabular)));
}

#[tokio::test]
async fn test_single_invalid_feature_has_no_data() {
    let mut session = ready_session().await;
    let uploaded = feature(json!(120.0), Some("A1"));
    session
        .upload(UploadedFile::new("f.json", JSON, uploaded.to_string().into_bytes()))
        .unwrap();

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::Invalid);
    assert_eq!(
        outcome.report,
        vec![
            "GeoJSON Feature Validation Errors:",
            "Error: Invalid or missing coordinates (latitude/longitude values). The project location is not printed on the map.",
        ]
    );
    assert!(matches!(session.download(), Err(OutboundError::NoData)));
}

// =============================================================================
// Session lifecycle
// =============================================================================

#[tokio::test]
async fn test_unsupported_upload() {
    let mut session = ready_session().await;
    session
        .upload(UploadedFile::new("notes.txt", "text/plain", b"hello".to_vec()))
        .unwrap();

    let outcome = session.outcome().unwrap();
    assert_eq!(outcome.status, OutcomeStatus::UnsupportedInput);
    assert_eq!(
        outcome.report,
        vec!["Unsupported file type. Please upload a JSON, CSV, or Excel file."]
    );
}

#[tokio::test]
async fn test_new_upload_replaces_previous_outcome() {
    let mut session = ready_session().await;
    session
        .upload(UploadedFile::new("export.xlsx", XLSX, fixture("no_template.xlsx")))
        .unwrap();

    session
        .upload(UploadedFile::new("f.json", JSON, feature(json!(1.0), Some("A")).to_string().into_bytes()))
        .unwrap();
    assert!(session.outcome().unwrap().is_valid());
    assert!(matches!(
        session.dismiss_structural_warning(),
        Err(SessionError::NoPendingDecision)
    ));
}

#[tokio::test]
async fn test_blocked_without_schemas() {
    let dir = tempfile::tempdir().unwrap();
    let config = ValidatorConfig::default();
    let registry = SchemaRegistry::new(&config).unwrap();
    let mut session = Session::new(config);

    let err = session.load_schemas_from_dir(&registry, dir.path()).await.unwrap_err();
    assert!(matches!(err, SessionError::SchemasUnavailable(_)));
    assert!(matches!(session.state(), SessionState::Blocked { .. }));

    let err = session
        .upload(UploadedFile::new("a.csv", CSV, b"latitude\n1".to_vec()))
        .unwrap_err();
    assert!(matches!(err, SessionError::SchemasUnavailable(_)));

    // Unsupported input is answered without a validator
    session
        .upload(UploadedFile::new("a.pdf", "application/pdf", vec![]))
        .unwrap();
    assert_eq!(session.outcome().unwrap().status, OutcomeStatus::UnsupportedInput);

    session.reset();
    assert!(matches!(session.state(), SessionState::Blocked { .. }));
}
