//! GeoJSON upload parsing.
//!
//! Only the top-level `type` is inspected here. Member features are kept as
//! raw JSON so that malformed geometries still reach the schema validator
//! and get reported instead of failing the parse.

use serde_json::Value;

use crate::error::ParseError;

/// The shapes of GeoJSON upload the validator understands.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoJsonDocument {
    /// A single `Feature`.
    Feature(Value),
    /// The members of a `FeatureCollection`, in document order.
    FeatureCollection(Vec<Value>),
    /// Valid JSON with any other top-level `type`.
    Other(Value),
}

/// Parse GeoJSON bytes and classify the document.
///
/// A `FeatureCollection` whose `features` is missing or not an array is a
/// parse error, like any other malformed JSON.
pub fn parse_geojson(bytes: &[u8]) -> Result<GeoJsonDocument, ParseError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let value: Value = serde_json::from_slice(bytes)?;

    let kind = value.get("type").and_then(Value::as_str).map(str::to_owned);

    match kind.as_deref() {
        Some("Feature") => Ok(GeoJsonDocument::Feature(value)),
        Some("FeatureCollection") => {
            let features = match value {
                Value::Object(mut obj) => obj.remove("features"),
                _ => None,
            };
            match features {
                Some(Value::Array(features)) => Ok(GeoJsonDocument::FeatureCollection(features)),
                _ => Err(ParseError::MissingFeatures),
            }
        }
        _ => Ok(GeoJsonDocument::Other(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_feature() {
        let doc = parse_geojson(br#"{"type":"Feature","geometry":null,"properties":{}}"#).unwrap();
        assert!(matches!(doc, GeoJsonDocument::Feature(v) if v["geometry"].is_null()));
    }

    #[test]
    fn test_feature_collection_keeps_order() {
        let bytes = serde_json::to_vec(&json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "id": 1 },
                { "type": "Feature", "id": 2 }
            ]
        }))
        .unwrap();

        match parse_geojson(&bytes).unwrap() {
            GeoJsonDocument::FeatureCollection(features) => {
                assert_eq!(features.len(), 2);
                assert_eq!(features[1]["id"], 2);
            }
            other => panic!("unexpected document: {:?}", other),
        }
    }

    #[test]
    fn test_other_type() {
        let doc = parse_geojson(br#"{"type":"Point","coordinates":[1,2]}"#).unwrap();
        assert!(matches!(doc, GeoJsonDocument::Other(_)));

        let doc = parse_geojson(b"[1, 2]").unwrap();
        assert!(matches!(doc, GeoJsonDocument::Other(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse_geojson(b"{\"type\": "), Err(ParseError::Json(_))));
        assert!(matches!(
            parse_geojson(br#"{"type":"FeatureCollection","features":{}}"#),
            Err(ParseError::MissingFeatures)
        ));
    }
}
