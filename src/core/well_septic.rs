//! Well and septic status from the statewide ancillary dataset.
//!
//! Counties encode water source and wastewater disposal with no shared
//! vocabulary. Codes are lower-cased and trimmed, then mapped:
//!
//! | drinking-water code               | well    | water connected |
//! |-----------------------------------|---------|-----------------|
//! | empty, `none`, `unknown`          | unknown | unknown         |
//! | contains `public`                 | no      | yes             |
//! | contains `well`                   | yes     | no              |
//! | anything else                     | unknown | unknown         |
//!
//! | wastewater code                   | sewer connected           |
//! |-----------------------------------|---------------------------|
//! | empty, `none`, `unknown`          | unknown                   |
//! | contains `septic`                 | no (septic present)       |
//! | contains `sewer`                  | yes                       |
//! | exactly `public`                  | yes                       |
//! | anything else                     | unknown                   |
//!
//! Rows are checked top to bottom, so a code mentioning both `septic` and
//! `sewer` means septic.

use crate::config::catalogue::{LayerDescriptor, Precedence, WellSepticFields, WellSepticSchema};
use crate::core::executor::QueryExecutor;
use crate::core::geometry::sql_literal;
use crate::domain::model::{value_text, Feature, TriState, WellSepticRow, WellSepticStatus};
use crate::domain::ports::Transport;
use crate::utils::error::{Result, UtilityError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

fn normalize(code: Option<&str>) -> String {
    code.map(|c| c.trim().to_lowercase()).unwrap_or_default()
}

fn is_indeterminate(code: &str) -> bool {
    matches!(code, "" | "none" | "unknown")
}

/// Returns `(well available, water connected)`.
pub fn classify_drinking_water(code: Option<&str>) -> (TriState, TriState) {
    let code = normalize(code);
    if is_indeterminate(&code) {
        (TriState::Unknown, TriState::Unknown)
    } else if code.contains("public") {
        (TriState::No, TriState::Yes)
    } else if code.contains("well") {
        (TriState::Yes, TriState::No)
    } else {
        (TriState::Unknown, TriState::Unknown)
    }
}

/// Returns whether the parcel is connected to sewer.
pub fn classify_wastewater(code: Option<&str>) -> TriState {
    let code = normalize(code);
    if is_indeterminate(&code) {
        TriState::Unknown
    } else if code.contains("septic") {
        TriState::No
    } else if code.contains("sewer") || code == "public" {
        TriState::Yes
    } else {
        TriState::Unknown
    }
}

/// Truthy/falsy flag column.
pub fn parse_flag(value: Option<&Value>) -> TriState {
    match value {
        Some(Value::Bool(b)) => TriState::from(*b),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v == 1.0 => TriState::Yes,
            Some(v) if v == 0.0 => TriState::No,
            _ => TriState::Unknown,
        },
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "y" | "yes" | "true" | "t" | "1" | "present" => TriState::Yes,
            "n" | "no" | "false" | "f" | "0" | "absent" | "none" => TriState::No,
            _ => TriState::Unknown,
        },
        _ => TriState::Unknown,
    }
}

/// Epoch milliseconds (number or numeric string) or an ISO-8601 string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ms) = s.parse::<i64>() {
                return DateTime::from_timestamp_millis(ms);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
                    return Some(dt.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        }
        _ => None,
    }
}

/// Projects a raw feature onto the configured field names.
pub fn row_from_feature(feature: &Feature, fields: &WellSepticFields) -> WellSepticRow {
    let edited_at = [&fields.edit_epoch_field, &fields.edit_iso_field]
        .into_iter()
        .filter_map(|name| feature.attributes.get(name.as_str()))
        .find_map(parse_timestamp);

    let mut row = WellSepticRow {
        edited_at,
        ..WellSepticRow::default()
    };

    match &fields.schema {
        WellSepticSchema::DrinkingWaterCodes {
            drinking_water_field,
            wastewater_field,
        } => {
            row.drinking_water = feature.attribute_text(drinking_water_field);
            row.wastewater = feature.attribute_text(wastewater_field);
        }
        WellSepticSchema::FlagScan {
            well_field,
            septic_field,
            well_use_field,
        } => {
            row.well_flag = feature.attributes.get(well_field.as_str()).cloned();
            row.septic_flag = feature.attributes.get(septic_field.as_str()).cloned();
            row.well_use = well_use_field
                .as_deref()
                .and_then(|f| feature.attributes.get(f))
                .and_then(value_text);
        }
    }

    row
}

/// Latest `edited_at` wins; ties and missing timestamps keep the earliest row.
pub fn select_most_recent(rows: &[WellSepticRow]) -> Option<&WellSepticRow> {
    let mut best: Option<&WellSepticRow> = None;
    for row in rows {
        match best {
            Some(current) if row.edited_at <= current.edited_at => {}
            _ => best = Some(row),
        }
    }
    best
}

/// Status of the most recent row under the jurisdiction's schema.
pub fn classify(rows: &[WellSepticRow], schema: &WellSepticSchema) -> WellSepticStatus {
    let Some(row) = select_most_recent(rows) else {
        return WellSepticStatus::indeterminate();
    };

    match schema {
        WellSepticSchema::DrinkingWaterCodes { .. } => {
            let (well, water_connected) = classify_drinking_water(row.drinking_water.as_deref());
            WellSepticStatus {
                well,
                water_connected,
                sewer_connected: classify_wastewater(row.wastewater.as_deref()),
                well_use: (well == TriState::Yes)
                    .then(|| row.drinking_water.clone())
                    .flatten(),
            }
        }
        WellSepticSchema::FlagScan { .. } => WellSepticStatus {
            well: parse_flag(row.well_flag.as_ref()),
            water_connected: TriState::Unknown,
            sewer_connected: parse_flag(row.septic_flag.as_ref()).negate(),
            well_use: row.well_use.clone(),
        },
    }
}

/// Exact match on either identifier column.
pub fn well_septic_filter(identifier: &str, fields: &WellSepticFields) -> Option<String> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return None;
    }
    let literal = sql_literal(identifier);
    Some(format!(
        "{}={} OR {}={}",
        fields.parcel_field, literal, fields.alt_key_field, literal
    ))
}

/// Attribute lookup by identifier, then classification.
///
/// No match means fully indeterminate; there is no spatial fallback because
/// the ancillary geometry does not line up with parcel boundaries.
pub async fn fetch_well_septic<T: Transport>(
    executor: &QueryExecutor<T>,
    layer: &LayerDescriptor,
    identifier: &str,
    fields: &WellSepticFields,
) -> Result<WellSepticStatus> {
    let Some(filter) = well_septic_filter(identifier, fields) else {
        return Ok(WellSepticStatus::indeterminate());
    };

    let params = layer.query_params(
        vec![
            ("where".to_string(), filter),
            ("returnGeometry".to_string(), "false".to_string()),
        ],
        Precedence::CallWins,
    );

    let features = match executor.query_features(layer, &params).await {
        Ok(set) => set.features,
        Err(UtilityError::MalformedResponse { message }) => {
            tracing::warn!("Malformed well/septic response: {}", message);
            return Ok(WellSepticStatus::indeterminate());
        }
        Err(e) => return Err(e),
    };

    let rows: Vec<WellSepticRow> = features
        .iter()
        .map(|feature| row_from_feature(feature, fields))
        .collect();
    tracing::debug!("{} well/septic row(s) for '{}'", rows.len(), identifier);

    Ok(classify(&rows, &fields.schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::executor::tests::ScriptedTransport;
    use crate::core::executor::RetryPolicy;
    use serde_json::json;

    const URL: &str = "https://gis.example.com/flwmi/0/query";

    fn codes() -> WellSepticSchema {
        WellSepticSchema::default()
    }

    fn row(dw: &str, ww: &str, edited_ms: Option<i64>) -> WellSepticRow {
        WellSepticRow {
            drinking_water: Some(dw.to_string()),
            wastewater: Some(ww.to_string()),
            edited_at: edited_ms.and_then(DateTime::from_timestamp_millis),
            ..WellSepticRow::default()
        }
    }

    #[test]
    fn test_drinking_water_families() {
        for code in ["KnownWell", "Known Private Well", "LikelyWell"] {
            assert_eq!(classify_drinking_water(Some(code)), (TriState::Yes, TriState::No), "{}", code);
        }
        for code in ["Known Public Supply", "LikelyPublic", "public"] {
            assert_eq!(classify_drinking_water(Some(code)), (TriState::No, TriState::Yes), "{}", code);
        }
        for code in [Some(""), Some("Unknown"), Some(" NONE "), None, Some("SWGW")] {
            assert_eq!(
                classify_drinking_water(code),
                (TriState::Unknown, TriState::Unknown),
                "{:?}",
                code
            );
        }
    }

    #[test]
    fn test_wastewater_codes() {
        assert_eq!(classify_wastewater(Some("KnownSewer")), TriState::Yes);
        assert_eq!(classify_wastewater(Some("Public")), TriState::Yes);
        assert_eq!(classify_wastewater(Some("Public Septic Inspection")), TriState::No);
        assert_eq!(classify_wastewater(Some("Known Septic")), TriState::No);
        assert_eq!(classify_wastewater(Some("unknown")), TriState::Unknown);
        assert_eq!(classify_wastewater(Some("Community")), TriState::Unknown);
        assert_eq!(classify_wastewater(None), TriState::Unknown);
    }

    #[test]
    fn test_septic_wins_over_sewer() {
        for code in ["Sewer or Septic", "LikelySepticNoSewer", "septic/sewer"] {
            assert_eq!(classify_wastewater(Some(code)), TriState::No, "{}", code);
        }
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(Some(&json!(true))), TriState::Yes);
        assert_eq!(parse_flag(Some(&json!(0))), TriState::No);
        assert_eq!(parse_flag(Some(&json!(" Y "))), TriState::Yes);
        assert_eq!(parse_flag(Some(&json!("No"))), TriState::No);
        assert_eq!(parse_flag(Some(&json!("maybe"))), TriState::Unknown);
        assert_eq!(parse_flag(Some(&Value::Null)), TriState::Unknown);
        assert_eq!(parse_flag(None), TriState::Unknown);
    }

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
        assert_eq!(parse_timestamp(&json!(1_700_000_000_000i64)), Some(expected));
        assert_eq!(parse_timestamp(&json!("1700000000000")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2023-11-14T22:13:20Z")), Some(expected));
        assert_eq!(parse_timestamp(&json!("2023-11-14T22:13:20")), Some(expected));
        assert!(parse_timestamp(&json!("2023-11-14")).is_some());
        assert_eq!(parse_timestamp(&json!("last tuesday")), None);
        assert_eq!(parse_timestamp(&Value::Null), None);
    }

    #[test]
    fn test_most_recent_row_selected() {
        let rows = vec![
            row("KnownWell", "KnownSeptic", Some(1_000)),
            row("Known Public", "KnownSewer", Some(3_000)),
            row("Unknown", "Unknown", Some(2_000)),
        ];
        let status = classify(&rows, &codes());
        assert_eq!(status.well, TriState::No);
        assert_eq!(status.water_connected, TriState::Yes);
        assert_eq!(status.sewer_connected, TriState::Yes);
        assert_eq!(status.well_use, None);
    }

    #[test]
    fn test_timestamped_row_beats_untimestamped() {
        let rows = vec![
            row("Known Public", "KnownSewer", None),
            row("KnownWell", "KnownSeptic", Some(1)),
        ];
        let status = classify(&rows, &codes());
        assert_eq!(status.well, TriState::Yes);
        assert_eq!(status.septic_present(), TriState::Yes);
        assert_eq!(status.well_use.as_deref(), Some("KnownWell"));
    }

    #[test]
    fn test_selection_without_timestamps_is_first_and_stable() {
        let rows = vec![
            row("KnownWell", "KnownSeptic", None),
            row("Known Public", "KnownSewer", None),
        ];
        let first = classify(&rows, &codes());
        for _ in 0..10 {
            assert_eq!(classify(&rows, &codes()), first);
        }
        assert_eq!(first.well, TriState::Yes);
        assert!(std::ptr::eq(select_most_recent(&rows).unwrap(), &rows[0]));
    }

    #[test]
    fn test_no_rows_is_indeterminate() {
        let status = classify(&[], &codes());
        assert!(status.is_indeterminate());
        assert_eq!(status, WellSepticStatus::indeterminate());
    }

    #[test]
    fn test_flag_scan_schema() {
        let fields = WellSepticFields {
            schema: WellSepticSchema::FlagScan {
                well_field: "HAS_WELL".to_string(),
                septic_field: "HAS_SEPTIC".to_string(),
                well_use_field: Some("WELL_USE".to_string()),
            },
            ..WellSepticFields::default()
        };
        let feature: Feature = serde_json::from_value(json!({"attributes": {
            "PARCELNO": "04522402",
            "HAS_WELL": "Y",
            "HAS_SEPTIC": 0,
            "WELL_USE": "Irrigation",
            "EDITDATE": "2024-01-02T03:04:05Z"
        }}))
        .unwrap();

        let row = row_from_feature(&feature, &fields);
        assert_eq!(row.well_use.as_deref(), Some("Irrigation"));
        assert!(row.edited_at.is_some());

        let status = classify(&[row], &fields.schema);
        assert_eq!(status.well, TriState::Yes);
        assert_eq!(status.sewer_connected, TriState::Yes);
        assert_eq!(status.septic_present(), TriState::No);
        assert_eq!(status.well_use.as_deref(), Some("Irrigation"));
    }

    #[test]
    fn test_filter_uses_both_identifier_fields() {
        let fields = WellSepticFields::default();
        assert_eq!(
            well_septic_filter("04522402", &fields).as_deref(),
            Some("PARCELNO='04522402' OR ALT_KEY='04522402'")
        );
        assert_eq!(well_septic_filter(" ", &fields), None);
    }

    #[tokio::test]
    async fn test_fetch_picks_latest_of_matching_rows() {
        let transport = ScriptedTransport::new().script(
            URL,
            vec![Ok(json!({"features": [
                {"attributes": {"PARCELNO": "1", "DW": "KnownWell", "WW": "KnownSeptic", "last_edited_date": 1000}},
                {"attributes": {"ALT_KEY": "1", "DW": "Known Public", "WW": "Sewer", "EDITDATE": "2001-01-01"}}
            ]}))],
        );
        let executor = QueryExecutor::new(transport, RetryPolicy::none());
        let layer = LayerDescriptor::new(URL).with_static_param("f", "json");

        let status = fetch_well_septic(&executor, &layer, "1", &WellSepticFields::default())
            .await
            .unwrap();
        assert_eq!(status.well, TriState::No);
        assert_eq!(status.sewer_connected, TriState::Yes);

        let params = &executor.transport().calls_to(URL)[0];
        assert!(params.contains(&("where".to_string(), "PARCELNO='1' OR ALT_KEY='1'".to_string())));
    }

    #[tokio::test]
    async fn test_fetch_without_match_is_indeterminate() {
        let transport = ScriptedTransport::new().script(URL, vec![Ok(json!({"features": []}))]);
        let executor = QueryExecutor::new(transport, RetryPolicy::none());
        let layer = LayerDescriptor::new(URL);

        let status = fetch_well_septic(&executor, &layer, "1", &WellSepticFields::default())
            .await
            .unwrap();
        assert!(status.is_indeterminate());
        assert_eq!(executor.transport().total_calls(), 1);
    }
}
