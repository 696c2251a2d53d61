use httpmock::prelude::*;
use parcel_utils::{EngineConfig, ParcelQuery, UtilityError, UtilityResolver};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir, base_url: &str, read_timeout_secs: f64, with_wells: bool) -> EngineConfig {
    let mut toml = format!(
        r#"
[transport]
read_timeout_secs = {read_timeout_secs:?}
retries = 0

[retry]
max_retries = 1
base_delay_ms = 0
jitter_ms = 0

[jurisdictions.lehigh-acres_fl.parcel_layer]
url = "{base}/parcels/0/query"
static_params = {{ f = "json", outFields = "*" }}

[jurisdictions.lehigh-acres_fl.electric_territory_layer]
url = "{base}/electric/0/query"
static_params = {{ f = "json", outFields = "UtilityName" }}

[jurisdictions.lehigh-acres_fl.water_layer]
url = "{base}/water/0/query"
provider_field = "PROVIDER"
static_params = {{ f = "json", outFields = "PROVIDER" }}

[jurisdictions.lehigh-acres_fl.sewer_layer]
url = "{base}/sewer/0/query"
static_params = {{ f = "json" }}
"#,
        base = base_url,
        read_timeout_secs = read_timeout_secs
    );

    if with_wells {
        toml.push_str(&format!(
            r#"
[jurisdictions.lehigh-acres_fl.wells_layer]
url = "{base}/flwmi/0/query"
static_params = {{ f = "json", outFields = "*" }}
"#,
            base = base_url
        ));
    }

    let path = dir.path().join("parcel-utils.toml");
    std::fs::write(&path, toml).unwrap();
    EngineConfig::from_file(&path).unwrap()
}

fn resolver(config: &EngineConfig) -> UtilityResolver<parcel_utils::HttpTransport> {
    let catalogue = Arc::new(config.load_catalogue().unwrap());
    UtilityResolver::initialize(config, catalogue).unwrap()
}

#[tokio::test]
async fn test_end_to_end_profile_over_http() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    let parcels = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/parcels/0/query")
                .query_param("where", "APN='04522402'")
                .query_param("outSR", "4326")
                .query_param("returnGeometry", "true")
                .query_param("f", "json");
            then.status(200).json_body(json!({
                "features": [{
                    "attributes": {"APN": "04522402"},
                    "geometry": {"rings": [[[-81.62, 26.61], [-81.61, 26.61], [-81.61, 26.62]]]}
                }]
            }));
        })
        .await;
    let electric = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/electric/0/query")
                .query_param("spatialRel", "esriSpatialRelIntersects")
                .query_param("geometryType", "esriGeometryPoint")
                .query_param("inSR", "4326");
            then.status(200)
                .json_body(json!({"features": [{"attributes": {"UtilityName": "LCEC"}}]}));
        })
        .await;
    let water = server
        .mock_async(|when, then| {
            when.method(GET).path("/water/0/query");
            then.status(200).json_body(json!({"features": []}));
        })
        .await;
    let sewer = server
        .mock_async(|when, then| {
            when.method(GET).path("/sewer/0/query");
            then.status(503);
        })
        .await;
    let wells = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/flwmi/0/query")
                .query_param("where", "PARCELNO='04522402' OR ALT_KEY='04522402'")
                .query_param("returnGeometry", "false");
            then.status(200).json_body(json!({
                "features": [
                    {"attributes": {"PARCELNO": "04522402", "DW": "KnownWell", "WW": "KnownSeptic", "last_edited_date": 1_600_000_000_000i64}},
                    {"attributes": {"PARCELNO": "04522402", "DW": "KnownPublic", "WW": "KnownSewer", "last_edited_date": 1_500_000_000_000i64}}
                ]
            }));
        })
        .await;

    let config = write_config(&dir, &server.base_url(), 5.0, true);
    let resolver = resolver(&config);

    let profile = resolver
        .resolve(&ParcelQuery::new("04522402", None, "Lehigh Acres", "FL"))
        .await
        .unwrap();
    resolver.shutdown();

    parcels.assert_async().await;
    electric.assert_async().await;
    water.assert_async().await;
    wells.assert_async().await;
    // 503 is not retried
    assert_eq!(sewer.hits_async().await, 1);

    assert!(profile.electric_available);
    assert_eq!(profile.electric_provider.as_deref(), Some("LCEC"));
    assert!(!profile.water_available);
    assert_eq!(profile.water_provider, None);
    assert!(!profile.sewer_available);
    assert_eq!(profile.well_available, Some(true));
    assert_eq!(profile.well_use.as_deref(), Some("KnownWell"));
    assert_eq!(profile.septic_present, Some(true));
}

#[tokio::test]
async fn test_unknown_jurisdiction_makes_no_requests() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let any = server
        .mock_async(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({"features": []}));
        })
        .await;

    let config = write_config(&dir, &server.base_url(), 5.0, true);
    let resolver = resolver(&config);

    let err = resolver
        .resolve(&ParcelQuery::new("04522402", None, "Atlantis", "FL"))
        .await
        .unwrap_err();

    assert!(matches!(err, UtilityError::ConfigurationNotFound { .. }));
    assert!(err.user_friendly_message().starts_with("Insufficient data"));
    assert_eq!(any.hits_async().await, 0);
}

#[tokio::test]
async fn test_parcel_outage_retried_then_reported() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let parcels = server
        .mock_async(|when, then| {
            when.method(GET).path("/parcels/0/query");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(json!({"features": []}));
        })
        .await;

    let config = write_config(&dir, &server.base_url(), 0.3, false);
    let resolver = resolver(&config);

    let err = resolver
        .resolve(&ParcelQuery::new("04522402", None, "Lehigh Acres", "FL"))
        .await
        .unwrap_err();

    assert!(matches!(err, UtilityError::Upstream { .. }));
    assert_eq!(parcels.hits_async().await, 2);
}

#[tokio::test]
async fn test_address_lookup_when_identifier_blank() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let parcels = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/parcels/0/query")
                .query_param("where", "UPPER(SiteAddress) LIKE '123 O''NEIL AVE%'");
            then.status(200).json_body(json!({"features": []}));
        })
        .await;

    let config = write_config(&dir, &server.base_url(), 5.0, false);
    let resolver = resolver(&config);

    let profile = resolver
        .resolve(&ParcelQuery::new("", Some("123 O'Neil Ave".to_string()), "lehigh acres", "fl"))
        .await
        .unwrap();

    parcels.assert_async().await;
    assert!(!profile.electric_available && !profile.water_available && !profile.sewer_available);
    assert_eq!(profile.well_available, None);
}
