use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// WGS84 (EPSG:4326) longitude/latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub const WKID: u32 = 4326;

    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// ArcGIS point geometry JSON, as sent in the `geometry` query parameter.
    pub fn to_esri_json(&self) -> String {
        serde_json::json!({
            "x": self.lon,
            "y": self.lat,
            "spatialReference": { "wkid": Self::WKID }
        })
        .to_string()
    }
}

/// Three-valued flag for data the upstream cannot always confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriState {
    Yes,
    No,
    #[default]
    Unknown,
}

impl TriState {
    pub fn to_option(self) -> Option<bool> {
        match self {
            TriState::Yes => Some(true),
            TriState::No => Some(false),
            TriState::Unknown => None,
        }
    }

    pub fn negate(self) -> Self {
        match self {
            TriState::Yes => TriState::No,
            TriState::No => TriState::Yes,
            TriState::Unknown => TriState::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        self != TriState::Unknown
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            TriState::Yes
        } else {
            TriState::No
        }
    }
}

/// What a caller asks about: one parcel in one jurisdiction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParcelQuery {
    pub apn: String,
    pub street_address: Option<String>,
    pub jurisdiction: String,
    pub state: String,
}

impl ParcelQuery {
    pub fn new(
        apn: impl Into<String>,
        street_address: Option<String>,
        jurisdiction: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            apn: apn.into(),
            street_address,
            jurisdiction: jurisdiction.into(),
            state: state.into(),
        }
    }
}

/// Availability of a network service (electric, water, sewer).
///
/// Built only through [`ServiceAvailability::from_provider`], so `available`
/// is false exactly when there is no provider name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceAvailability {
    available: bool,
    provider: Option<String>,
}

impl ServiceAvailability {
    pub fn from_provider(provider: Option<String>) -> Self {
        let provider = provider
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Self {
            available: provider.is_some(),
            provider,
        }
    }

    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn available(&self) -> bool {
        self.available
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    fn into_parts(self) -> (bool, Option<String>) {
        (self.available, self.provider)
    }
}

/// Classified well/septic status for one parcel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WellSepticStatus {
    pub well: TriState,
    pub water_connected: TriState,
    pub sewer_connected: TriState,
    pub well_use: Option<String>,
}

impl WellSepticStatus {
    pub fn indeterminate() -> Self {
        Self::default()
    }

    pub fn septic_present(&self) -> TriState {
        self.sewer_connected.negate()
    }

    pub fn is_indeterminate(&self) -> bool {
        !self.well.is_known() && !self.sewer_connected.is_known() && self.well_use.is_none()
    }
}

/// Resolution result for one parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilityProfile {
    pub apn: String,
    pub electric_available: bool,
    pub electric_provider: Option<String>,
    pub water_available: bool,
    pub water_provider: Option<String>,
    pub sewer_available: bool,
    pub sewer_provider: Option<String>,
    pub well_available: Option<bool>,
    pub well_use: Option<String>,
    pub septic_present: Option<bool>,
}

impl UtilityProfile {
    pub fn assemble(
        apn: &str,
        electric: ServiceAvailability,
        water: ServiceAvailability,
        sewer: ServiceAvailability,
        well_septic: Option<WellSepticStatus>,
    ) -> Self {
        let (electric_available, electric_provider) = electric.into_parts();
        let (water_available, water_provider) = water.into_parts();
        let (sewer_available, sewer_provider) = sewer.into_parts();
        let well_septic = well_septic.unwrap_or_default();

        Self {
            apn: apn.to_string(),
            electric_available,
            electric_provider,
            water_available,
            water_provider,
            sewer_available,
            sewer_provider,
            well_available: well_septic.well.to_option(),
            septic_present: well_septic.septic_present().to_option(),
            well_use: well_septic.well_use,
        }
    }
}

/// Raw ancillary record, already projected onto the configured field names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WellSepticRow {
    pub drinking_water: Option<String>,
    pub wastewater: Option<String>,
    pub well_flag: Option<Value>,
    pub septic_flag: Option<Value>,
    pub well_use: Option<String>,
    pub edited_at: Option<DateTime<Utc>>,
}

/// One feature of an ArcGIS query response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

impl Feature {
    /// Scalar attribute rendered as text; null and blank count as absent.
    pub fn attribute_text(&self, field: &str) -> Option<String> {
        value_text(self.attributes.get(field)?)
    }
}

pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeatureSet {
    #[serde(default)]
    pub features: Vec<Feature>,
}
