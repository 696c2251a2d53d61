//! Per-jurisdiction registry of the ArcGIS layers a resolution queries.
//!
//! The catalogue is read once at startup (TOML or JSON) and shared read-only
//! afterwards. Keys are `<place-slug>_<state>` in lower case, e.g.
//! `lehigh-acres_fl`.

use crate::config::substitute_env_vars;
use deunicode::deunicode;
use crate::domain::ports::QueryParams;
use crate::utils::error::{Result, UtilityError};
use crate::utils::validation::{
    validate_disjoint, validate_non_empty_string, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

fn default_provider_field() -> String {
    "UtilityName".to_string()
}

fn default_id_field() -> String {
    "APN".to_string()
}

fn default_address_field() -> String {
    "SiteAddress".to_string()
}

fn default_parcel_field() -> String {
    "PARCELNO".to_string()
}

fn default_alt_key_field() -> String {
    "ALT_KEY".to_string()
}

fn default_edit_epoch_field() -> String {
    "last_edited_date".to_string()
}

fn default_edit_iso_field() -> String {
    "EDITDATE".to_string()
}

fn default_drinking_water_field() -> String {
    "DW".to_string()
}

fn default_wastewater_field() -> String {
    "WW".to_string()
}

/// Which side wins when a per-call parameter collides with a fixed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precedence {
    CallWins,
    FixedWins,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDescriptor {
    pub url: String,
    #[serde(default)]
    pub static_params: BTreeMap<String, Value>,
    #[serde(default)]
    pub dynamic_params: Vec<String>,
    #[serde(default = "default_provider_field")]
    pub provider_field: String,
}

impl LayerDescriptor {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            static_params: BTreeMap::new(),
            dynamic_params: Vec::new(),
            provider_field: default_provider_field(),
        }
    }

    pub fn with_static_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.static_params.insert(key.to_string(), value.into());
        self
    }

    pub fn with_dynamic_params(mut self, names: &[&str]) -> Self {
        self.dynamic_params = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_provider_field(mut self, field: &str) -> Self {
        self.provider_field = field.to_string();
        self
    }

    /// Fixed parameters first (sorted by name), then per-call ones.
    pub fn query_params(&self, call: QueryParams, precedence: Precedence) -> QueryParams {
        let mut merged: QueryParams = self
            .static_params
            .iter()
            .map(|(key, value)| (key.clone(), param_text(value)))
            .collect();

        for (key, value) in call {
            if !self.dynamic_params.is_empty() && !self.dynamic_params.contains(&key) {
                tracing::debug!("Parameter '{}' is not declared dynamic for {}", key, self.url);
            }
            match merged.iter_mut().find(|(existing, _)| *existing == key) {
                Some(slot) if precedence == Precedence::CallWins => slot.1 = value,
                Some(_) => {}
                None => merged.push((key, value)),
            }
        }

        merged
    }

    fn validate_as(&self, name: &str) -> Result<()> {
        validate_url(&format!("{}.url", name), &self.url)?;
        validate_non_empty_string(&format!("{}.provider_field", name), &self.provider_field)?;
        validate_disjoint(
            &format!("{}.dynamic_params", name),
            self.static_params.keys(),
            &self.dynamic_params,
        )
    }
}

fn param_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ancillary well/septic dataset vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WellSepticSchema {
    /// Free-text drinking-water and wastewater codes.
    DrinkingWaterCodes {
        #[serde(default = "default_drinking_water_field")]
        drinking_water_field: String,
        #[serde(default = "default_wastewater_field")]
        wastewater_field: String,
    },
    /// Truthy/falsy well and septic flag columns.
    FlagScan {
        well_field: String,
        septic_field: String,
        #[serde(default)]
        well_use_field: Option<String>,
    },
}

impl Default for WellSepticSchema {
    fn default() -> Self {
        WellSepticSchema::DrinkingWaterCodes {
            drinking_water_field: default_drinking_water_field(),
            wastewater_field: default_wastewater_field(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellSepticFields {
    #[serde(default = "default_parcel_field")]
    pub parcel_field: String,
    #[serde(default = "default_alt_key_field")]
    pub alt_key_field: String,
    #[serde(default = "default_edit_epoch_field")]
    pub edit_epoch_field: String,
    #[serde(default = "default_edit_iso_field")]
    pub edit_iso_field: String,
    #[serde(default)]
    pub schema: WellSepticSchema,
}

impl Default for WellSepticFields {
    fn default() -> Self {
        Self {
            parcel_field: default_parcel_field(),
            alt_key_field: default_alt_key_field(),
            edit_epoch_field: default_edit_epoch_field(),
            edit_iso_field: default_edit_iso_field(),
            schema: WellSepticSchema::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtilityKind {
    Electric,
    Water,
    Sewer,
}

impl UtilityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UtilityKind::Electric => "electric",
            UtilityKind::Water => "water",
            UtilityKind::Sewer => "sewer",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JurisdictionConfig {
    #[serde(default = "default_id_field")]
    pub id_field: String,
    #[serde(default = "default_address_field")]
    pub address_field: String,
    pub parcel_layer: LayerDescriptor,
    #[serde(default)]
    pub electric_territory_layer: Option<LayerDescriptor>,
    #[serde(default)]
    pub water_layer: Option<LayerDescriptor>,
    #[serde(default)]
    pub sewer_layer: Option<LayerDescriptor>,
    #[serde(default)]
    pub wells_layer: Option<LayerDescriptor>,
    #[serde(default)]
    pub well_septic: WellSepticFields,
}

impl JurisdictionConfig {
    pub fn new(parcel_layer: LayerDescriptor) -> Self {
        Self {
            id_field: default_id_field(),
            address_field: default_address_field(),
            parcel_layer,
            electric_territory_layer: None,
            water_layer: None,
            sewer_layer: None,
            wells_layer: None,
            well_septic: WellSepticFields::default(),
        }
    }

    pub fn utility_layer(&self, kind: UtilityKind) -> Option<&LayerDescriptor> {
        match kind {
            UtilityKind::Electric => self.electric_territory_layer.as_ref(),
            UtilityKind::Water => self.water_layer.as_ref(),
            UtilityKind::Sewer => self.sewer_layer.as_ref(),
        }
    }

    fn validate_as(&self, key: &str) -> Result<()> {
        validate_non_empty_string(&format!("{}.id_field", key), &self.id_field)?;
        validate_non_empty_string(&format!("{}.address_field", key), &self.address_field)?;
        self.parcel_layer.validate_as(&format!("{}.parcel_layer", key))?;

        let optional = [
            ("electric_territory_layer", &self.electric_territory_layer),
            ("water_layer", &self.water_layer),
            ("sewer_layer", &self.sewer_layer),
            ("wells_layer", &self.wells_layer),
        ];
        for (name, layer) in optional {
            if let Some(layer) = layer {
                layer.validate_as(&format!("{}.{}", key, name))?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    entries: HashMap<String, JurisdictionConfig>,
}

impl Catalogue {
    /// Keys are lower-cased; every entry is validated.
    pub fn new(entries: HashMap<String, JurisdictionConfig>) -> Result<Self> {
        let catalogue = Self {
            entries: entries
                .into_iter()
                .map(|(key, cfg)| (key.trim().to_lowercase(), cfg))
                .collect(),
        };
        catalogue.validate()?;
        Ok(catalogue)
    }

    /// 依副檔名載入 (.json 或 .toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        let entries: HashMap<String, JurisdictionConfig> =
            serde_json::from_str(&processed).map_err(|e| UtilityError::ConfigValidationError {
                field: "catalogue".to_string(),
                message: format!("JSON parsing error: {}", e),
            })?;
        Self::new(entries)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        let entries: HashMap<String, JurisdictionConfig> =
            toml::from_str(&processed).map_err(|e| UtilityError::ConfigValidationError {
                field: "catalogue".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;
        Self::new(entries)
    }

    /// Tries the slug variants of `place` against `state`; first hit wins.
    pub fn lookup(&self, place: &str, state: &str) -> Option<&JurisdictionConfig> {
        candidate_keys(place, state)
            .iter()
            .find_map(|key| self.entries.get(key))
    }

    /// Entries of `other` replace same-key entries of `self`.
    pub fn merged_with(mut self, other: Catalogue) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn get(&self, key: &str) -> Option<&JurisdictionConfig> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Validate for Catalogue {
    fn validate(&self) -> Result<()> {
        for (key, cfg) in &self.entries {
            cfg.validate_as(key)?;
        }
        Ok(())
    }
}

/// Lower-case ASCII slug: accented letters are transliterated first
/// ("Doña Ana" -> `dona-ana`), then runs of anything non-alphanumeric
/// become one `-`.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text);
    let mut slug = String::with_capacity(ascii.len());
    let mut pending_dash = false;

    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

/// Hyphenated, hyphens stripped, hyphens as underscores; duplicates removed.
pub fn candidate_keys(place: &str, state: &str) -> Vec<String> {
    let slug = slugify(place);
    let state = state.trim().to_lowercase();
    if slug.is_empty() || state.is_empty() {
        return Vec::new();
    }

    let mut keys = Vec::with_capacity(3);
    for variant in [slug.clone(), slug.replace('-', ""), slug.replace('-', "_")] {
        let key = format!("{}_{}", variant, state);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
