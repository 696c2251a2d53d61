use crate::domain::model::ParcelQuery;
use crate::utils::error::{Result, UtilityError};
use crate::utils::validation::{validate_file_extensions, validate_non_empty_string, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "parcel-utils")]
#[command(about = "Resolve electric, water, sewer, well and septic service for parcels")]
pub struct CliConfig {
    /// Path to the engine TOML configuration
    #[arg(short, long, default_value = "parcel-utils.toml")]
    pub config: String,

    /// Parcel identifier (APN / STRAP)
    #[arg(long)]
    pub apn: Option<String>,

    /// Street address, used when no identifier is given
    #[arg(long)]
    pub address: Option<String>,

    /// County or place name
    #[arg(long)]
    pub place: Option<String>,

    /// Two-letter state code
    #[arg(long)]
    pub state: Option<String>,

    /// Bulk mode: input CSV with apn and street_address columns
    #[arg(long, requires = "output")]
    pub input: Option<String>,

    /// Bulk mode: output CSV
    #[arg(long, requires = "input")]
    pub output: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit JSON log lines
    #[arg(long)]
    pub log_json: bool,

    /// Resolve the service host over IPv4 only
    #[arg(long)]
    pub force_ipv4: bool,
}

impl CliConfig {
    pub fn is_bulk(&self) -> bool {
        self.input.is_some()
    }

    /// The single lookup described by the flags, if any.
    pub fn single_query(&self) -> Option<ParcelQuery> {
        Some(ParcelQuery::new(
            self.apn.clone().unwrap_or_default(),
            self.address.clone(),
            self.place.clone()?,
            self.state.clone()?,
        ))
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("config", &self.config)?;

        if let (Some(input), Some(output)) = (&self.input, &self.output) {
            return validate_file_extensions("input/output", &[input.clone(), output.clone()], &["csv"]);
        }

        let place = self.place.as_deref().ok_or_else(|| UtilityError::MissingConfigError {
            field: "--place".to_string(),
        })?;
        let state = self.state.as_deref().ok_or_else(|| UtilityError::MissingConfigError {
            field: "--state".to_string(),
        })?;
        validate_non_empty_string("--place", place)?;
        validate_non_empty_string("--state", state)?;

        let has_apn = self.apn.as_deref().is_some_and(|v| !v.trim().is_empty());
        let has_address = self.address.as_deref().is_some_and(|v| !v.trim().is_empty());
        if !has_apn && !has_address {
            return Err(UtilityError::ValidationError {
                message: "Either --apn or --address is required".to_string(),
            });
        }
        Ok(())
    }
}
