pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::bulk::BulkLookup;
pub use config::catalogue::{Catalogue, JurisdictionConfig, LayerDescriptor};
pub use config::toml_config::EngineConfig;
pub use core::{HttpTransport, RetryPolicy, UtilityResolver};
pub use domain::model::{ParcelQuery, UtilityProfile};
pub use utils::error::{Result, UtilityError};
