//! 批次查詢：CSV 輸入，逐列解析後輸出 CSV。

use crate::core::resolver::UtilityResolver;
use crate::domain::model::{ParcelQuery, UtilityProfile};
use crate::domain::ports::Transport;
use crate::utils::error::{Result, UtilityError};
use crate::utils::validation::validate_file_extensions;
use csv::StringRecord;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const APN_COLUMN: &str = "apn";
const ADDRESS_COLUMN: &str = "street_address";
const PLACE_COLUMNS: [&str; 3] = ["county", "place", "jurisdiction"];
const STATE_COLUMN: &str = "state";

/// Counts for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub rows_read: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// A query row, or the reason it cannot be resolved.
pub type RowOutcome = std::result::Result<ParcelQuery, String>;

pub struct BulkLookup<'a, T: Transport> {
    resolver: &'a UtilityResolver<T>,
    default_place: Option<String>,
    default_state: Option<String>,
}

impl<'a, T: Transport> BulkLookup<'a, T> {
    pub fn new(resolver: &'a UtilityResolver<T>) -> Self {
        Self {
            resolver,
            default_place: None,
            default_state: None,
        }
    }

    /// Place/state used for rows that don't carry their own.
    pub fn with_defaults(mut self, place: Option<String>, state: Option<String>) -> Self {
        self.default_place = place;
        self.default_state = state;
        self
    }

    pub async fn run(&self, input: &Path, output: &Path) -> Result<BulkReport> {
        for path in [input, output] {
            validate_file_extensions("bulk_file", &[path.display().to_string()], &["csv"])?;
        }

        tracing::info!("📥 Reading parcels from {}", input.display());
        let rows = self.read_rows(std::fs::File::open(input)?)?;

        let mut report = BulkReport {
            rows_read: rows.len(),
            ..BulkReport::default()
        };
        let mut profiles = Vec::with_capacity(rows.len());

        for (line, row) in rows {
            let query = match row {
                Ok(query) => query,
                Err(reason) => {
                    tracing::warn!("⚠️ Row {} skipped: {}", line, reason);
                    report.skipped += 1;
                    continue;
                }
            };

            match self.resolver.resolve(&query).await {
                Ok(profile) => {
                    report.resolved += 1;
                    profiles.push(profile);
                }
                Err(e @ UtilityError::ConfigurationNotFound { .. }) => {
                    tracing::warn!("⚠️ Row {} skipped: {}", line, e);
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Row {} failed: {}", line, e);
                    report.failed += 1;
                }
            }
        }

        write_profiles(output, &profiles)?;
        tracing::info!(
            "📁 {} profiles written to {} ({} skipped, {} failed)",
            report.resolved,
            output.display(),
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    /// Parses rows into queries keyed by their 1-based data line.
    pub fn read_rows<R: Read>(&self, source: R) -> Result<Vec<(usize, RowOutcome)>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(source);

        let header_map = build_header_map(reader.headers()?);
        for required in [APN_COLUMN, ADDRESS_COLUMN] {
            if !header_map.contains_key(required) {
                return Err(UtilityError::ValidationError {
                    message: format!("Missing required column: `{}`", required),
                });
            }
        }
        let place_idx = PLACE_COLUMNS.iter().find_map(|c| header_map.get(*c).copied());
        let state_idx = header_map.get(STATE_COLUMN).copied();

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record?;
            let field = |i: Option<usize>| {
                i.and_then(|i| record.get(i))
                    .map(str::to_string)
                    .filter(|v| !v.is_empty())
            };

            let apn = field(header_map.get(APN_COLUMN).copied()).unwrap_or_default();
            let address = field(header_map.get(ADDRESS_COLUMN).copied());
            let place = field(place_idx).or_else(|| self.default_place.clone());
            let state = field(state_idx).or_else(|| self.default_state.clone());

            let outcome = match (place, state) {
                (Some(place), Some(state)) => Ok(ParcelQuery::new(apn, address, place, state)),
                (None, _) => Err("no county/place given".to_string()),
                (_, None) => Err("no state given".to_string()),
            };
            rows.push((idx + 1, outcome));
        }
        Ok(rows)
    }
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), idx))
        .collect()
}

fn write_profiles(output: &Path, profiles: &[UtilityProfile]) -> Result<()> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(output)?;
    for profile in profiles {
        writer.serialize(profile)?;
    }
    writer.flush()?;
    Ok(())
}
