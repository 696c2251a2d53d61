use crate::config::catalogue::{Catalogue, JurisdictionConfig, UtilityKind};
use crate::config::toml_config::EngineConfig;
use crate::core::containment::resolve_containment;
use crate::core::executor::{QueryExecutor, RetryPolicy};
use crate::core::geometry::resolve_geometry;
use crate::core::transport::HttpTransport;
use crate::core::well_septic::fetch_well_septic;
use crate::domain::model::{ParcelQuery, Point, ServiceAvailability, UtilityProfile, WellSepticStatus};
use crate::domain::ports::Transport;
use crate::utils::error::{Result, UtilityError};
use std::sync::Arc;

type NetworkServices = (ServiceAvailability, ServiceAvailability, ServiceAvailability);

/// Resolves a parcel's utility profile against the catalogue.
///
/// Every field degrades on its own; the only errors are an unknown
/// jurisdiction and an upstream outage that leaves nothing to report.
pub struct UtilityResolver<T: Transport> {
    catalogue: Arc<Catalogue>,
    executor: QueryExecutor<T>,
}

impl UtilityResolver<HttpTransport> {
    /// Builds the shared transport; run once at startup.
    pub fn initialize(config: &EngineConfig, catalogue: Arc<Catalogue>) -> Result<Self> {
        let transport = HttpTransport::initialize(&config.transport)?;
        Ok(Self::new(catalogue, transport, RetryPolicy::from(&config.retry)))
    }

    /// Releases the transport; run once at exit.
    pub fn shutdown(self) {
        self.executor.into_transport().shutdown();
    }
}

impl<T: Transport> UtilityResolver<T> {
    pub fn new(catalogue: Arc<Catalogue>, transport: T, policy: RetryPolicy) -> Self {
        Self {
            catalogue,
            executor: QueryExecutor::new(transport, policy),
        }
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn transport(&self) -> &T {
        self.executor.transport()
    }

    #[tracing::instrument(
        name = "resolve",
        skip_all,
        fields(apn = %query.apn, jurisdiction = %query.jurisdiction, state = %query.state)
    )]
    pub async fn resolve(&self, query: &ParcelQuery) -> Result<UtilityProfile> {
        let cfg = self
            .catalogue
            .lookup(&query.jurisdiction, &query.state)
            .ok_or_else(|| UtilityError::ConfigurationNotFound {
                place: query.jurisdiction.clone(),
                state: query.state.clone(),
            })?;

        let apn = query.apn.trim();
        let (services, well_septic) = tokio::join!(
            self.resolve_network_services(cfg, apn, query.street_address.as_deref()),
            self.resolve_well_septic(cfg, apn),
        );

        let (electric, water, sewer) = match services {
            Ok(services) => services,
            Err(e) if matches!(well_septic, Some(Ok(_))) => {
                tracing::warn!("⚠️ Parcel query failed for '{}', reporting well/septic only: {}", apn, e);
                Default::default()
            }
            Err(e) => {
                tracing::error!("❌ Parcel query failed for '{}': {}", apn, e);
                return Err(e);
            }
        };

        let well_septic = match well_septic {
            Some(Ok(status)) => Some(status),
            Some(Err(e)) => {
                tracing::warn!("⚠️ Well/septic lookup failed for '{}': {}", apn, e);
                None
            }
            None => None,
        };

        let profile = UtilityProfile::assemble(apn, electric, water, sewer, well_septic);
        tracing::info!(
            "✅ {} ({}, {}): electric={} water={} sewer={} well={:?} septic={:?}",
            apn,
            query.jurisdiction,
            query.state,
            profile.electric_available,
            profile.water_available,
            profile.sewer_available,
            profile.well_available,
            profile.septic_present
        );
        Ok(profile)
    }

    /// Parcel point first, then the three containment queries together.
    async fn resolve_network_services(
        &self,
        cfg: &JurisdictionConfig,
        apn: &str,
        address: Option<&str>,
    ) -> Result<NetworkServices> {
        let point = resolve_geometry(
            &self.executor,
            &cfg.parcel_layer,
            apn,
            address,
            &cfg.id_field,
            &cfg.address_field,
        )
        .await?;

        let Some(point) = point else {
            return Ok(Default::default());
        };

        Ok(tokio::join!(
            self.service_at(cfg, UtilityKind::Electric, &point),
            self.service_at(cfg, UtilityKind::Water, &point),
            self.service_at(cfg, UtilityKind::Sewer, &point),
        ))
    }

    async fn service_at(
        &self,
        cfg: &JurisdictionConfig,
        kind: UtilityKind,
        point: &Point,
    ) -> ServiceAvailability {
        let Some(layer) = cfg.utility_layer(kind) else {
            return ServiceAvailability::unavailable();
        };

        match resolve_containment(&self.executor, layer, point).await {
            Ok(provider) => ServiceAvailability::from_provider(provider),
            Err(e) => {
                tracing::warn!("⚠️ {} lookup degraded: {}", kind.as_str(), e);
                ServiceAvailability::unavailable()
            }
        }
    }

    async fn resolve_well_septic(
        &self,
        cfg: &JurisdictionConfig,
        apn: &str,
    ) -> Option<Result<WellSepticStatus>> {
        let layer = cfg.wells_layer.as_ref()?;
        Some(fetch_well_septic(&self.executor, layer, apn, &cfg.well_septic).await)
    }
}
