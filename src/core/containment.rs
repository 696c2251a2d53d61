use crate::config::catalogue::{LayerDescriptor, Precedence};
use crate::core::executor::QueryExecutor;
use crate::domain::model::Point;
use crate::domain::ports::Transport;
use crate::utils::error::{Result, UtilityError};

fn spatial_params(point: &Point) -> Vec<(String, String)> {
    vec![
        ("geometry".to_string(), point.to_esri_json()),
        ("geometryType".to_string(), "esriGeometryPoint".to_string()),
        ("inSR".to_string(), Point::WKID.to_string()),
        ("spatialRel".to_string(), "esriSpatialRelIntersects".to_string()),
        ("returnGeometry".to_string(), "false".to_string()),
    ]
}

/// Point-in-polygon query; the provider field of the first hit.
///
/// Fixed layer parameters win over the spatial ones on collision.
/// `Ok(None)` when nothing intersects or the response is unreadable.
pub async fn resolve_containment<T: Transport>(
    executor: &QueryExecutor<T>,
    layer: &LayerDescriptor,
    point: &Point,
) -> Result<Option<String>> {
    let params = layer.query_params(spatial_params(point), Precedence::FixedWins);

    let features = match executor.query_features(layer, &params).await {
        Ok(set) => set.features,
        Err(UtilityError::MalformedResponse { message }) => {
            tracing::warn!("Malformed response from {}: {}", layer.url, message);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    Ok(features
        .first()
        .and_then(|feature| feature.attribute_text(&layer.provider_field)))
}
