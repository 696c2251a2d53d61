use crate::config::catalogue::{LayerDescriptor, Precedence};
use crate::core::executor::QueryExecutor;
use crate::domain::model::{Feature, Point};
use crate::domain::ports::Transport;
use crate::utils::error::{Result, UtilityError};
use serde_json::Value;

/// Single-quoted SQL string literal with embedded quotes doubled.
pub(crate) fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Exact identifier match when an identifier is given, else a
/// case-insensitive prefix match on the site address.
pub fn parcel_filter(
    identifier: &str,
    address: Option<&str>,
    id_field: &str,
    address_field: &str,
) -> Option<String> {
    let identifier = identifier.trim();
    if !identifier.is_empty() {
        return Some(format!("{}={}", id_field, sql_literal(identifier)));
    }

    let address = address.map(str::trim).filter(|a| !a.is_empty())?;
    let (prefix, escaped) = like_prefix(&address.to_uppercase());
    let mut filter = format!(
        "UPPER({}) LIKE {}",
        address_field,
        sql_literal(&format!("{}%", prefix))
    );
    if escaped {
        filter.push_str(" ESCAPE '\\'");
    }
    Some(filter)
}

/// `%` and `_` in the address match literally; `\` is the escape character.
fn like_prefix(text: &str) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut escaped = false;
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
            escaped = true;
        }
        out.push(c);
    }
    (out, escaped)
}

/// Locates the parcel and returns a representative WGS84 point.
///
/// `Ok(None)` when nothing matches or the geometry cannot be read;
/// upstream failures are returned as errors.
pub async fn resolve_geometry<T: Transport>(
    executor: &QueryExecutor<T>,
    layer: &LayerDescriptor,
    identifier: &str,
    address: Option<&str>,
    id_field: &str,
    address_field: &str,
) -> Result<Option<Point>> {
    let Some(filter) = parcel_filter(identifier, address, id_field, address_field) else {
        tracing::debug!("No identifier or address, skipping parcel query");
        return Ok(None);
    };

    let params = layer.query_params(
        vec![
            ("where".to_string(), filter),
            ("returnGeometry".to_string(), "true".to_string()),
            ("outSR".to_string(), Point::WKID.to_string()),
        ],
        Precedence::CallWins,
    );

    let features = match executor.query_features(layer, &params).await {
        Ok(set) => set.features,
        Err(UtilityError::MalformedResponse { message }) => {
            tracing::warn!("Parcel layer returned malformed data: {}", message);
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let Some(feature) = features.first() else {
        tracing::info!("🔍 Parcel not found (identifier '{}')", identifier);
        return Ok(None);
    };

    let point = representative_point(feature);
    if point.is_none() {
        tracing::warn!("Parcel feature has no usable geometry");
    }
    Ok(point)
}

/// Precomputed centroid if present, a point geometry as-is, otherwise the
/// first vertex of the first ring. That vertex lies on the parcel boundary.
pub fn representative_point(feature: &Feature) -> Option<Point> {
    let geometry = feature.geometry.as_ref()?;

    if let Some(centroid) = geometry.get("centroid").and_then(coordinate) {
        return Some(centroid);
    }
    if let Some(point) = coordinate(geometry) {
        return Some(point);
    }

    geometry
        .get("rings")?
        .as_array()?
        .first()?
        .as_array()?
        .first()
        .and_then(coordinate)
}

/// `[x, y]` or `{"x": .., "y": ..}`.
fn coordinate(value: &Value) -> Option<Point> {
    let (x, y) = match value {
        Value::Array(pair) if pair.len() >= 2 => (pair[0].as_f64()?, pair[1].as_f64()?),
        Value::Object(obj) => (obj.get("x")?.as_f64()?, obj.get("y")?.as_f64()?),
        _ => return None,
    };
    (x.is_finite() && y.is_finite()).then(|| Point::new(x, y))
}
