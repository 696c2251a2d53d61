use crate::utils::error::TransportError;
use async_trait::async_trait;

/// Query-string parameters in the order they are sent.
pub type QueryParams = Vec<(String, String)>;

/// One GET against the geospatial service, decoded as JSON.
///
/// Implementations must be safe to share between concurrent resolutions.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> std::result::Result<serde_json::Value, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn get_json(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> std::result::Result<serde_json::Value, TransportError> {
        (**self).get_json(url, params).await
    }
}
