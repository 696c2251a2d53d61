use crate::config::catalogue::LayerDescriptor;
use crate::config::toml_config::RetryConfig;
use crate::domain::model::FeatureSet;
use crate::domain::ports::Transport;
use crate::utils::error::{Result, TransportError, UtilityError};
use rand::Rng;
use serde_json::Value;
use std::time::Duration;

/// Bounded retry for transient failures, with linear backoff plus jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub jitter: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        self.base_delay * attempt + jitter
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
        }
    }
}

/// Runs layer queries through a [`Transport`] under a [`RetryPolicy`].
pub struct QueryExecutor<T: Transport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> QueryExecutor<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// GET `layer.url` with `params`; the JSON document on success.
    ///
    /// Transient failures are retried up to `max_retries` times. Anything
    /// else, and exhaustion, becomes [`UtilityError::Upstream`]. A 200 that
    /// carries an ArcGIS `error` object is also an upstream failure.
    pub async fn execute(&self, layer: &LayerDescriptor, params: &[(String, String)]) -> Result<Value> {
        let mut attempt = 0;
        let outcome = loop {
            match self.transport.get_json(&layer.url, params).await {
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        "⚠️ {} on {} (attempt {}), retrying in {:?}",
                        e,
                        layer.url,
                        attempt,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        };

        let document = outcome.map_err(|e| upstream(layer, &e))?;

        if let Some(error) = document.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified service error");
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            return Err(UtilityError::Upstream {
                url: layer.url.clone(),
                reason: format!("service error {}: {}", code, message),
            });
        }

        Ok(document)
    }

    /// [`execute`](Self::execute), decoded as a feature set.
    pub async fn query_features(
        &self,
        layer: &LayerDescriptor,
        params: &[(String, String)],
    ) -> Result<FeatureSet> {
        let document = self.execute(layer, params).await?;
        parse_feature_set(document)
    }
}

fn upstream(layer: &LayerDescriptor, error: &TransportError) -> UtilityError {
    UtilityError::Upstream {
        url: layer.url.clone(),
        reason: error.to_string(),
    }
}

pub fn parse_feature_set(document: Value) -> Result<FeatureSet> {
    if !document.is_object() {
        return Err(UtilityError::MalformedResponse {
            message: "response is not a JSON object".to_string(),
        });
    }
    serde_json::from_value(document).map_err(|e| UtilityError::MalformedResponse {
        message: e.to_string(),
    })
}
