//! Shared reqwest client for the geospatial service.
//!
//! One [`HttpTransport`] is built at startup and handed to the resolver;
//! its connection pool is the only shared mutable state in the engine.

use crate::config::toml_config::TransportConfig;
use crate::domain::ports::Transport;
use crate::utils::error::{Result, TransportError};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::net::SocketAddr;
use std::sync::Arc;

/// A records only when there are any, like `curl -4`; otherwise the
/// addresses come back untouched.
fn prefer_ipv4(addrs: Vec<SocketAddr>) -> Vec<SocketAddr> {
    if addrs.iter().any(SocketAddr::is_ipv4) {
        addrs.into_iter().filter(SocketAddr::is_ipv4).collect()
    } else {
        addrs
    }
}

/// Installed on the client itself, so it never affects resolution done by
/// anything else in the process.
#[derive(Debug, Default)]
struct Ipv4OnlyResolver;

impl Resolve for Ipv4OnlyResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host((name.as_str(), 0))
                .await?
                .collect();
            let resolved: Addrs = Box::new(prefer_ipv4(addrs).into_iter());
            Ok::<Addrs, Box<dyn std::error::Error + Send + Sync>>(resolved)
        })
    }
}

#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    connect_retries: u32,
}

impl HttpTransport {
    /// Builds the pooled client. Must run before the first resolution.
    pub fn initialize(config: &TransportConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        // reqwest has no separate write timeout; it bounds the whole exchange.
        let total = config.connect_timeout() + config.write_timeout() + config.read_timeout();

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .timeout(total)
            // No checkout timeout in reqwest; the pool knob bounds idle keep-alive.
            .pool_idle_timeout(config.pool_timeout())
            .redirect(reqwest::redirect::Policy::limited(10));

        if !config.trust_env {
            builder = builder.no_proxy();
        }
        if config.force_ipv4_dns {
            builder = builder.dns_resolver(Arc::new(Ipv4OnlyResolver));
        }

        let client = builder.build()?;
        tracing::info!(
            "🌐 Transport ready (connect {:?}, read {:?}, retries {}, ipv4-only {})",
            config.connect_timeout(),
            config.read_timeout(),
            config.retries,
            config.force_ipv4_dns
        );

        Ok(Self {
            client,
            connect_retries: config.retries,
        })
    }

    /// Releases pooled connections. Consuming `self` means nothing can
    /// issue a query through this transport afterwards.
    pub fn shutdown(self) {
        drop(self.client);
        tracing::info!("🌐 Transport shut down");
    }

    async fn send_once(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> std::result::Result<serde_json::Value, TransportError> {
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        tracing::debug!("📡 {} -> {}", url, status);

        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        url: &str,
        params: &[(String, String)],
    ) -> std::result::Result<serde_json::Value, TransportError> {
        let mut attempt = 0;
        loop {
            match self.send_once(url, params).await {
                Err(TransportError::Connect(reason)) if attempt < self.connect_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Connection to {} failed ({}), redial {}/{}",
                        url,
                        reason,
                        attempt,
                        self.connect_retries
                    );
                }
                outcome => return outcome,
            }
        }
    }
}
