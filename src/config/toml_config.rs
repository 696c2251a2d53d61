use crate::config::catalogue::{Catalogue, JurisdictionConfig};
use crate::config::substitute_env_vars;
use crate::utils::error::{Result, UtilityError};
use crate::utils::validation::{validate_range, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

fn default_connect_timeout() -> f64 {
    10.0
}

fn default_read_timeout() -> f64 {
    30.0
}

fn default_write_timeout() -> f64 {
    10.0
}

fn default_pool_timeout() -> f64 {
    60.0
}

fn default_transport_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    "curl/8.5.0".to_string()
}

fn default_max_retries() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    300
}

fn default_jitter_ms() -> u64 {
    250
}

/// Shared HTTP client settings for the geospatial service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: f64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: f64,
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: f64,
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: f64,
    /// Immediate re-dials on connection failure, below the retry policy.
    #[serde(default = "default_transport_retries")]
    pub retries: u32,
    #[serde(default)]
    pub force_ipv4_dns: bool,
    /// Honor HTTP(S)_PROXY and friends.
    #[serde(default)]
    pub trust_env: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            pool_timeout_secs: default_pool_timeout(),
            retries: default_transport_retries(),
            force_ipv4_dns: false,
            trust_env: false,
            user_agent: default_user_agent(),
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.write_timeout_secs)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.pool_timeout_secs)
    }

    /// ESRI_* 環境變數覆蓋設定
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_value("ESRI_CONNECT_TIMEOUT") {
            self.connect_timeout_secs = v;
        }
        if let Some(v) = env_value("ESRI_READ_TIMEOUT") {
            self.read_timeout_secs = v;
        }
        if let Some(v) = env_value("ESRI_WRITE_TIMEOUT") {
            self.write_timeout_secs = v;
        }
        if let Some(v) = env_value("ESRI_POOL_TIMEOUT") {
            self.pool_timeout_secs = v;
        }
        if let Some(v) = env_value("ESRI_RETRIES") {
            self.retries = v;
        }
        if let Some(v) = env_flag("ESRI_FORCE_IPV4_DNS") {
            self.force_ipv4_dns = v;
        }
        if let Some(v) = env_flag("ESRI_TRUST_ENV") {
            self.trust_env = v;
        }
    }
}

impl Validate for TransportConfig {
    fn validate(&self) -> Result<()> {
        validate_range("transport.connect_timeout_secs", self.connect_timeout_secs, 0.1, 600.0)?;
        validate_range("transport.read_timeout_secs", self.read_timeout_secs, 0.1, 600.0)?;
        validate_range("transport.write_timeout_secs", self.write_timeout_secs, 0.1, 600.0)?;
        validate_range("transport.pool_timeout_secs", self.pool_timeout_secs, 0.1, 3600.0)?;
        validate_range("transport.retries", self.retries, 0, 10)
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={}", name, raw);
            None
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
}

/// Application-level retry for transient network failures; at most one extra attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl Validate for RetryConfig {
    fn validate(&self) -> Result<()> {
        validate_range("retry.max_retries", self.max_retries, 0, 1)?;
        validate_range("retry.base_delay_ms", self.base_delay_ms, 0, 60_000)?;
        validate_range("retry.jitter_ms", self.jitter_ms, 0, 60_000)
    }
}

/// Engine settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// TOML or JSON catalogue, relative to the settings file.
    pub catalogue_path: Option<String>,
    /// Inline entries; these win over same-key entries from `catalogue_path`.
    #[serde(default)]
    pub jurisdictions: HashMap<String, JurisdictionConfig>,
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl EngineConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(UtilityError::IoError)?;
        let mut config = Self::from_toml_str(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| UtilityError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    pub fn catalogue_file(&self) -> Option<PathBuf> {
        let path = PathBuf::from(self.catalogue_path.as_ref()?);
        match &self.base_dir {
            Some(dir) if path.is_relative() => Some(dir.join(path)),
            _ => Some(path),
        }
    }

    /// Builds the read-only catalogue from the file and inline entries.
    pub fn load_catalogue(&self) -> Result<Catalogue> {
        let inline = Catalogue::new(self.jurisdictions.clone())?;

        let catalogue = match self.catalogue_file() {
            Some(file) => {
                tracing::debug!("Loading catalogue from {}", file.display());
                Catalogue::from_file(&file)?.merged_with(inline)
            }
            None => inline,
        };

        if catalogue.is_empty() {
            return Err(UtilityError::MissingConfigError {
                field: "catalogue_path or [jurisdictions]".to_string(),
            });
        }
        Ok(catalogue)
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> Result<()> {
        self.transport.validate()?;
        self.retry.validate()
    }
}
