use thiserror::Error;

#[derive(Error, Debug)]
pub enum UtilityError {
    #[error("No catalogue entry for '{place}' ({state})")]
    ConfigurationNotFound { place: String, state: String },

    #[error("Upstream query to {url} failed: {reason}")]
    Upstream { url: String, reason: String },

    #[error("Malformed upstream response: {message}")]
    MalformedResponse { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

/// Failure classes of a single HTTP exchange with the geospatial service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("connect timeout")]
    ConnectTimeout,

    #[error("read timeout")]
    ReadTimeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection reset mid-stream: {0}")]
    StreamReset(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Only these are worth an application-level retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectTimeout
                | TransportError::ReadTimeout
                | TransportError::StreamReset(_)
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            TransportError::Status(status.as_u16())
        } else if e.is_timeout() {
            if e.is_connect() {
                TransportError::ConnectTimeout
            } else {
                TransportError::ReadTimeout
            }
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if e.is_body() || (e.is_request() && !e.is_builder()) {
            TransportError::StreamReset(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Upstream,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl UtilityError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            UtilityError::ConfigurationNotFound { .. }
            | UtilityError::ConfigValidationError { .. }
            | UtilityError::InvalidConfigValueError { .. }
            | UtilityError::MissingConfigError { .. } => ErrorCategory::Configuration,
            UtilityError::Upstream { .. } | UtilityError::ApiError(_) => ErrorCategory::Upstream,
            UtilityError::MalformedResponse { .. }
            | UtilityError::CsvError(_)
            | UtilityError::SerializationError(_)
            | UtilityError::ValidationError { .. } => ErrorCategory::Data,
            UtilityError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 資料不足，不是系統故障
            UtilityError::ConfigurationNotFound { .. } => ErrorSeverity::Low,
            UtilityError::Upstream { .. } | UtilityError::ApiError(_) => ErrorSeverity::Medium,
            UtilityError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the catalogue for the county/state key and the settings file"
            }
            ErrorCategory::Upstream => "The geospatial service may be down; retry later",
            ErrorCategory::Data => "Check the input file columns and values",
            ErrorCategory::System => "Check file paths and permissions",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            UtilityError::ConfigurationNotFound { place, state } => format!(
                "Insufficient data: no utility layers are registered for {}, {}",
                place, state
            ),
            UtilityError::Upstream { .. } => {
                "The parcel service is not responding; no utility data could be resolved"
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UtilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classes() {
        assert!(TransportError::ConnectTimeout.is_transient());
        assert!(TransportError::ReadTimeout.is_transient());
        assert!(TransportError::StreamReset("reset".into()).is_transient());
        assert!(!TransportError::Connect("refused".into()).is_transient());
        assert!(!TransportError::Status(500).is_transient());
        assert!(!TransportError::Decode("bad json".into()).is_transient());
    }

    #[test]
    fn test_not_found_is_low_severity() {
        let e = UtilityError::ConfigurationNotFound {
            place: "Nowhere".into(),
            state: "FL".into(),
        };
        assert_eq!(e.category(), ErrorCategory::Configuration);
        assert_eq!(e.severity(), ErrorSeverity::Low);
        assert!(e.user_friendly_message().starts_with("Insufficient data"));
    }
}
