use crate::utils::error::{Result, UtilityError};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(UtilityError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(()),
            "http" | "https" => Err(UtilityError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: "URL has no host".to_string(),
            }),
            scheme => Err(UtilityError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(UtilityError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_file_extensions(
    field_name: &str,
    files: &[String],
    allowed_extensions: &[&str],
) -> Result<()> {
    let allowed_set: HashSet<&str> = allowed_extensions.iter().copied().collect();

    for file in files {
        let extension = std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension {
            Some(ext) if allowed_set.contains(ext.as_str()) => {}
            Some(ext) => {
                return Err(UtilityError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: file.clone(),
                    reason: format!(
                        "Unsupported file extension: {}. Allowed extensions: {}",
                        ext,
                        allowed_extensions.join(", ")
                    ),
                });
            }
            None => {
                return Err(UtilityError::InvalidConfigValueError {
                    field: field_name.to_string(),
                    value: file.clone(),
                    reason: "File has no extension or invalid filename".to_string(),
                });
            }
        }
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(UtilityError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// Fails on the first name present in both sets.
pub fn validate_disjoint<'a, A, B>(field_name: &str, fixed: A, dynamic: B) -> Result<()>
where
    A: IntoIterator<Item = &'a String>,
    B: IntoIterator<Item = &'a String>,
{
    let fixed: HashSet<&str> = fixed.into_iter().map(String::as_str).collect();
    for name in dynamic {
        if fixed.contains(name.as_str()) {
            return Err(UtilityError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: name.clone(),
                reason: "Parameter is both fixed and dynamic".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(UtilityError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("parcel_layer.url", "https://example.com/arcgis/rest/services/0/query").is_ok());
        assert!(validate_url("parcel_layer.url", "http://example.com").is_ok());
        assert!(validate_url("parcel_layer.url", "").is_err());
        assert!(validate_url("parcel_layer.url", "invalid-url").is_err());
        assert!(validate_url("parcel_layer.url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_disjoint() {
        let fixed = vec!["f".to_string(), "outFields".to_string()];
        let dynamic = vec!["where".to_string(), "outSR".to_string()];
        assert!(validate_disjoint("layer", &fixed, &dynamic).is_ok());

        let clashing = vec!["where".to_string(), "f".to_string()];
        let err = validate_disjoint("layer", &fixed, &clashing).unwrap_err();
        assert!(err.to_string().contains("'f'"));
    }

    #[test]
    fn test_validate_file_extensions() {
        let files = vec!["parcels.csv".to_string(), "PARCELS.CSV".to_string()];
        assert!(validate_file_extensions("input", &files, &["csv"]).is_ok());

        let invalid_files = vec!["parcels.xlsx".to_string()];
        assert!(validate_file_extensions("input", &invalid_files, &["csv"]).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("transport.read_timeout_secs", 30.0, 0.1, 600.0).is_ok());
        assert!(validate_range("transport.read_timeout_secs", 0.0, 0.1, 600.0).is_err());
    }
}
