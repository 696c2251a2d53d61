pub mod catalogue;
#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

use regex::Regex;
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// 替換環境變數 (例如 ${ESRI_BASE_URL})；未設定的保留原樣
pub(crate) fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PARCEL_UTILS_TEST_HOST", "gis.example.com");

        let out = substitute_env_vars("url = \"https://${PARCEL_UTILS_TEST_HOST}/0/query\"");
        assert_eq!(out, "url = \"https://gis.example.com/0/query\"");

        let untouched = substitute_env_vars("url = \"${PARCEL_UTILS_UNSET_VAR}\"");
        assert_eq!(untouched, "url = \"${PARCEL_UTILS_UNSET_VAR}\"");

        std::env::remove_var("PARCEL_UTILS_TEST_HOST");
    }
}
