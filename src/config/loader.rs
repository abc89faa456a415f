//! Configuration loader with environment variable expansion

use super::{Config, ConfigError};
use lazy_static::lazy_static;
use regex_lite::Regex;
use std::path::Path;

lazy_static! {
    // ${VAR} or ${VAR:-default}
    static ref ENV_VAR: Regex =
        Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}").unwrap();
}

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = Self::expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Expand `${VAR}` and `${VAR:-default}`
    ///
    /// A variable that is unset and has no default keeps its placeholder, so
    /// validation reports it instead of silently using an empty string.
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex_lite::Captures<'_>| {
                match std::env::var(&caps[1]) {
                    Ok(value) => value,
                    Err(_) => match caps.get(2) {
                        Some(default) => default.as_str().to_string(),
                        None => caps[0].to_string(),
                    },
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_expand_env_vars() {
        std::env::set_var("AUTHZ_GATE_TEST_VAR", "test_value");
        let expanded = ConfigLoader::expand_env_vars("key: ${AUTHZ_GATE_TEST_VAR}");
        assert_eq!(expanded, "key: test_value");
        std::env::remove_var("AUTHZ_GATE_TEST_VAR");
    }

    #[test]
    #[serial]
    fn test_expand_env_vars_default() {
        std::env::remove_var("AUTHZ_GATE_MISSING");
        let expanded = ConfigLoader::expand_env_vars("url: ${AUTHZ_GATE_MISSING:-http://opa:8181}");
        assert_eq!(expanded, "url: http://opa:8181");
    }

    #[test]
    #[serial]
    fn test_unset_var_keeps_placeholder() {
        std::env::remove_var("AUTHZ_GATE_MISSING");
        let expanded = ConfigLoader::expand_env_vars("url: ${AUTHZ_GATE_MISSING}");
        assert_eq!(expanded, "url: ${AUTHZ_GATE_MISSING}");
    }
}
