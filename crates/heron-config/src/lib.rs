//! Configuration management for HERON
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (HERON_* prefix, `__` between section and key,
//!    e.g. `HERON_CAS__APP_SECRET`)
//! 2. heron.local.toml (never committed; holds the session secret)
//! 3. heron.toml (project config)
//! 4. ~/.config/heron/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! A configuration that fails [`HeronConfig::validate`] never leaves the
//! loader, so a missing secret or executive allow-list stops the process at
//! startup.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

const REDACTED: &str = "********";

/// Main HERON configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeronConfig {
    pub cas: CasConfig,
    pub oversight: OversightConfig,
    pub saa: SaaConfig,
    pub cache: CacheConfig,
}

/// CAS server and session cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CasConfig {
    pub base: String,
    pub app_secret: String,
    pub session_timeout_secs: u64,
    pub reissue_after_secs: u64,
    pub cookie_name: String,
    pub ticket_retention_secs: u64,
}

impl Default for CasConfig {
    fn default() -> Self {
        Self {
            base: "https://cas.example.edu/cas/".to_string(),
            app_secret: String::new(),
            session_timeout_secs: 600,
            reissue_after_secs: 60,
            cookie_name: "auth_tkt".to_string(),
            ticket_retention_secs: 600,
        }
    }
}

/// Oversight committee settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OversightConfig {
    pub project_id: u64,
    /// Must be present, even if empty.
    pub executives: Option<Vec<String>>,
    pub institutions: Vec<String>,
    pub survey_url: String,
}

impl Default for OversightConfig {
    fn default() -> Self {
        Self {
            project_id: 0,
            executives: None,
            institutions: vec!["kuh".to_string(), "kupi".to_string(), "kumc".to_string()],
            survey_url: "https://redcap.example.edu/surveys/".to_string(),
        }
    }
}

/// System access agreement survey
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaaConfig {
    pub survey_id: u64,
    pub survey_url: String,
}

impl Default for SaaConfig {
    fn default() -> Self {
        Self {
            survey_id: 0,
            survey_url: "https://redcap.example.edu/surveys/".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Training answers from file-backed directories are cached this long.
    pub training_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            training_ttl_secs: 3600,
        }
    }
}

impl HeronConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Checks everything that must hold before a validator or engine is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cas.app_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "cas.app_secret is required".to_string(),
            ));
        }
        if self.cas.reissue_after_secs >= self.cas.session_timeout_secs {
            return Err(ConfigError::ValidationError(format!(
                "cas.reissue_after_secs ({}) must be less than cas.session_timeout_secs ({})",
                self.cas.reissue_after_secs, self.cas.session_timeout_secs
            )));
        }
        if self.cas.ticket_retention_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cas.ticket_retention_secs must be greater than zero".to_string(),
            ));
        }
        if self.oversight.executives.is_none() {
            return Err(ConfigError::ValidationError(
                "oversight.executives is required (use [] for none)".to_string(),
            ));
        }
        if self.oversight.institutions.is_empty() {
            return Err(ConfigError::ValidationError(
                "oversight.institutions must name at least one institution".to_string(),
            ));
        }
        self.cas_base_url()?;
        parse_url("oversight.survey_url", &self.oversight.survey_url)?;
        parse_url("saa.survey_url", &self.saa.survey_url)?;
        Ok(())
    }

    /// CAS base address with a trailing slash, so endpoint names join under it.
    pub fn cas_base_url(&self) -> Result<Url, ConfigError> {
        let mut base = parse_url("cas.base", &self.cas.base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base)
    }

    pub fn oversight_survey_url(&self) -> Result<Url, ConfigError> {
        parse_url("oversight.survey_url", &self.oversight.survey_url)
    }

    pub fn saa_survey_url(&self) -> Result<Url, ConfigError> {
        parse_url("saa.survey_url", &self.saa.survey_url)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.cas.session_timeout_secs)
    }

    pub fn reissue_after(&self) -> Duration {
        Duration::from_secs(self.cas.reissue_after_secs)
    }

    pub fn ticket_retention(&self) -> Duration {
        Duration::from_secs(self.cas.ticket_retention_secs)
    }

    /// A copy safe to print: the session secret is masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.cas.app_secret.is_empty() {
            config.cas.app_secret = REDACTED.to_string();
        }
        config
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value)
        .map_err(|e| ConfigError::ValidationError(format!("{key} is not a valid URL ({value}): {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> HeronConfig {
        let mut config = HeronConfig::default();
        config.cas.app_secret = "sekrit".to_string();
        config.oversight.executives = Some(vec!["big.wig".to_string()]);
        config
    }

    #[test]
    fn test_default_config() {
        let config = HeronConfig::default();
        assert_eq!(config.cas.session_timeout_secs, 600);
        assert_eq!(config.cas.reissue_after_secs, 60);
        assert_eq!(config.cas.cookie_name, "auth_tkt");
        assert_eq!(config.oversight.institutions, vec!["kuh", "kupi", "kumc"]);
    }

    #[test]
    fn test_defaults_are_not_runnable() {
        let err = HeronConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("app_secret"));
    }

    #[test]
    fn test_missing_executives_is_fatal() {
        let mut config = valid();
        config.oversight.executives = None;
        assert!(config.validate().unwrap_err().to_string().contains("executives"));

        config.oversight.executives = Some(vec![]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reissue_must_precede_timeout() {
        let mut config = valid();
        config.cas.reissue_after_secs = 600;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ticket_retention_rejected() {
        let mut config = valid();
        config.cas.ticket_retention_secs = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("ticket_retention_secs"));
    }

    #[test]
    fn test_empty_institutions_rejected() {
        let mut config = valid();
        config.oversight.institutions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_url_rejected() {
        let mut config = valid();
        config.saa.survey_url = "not a url".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("saa.survey_url"));
    }

    #[test]
    fn test_cas_base_gets_trailing_slash() {
        let mut config = valid();
        config.cas.base = "https://cas.example.edu/cas".to_string();
        assert_eq!(
            config.cas_base_url().unwrap().as_str(),
            "https://cas.example.edu/cas/"
        );
    }

    #[test]
    fn test_redacted_masks_secret() {
        let config = valid().redacted();
        assert_eq!(config.cas.app_secret, "********");
        assert_eq!(valid().cas.app_secret, "sekrit");
    }
}
