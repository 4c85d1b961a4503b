//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Password strength rules, only consulted when credential access is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Whether a symbol is mandatory. Raises the required score from 4 to 5.
    pub require_symbols: bool,
}

impl ValidationConfig {
    /// Minimum password score for this configuration.
    pub fn required_password_score(&self) -> u8 {
        if self.require_symbols { 5 } else { 4 }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_symbols: false,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// HTTP listen port.
    pub port: u16,
    /// Maximum rows returned by the admin listing.
    pub admin_list_limit: usize,
    /// How long an untouched onboarding session stays in memory.
    pub session_idle_timeout: Duration,
    pub validation: ValidationConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/linkpage.db"),
            port: 8080,
            admin_list_limit: 100,
            session_idle_timeout: Duration::from_secs(30 * 60),
            validation: ValidationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Build configuration from `LINKPAGE_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reads through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = lookup("LINKPAGE_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let port = parse_var(&lookup, "LINKPAGE_PORT")?.unwrap_or(defaults.port);

        let admin_list_limit = parse_var(&lookup, "LINKPAGE_ADMIN_LIST_LIMIT")?
            .unwrap_or(defaults.admin_list_limit);

        let session_idle_timeout = parse_var(&lookup, "LINKPAGE_SESSION_IDLE_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_idle_timeout);

        let require_symbols = match lookup("LINKPAGE_PASSWORD_REQUIRE_SYMBOLS") {
            Some(raw) => parse_bool("LINKPAGE_PASSWORD_REQUIRE_SYMBOLS", &raw)?,
            None => defaults.validation.require_symbols,
        };

        Ok(Self {
            db_path,
            port,
            admin_list_limit,
            session_idle_timeout,
            validation: ValidationConfig { require_symbols },
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        None => Ok(None),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, PathBuf::from("./data/linkpage.db"));
        assert_eq!(config.admin_list_limit, 100);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(1800));
        assert!(!config.validation.require_symbols);
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("LINKPAGE_DB_PATH", "/tmp/lp.db"),
            ("LINKPAGE_PORT", "9090"),
            ("LINKPAGE_ADMIN_LIST_LIMIT", "25"),
            ("LINKPAGE_SESSION_IDLE_SECS", "120"),
            ("LINKPAGE_PASSWORD_REQUIRE_SYMBOLS", "yes"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/lp.db"));
        assert_eq!(config.port, 9090);
        assert_eq!(config.admin_list_limit, 25);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(120));
        assert!(config.validation.require_symbols);
    }

    #[test]
    fn rejects_bad_port() {
        let err = AppConfig::from_lookup(lookup_from(&[("LINKPAGE_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "LINKPAGE_PORT"));
    }

    #[test]
    fn rejects_bad_bool() {
        let err = AppConfig::from_lookup(lookup_from(&[(
            "LINKPAGE_PASSWORD_REQUIRE_SYMBOLS",
            "maybe",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn password_threshold_follows_symbol_rule() {
        assert_eq!(ValidationConfig::default().required_password_score(), 4);
        assert_eq!(
            ValidationConfig {
                require_symbols: true
            }
            .required_password_score(),
            5
        );
    }
}
