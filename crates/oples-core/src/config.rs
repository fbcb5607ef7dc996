use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use sqlx::postgres::PgConnectOptions;

use crate::error::ConfigError;

pub const DEFAULT_REPORT_PATH: &str = "informe_consolidado.xlsx";

/// Connection parameters for the service-log database.
///
/// A full `DATABASE_URL` wins over the individual `DB_*` variables.
#[derive(Clone, PartialEq, Eq)]
pub enum DbConfig {
    Url(String),
    Params(DbParams),
}

#[derive(Clone, PartialEq, Eq)]
pub struct DbParams {
    pub host: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub port: u16,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL").filter(|value| !value.trim().is_empty()) {
            return Ok(Self::Url(url));
        }

        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingVar { name })
        };

        let port_raw = required("DB_PORT")?;
        let port = port_raw
            .trim()
            .parse::<u16>()
            .map_err(|err| ConfigError::InvalidVar {
                name: "DB_PORT",
                message: format!("'{port_raw}': {err}"),
            })?;

        Ok(Self::Params(DbParams {
            host: required("DB_HOST")?,
            database: required("DB_NAME")?,
            user: required("DB_USER")?,
            password: required("DB_PASSWORD")?,
            port,
        }))
    }

    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        match self {
            DbConfig::Url(url) => {
                PgConnectOptions::from_str(url).map_err(|err| ConfigError::InvalidVar {
                    name: "DATABASE_URL",
                    message: err.to_string(),
                })
            }
            DbConfig::Params(params) => Ok(PgConnectOptions::new()
                .host(&params.host)
                .port(params.port)
                .database(&params.database)
                .username(&params.user)
                .password(&params.password)),
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbConfig::Url(_) => f.debug_tuple("Url").field(&"<redacted>").finish(),
            DbConfig::Params(params) => f
                .debug_struct("Params")
                .field("host", &params.host)
                .field("database", &params.database)
                .field("user", &params.user)
                .field("port", &params.port)
                .finish_non_exhaustive(),
        }
    }
}

/// Where the consolidated workbook is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportConfig {
    pub output_path: PathBuf,
}

impl ReportConfig {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn from_env() -> Self {
        std::env::var("OPLES_REPORT_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_REPORT_PATH)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn database_url_takes_precedence() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://u:p@db/oples"),
            ("DB_HOST", "ignored"),
        ]))
        .expect("config");
        assert_eq!(config, DbConfig::Url("postgres://u:p@db/oples".into()));
    }

    #[test]
    fn individual_variables_are_required() {
        let err = DbConfig::from_lookup(lookup(&[
            ("DB_PORT", "5432"),
            ("DB_HOST", "db"),
            ("DB_NAME", "oples"),
            ("DB_USER", "oples"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                name: "DB_PASSWORD"
            }
        ));
    }

    #[test]
    fn port_must_be_numeric() {
        let err = DbConfig::from_lookup(lookup(&[
            ("DB_PORT", "five"),
            ("DB_HOST", "db"),
            ("DB_NAME", "oples"),
            ("DB_USER", "oples"),
            ("DB_PASSWORD", "secret"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidVar { name: "DB_PORT", .. }));
    }

    #[test]
    fn debug_output_hides_password() {
        let config = DbConfig::from_lookup(lookup(&[
            ("DB_PORT", "5432"),
            ("DB_HOST", "db"),
            ("DB_NAME", "oples"),
            ("DB_USER", "oples"),
            ("DB_PASSWORD", "secret"),
        ]))
        .expect("config");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("db"));
        assert!(!rendered.contains("secret"));
    }
}
